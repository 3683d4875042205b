//! Canonical client copy of the graph.
//!
//! Every read and mutation the UI performs goes through [`GraphStore`]. The
//! store is rebuilt wholesale from each backend snapshot; it never merges
//! field by field.

use std::collections::HashMap;

use log::{debug, warn};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};

use crate::config::ClientConfig;
use crate::error::StoreError;
use crate::model::{CommandRecord, Edge, GraphSnapshot, Node, Position};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// Default location of the first node on an empty canvas.
pub const FIRST_NODE_POSITION: Position = Position { x: 400.0, y: 300.0 };

/// Smallest span of the extent new nodes are scattered over.
const MIN_SPAWN_SPAN: f64 = 100.0;

/// Visual classes carried by a rendered node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Marks {
	/// Native single selection (drives the edit surface).
	pub selected: bool,
	/// Member of the multi-selection set.
	pub multi_selected: bool,
	/// Within drag-connect range of the node being dragged.
	pub drag_target: bool,
}

#[derive(Clone, Debug)]
pub struct NodeEntry {
	pub node: Node,
	pub marks: Marks,
}

/// Pan (`x`, `y`, in screen pixels) and zoom (`k`) applied to canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> Position {
		Position::new((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	pub fn graph_to_screen(&self, p: Position) -> (f64, f64) {
		(p.x * self.k + self.x, p.y * self.k + self.y)
	}
}

/// Axis-aligned box in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl Bounds {
	pub fn width(&self) -> f64 {
		self.max_x - self.min_x
	}

	pub fn height(&self) -> f64 {
		self.max_y - self.min_y
	}

	pub fn center(&self) -> Position {
		Position::new(
			(self.min_x + self.max_x) / 2.0,
			(self.min_y + self.max_y) / 2.0,
		)
	}
}

/// What a [`GraphStore::replace_all`] call kept and dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaceReport {
	pub nodes: usize,
	pub edges: usize,
	/// Edges skipped because an endpoint is missing from the snapshot.
	pub dangling: Vec<String>,
	/// Selection members that no longer exist.
	pub deselected: Vec<String>,
}

pub struct GraphStore {
	graph: StableDiGraph<NodeEntry, Edge>,
	nodes_by_id: HashMap<String, NodeIndex>,
	edges_by_id: HashMap<String, EdgeIndex>,
	/// Multi-selection, in the order nodes were picked.
	selection: Vec<String>,
	focused: Option<String>,
	viewport: ViewTransform,
	canvas: (f64, f64),
	node_size: f64,
	fit_margin: f64,
}

impl Default for GraphStore {
	fn default() -> Self {
		Self::new(&ClientConfig::default())
	}
}

impl GraphStore {
	pub fn new(config: &ClientConfig) -> Self {
		Self {
			graph: StableDiGraph::new(),
			nodes_by_id: HashMap::new(),
			edges_by_id: HashMap::new(),
			selection: Vec::new(),
			focused: None,
			viewport: ViewTransform::default(),
			canvas: (0.0, 0.0),
			node_size: config.node_size,
			fit_margin: config.fit_margin,
		}
	}

	// ─── Snapshot ────────────────────────────────────────────────────────

	/// Discard every element and visual class and repopulate from `snapshot`.
	///
	/// Selection members that survive keep their multi-selected mark; members
	/// absent from the snapshot leave the selection. Edges with a missing
	/// endpoint are not added.
	pub fn replace_all(&mut self, snapshot: GraphSnapshot) -> ReplaceReport {
		let mut graph = StableDiGraph::with_capacity(snapshot.nodes.len(), snapshot.edges.len());
		let mut nodes_by_id = HashMap::with_capacity(snapshot.nodes.len());
		let mut edges_by_id = HashMap::with_capacity(snapshot.edges.len());

		for node in snapshot.nodes {
			if nodes_by_id.contains_key(&node.id) {
				warn!("snapshot repeats node id {}, keeping the first", node.id);
				continue;
			}
			let id = node.id.clone();
			let idx = graph.add_node(NodeEntry {
				node,
				marks: Marks::default(),
			});
			nodes_by_id.insert(id, idx);
		}

		let mut dangling = Vec::new();
		for edge in snapshot.edges {
			let endpoints = (nodes_by_id.get(&edge.source), nodes_by_id.get(&edge.target));
			let (Some(&src), Some(&tgt)) = endpoints else {
				dangling.push(edge.id);
				continue;
			};
			if edges_by_id.contains_key(&edge.id) {
				warn!("snapshot repeats edge id {}, keeping the first", edge.id);
				continue;
			}
			let id = edge.id.clone();
			let idx = graph.add_edge(src, tgt, edge);
			edges_by_id.insert(id, idx);
		}
		if !dangling.is_empty() {
			warn!("dropped {} dangling edge(s): {:?}", dangling.len(), dangling);
		}

		self.graph = graph;
		self.nodes_by_id = nodes_by_id;
		self.edges_by_id = edges_by_id;

		let (kept, deselected): (Vec<_>, Vec<_>) = std::mem::take(&mut self.selection)
			.into_iter()
			.partition(|id| self.nodes_by_id.contains_key(id));
		self.selection = kept;
		for id in self.selection.clone() {
			if let Some(entry) = self.entry_mut(&id) {
				entry.marks.multi_selected = true;
			}
		}
		if let Some(focused) = self.focused.take() {
			if let Some(entry) = self.entry_mut(&focused) {
				entry.marks.selected = true;
				self.focused = Some(focused);
			}
		}

		let report = ReplaceReport {
			nodes: self.graph.node_count(),
			edges: self.graph.edge_count(),
			dangling,
			deselected,
		};
		debug!(
			"graph replaced: {} nodes, {} edges",
			report.nodes, report.edges
		);
		report
	}

	/// Remove every element, as after a clear.
	pub fn clear(&mut self) {
		self.replace_all(GraphSnapshot::default());
	}

	// ─── Reads ───────────────────────────────────────────────────────────

	pub fn node(&self, id: &str) -> Result<&Node, StoreError> {
		self.entry(id)
			.map(|entry| &entry.node)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))
	}

	pub fn edge(&self, id: &str) -> Result<&Edge, StoreError> {
		self.edges_by_id
			.get(id)
			.and_then(|&idx| self.graph.edge_weight(idx))
			.ok_or_else(|| StoreError::EdgeNotFound(id.to_string()))
	}

	pub fn marks(&self, id: &str) -> Result<Marks, StoreError> {
		self.entry(id)
			.map(|entry| entry.marks)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))
	}

	pub fn contains_node(&self, id: &str) -> bool {
		self.nodes_by_id.contains_key(id)
	}

	pub fn node_count(&self) -> usize {
		self.graph.node_count()
	}

	pub fn edge_count(&self) -> usize {
		self.graph.edge_count()
	}

	/// Rendered nodes, in snapshot order.
	pub fn nodes(&self) -> impl Iterator<Item = &NodeEntry> {
		self.graph
			.node_indices()
			.filter_map(|idx| self.graph.node_weight(idx))
	}

	/// Rendered edges together with their endpoint positions.
	pub fn edges(&self) -> impl Iterator<Item = (&Edge, Position, Position)> {
		self.graph.edge_indices().filter_map(|idx| {
			let (src, tgt) = self.graph.edge_endpoints(idx)?;
			let edge = self.graph.edge_weight(idx)?;
			let from = self.graph.node_weight(src)?.node.position;
			let to = self.graph.node_weight(tgt)?.node.position;
			Some((edge, from, to))
		})
	}

	/// Ids of every rendered element, nodes first.
	pub fn element_ids(&self) -> Vec<String> {
		self.nodes()
			.map(|entry| entry.node.id.clone())
			.chain(self.edges().map(|(edge, _, _)| edge.id.clone()))
			.collect()
	}

	// ─── Selection ───────────────────────────────────────────────────────

	pub fn selection(&self) -> &[String] {
		&self.selection
	}

	pub fn is_selected(&self, id: &str) -> bool {
		self.selection.iter().any(|s| s == id)
	}

	/// Toggle the multi-selected marker. Independent of native selection and
	/// of selection-set membership.
	pub fn set_selection_mark(&mut self, id: &str, on: bool) -> Result<(), StoreError> {
		let entry = self
			.entry_mut(id)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
		entry.marks.multi_selected = on;
		Ok(())
	}

	/// Append `id` to the selection if absent, remove it otherwise. Returns
	/// whether the node is selected afterwards.
	pub fn toggle_selection(&mut self, id: &str) -> Result<bool, StoreError> {
		if !self.contains_node(id) {
			return Err(StoreError::NodeNotFound(id.to_string()));
		}
		let selected = match self.selection.iter().position(|s| s == id) {
			Some(pos) => {
				self.selection.remove(pos);
				false
			}
			None => {
				self.selection.push(id.to_string());
				true
			}
		};
		self.set_selection_mark(id, selected)?;
		Ok(selected)
	}

	/// Drop `id` from the selection and clear its mark.
	pub fn deselect(&mut self, id: &str) {
		self.selection.retain(|s| s != id);
		if let Some(entry) = self.entry_mut(id) {
			entry.marks.multi_selected = false;
		}
	}

	/// Empty the selection, returning the former members.
	pub fn clear_selection(&mut self) -> Vec<String> {
		let members = std::mem::take(&mut self.selection);
		for id in &members {
			if let Some(entry) = self.entry_mut(id) {
				entry.marks.multi_selected = false;
			}
		}
		members
	}

	/// Native single selection; `None` unselects.
	pub fn set_focus(&mut self, id: Option<&str>) {
		if let Some(prev) = self.focused.take() {
			if let Some(entry) = self.entry_mut(&prev) {
				entry.marks.selected = false;
			}
		}
		if let Some(id) = id {
			if let Some(entry) = self.entry_mut(id) {
				entry.marks.selected = true;
				self.focused = Some(id.to_string());
			}
		}
	}

	pub fn focused(&self) -> Option<&str> {
		self.focused.as_deref()
	}

	// ─── Positions and proximity ─────────────────────────────────────────

	/// Move a node locally. Positions are advisory and are not persisted here.
	pub fn set_position(&mut self, id: &str, position: Position) -> Result<(), StoreError> {
		let entry = self
			.entry_mut(id)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
		entry.node.position = position;
		Ok(())
	}

	/// Other nodes strictly closer than `threshold` to `id`, in snapshot order.
	pub fn proximity_candidates(
		&self,
		id: &str,
		threshold: f64,
	) -> Result<Vec<(String, f64)>, StoreError> {
		let origin = self.node(id)?.position;
		Ok(self
			.nodes()
			.filter(|entry| entry.node.id != id)
			.map(|entry| {
				(
					entry.node.id.clone(),
					origin.distance_to(&entry.node.position),
				)
			})
			.filter(|(_, distance)| *distance < threshold)
			.collect())
	}

	/// Closest proximity candidate; on equal distance the first in snapshot
	/// order wins.
	pub fn nearest_candidate(&self, id: &str, threshold: f64) -> Result<Option<String>, StoreError> {
		let nearest = self
			.proximity_candidates(id, threshold)?
			.into_iter()
			.fold(None::<(String, f64)>, |best, (cand, dist)| match best {
				Some((_, best_dist)) if best_dist <= dist => best,
				_ => Some((cand, dist)),
			});
		Ok(nearest.map(|(cand, _)| cand))
	}

	pub fn set_drag_target(&mut self, id: &str, on: bool) {
		if let Some(entry) = self.entry_mut(id) {
			entry.marks.drag_target = on;
		}
	}

	pub fn clear_drag_targets(&mut self) {
		for idx in self.graph.node_indices().collect::<Vec<_>>() {
			if let Some(entry) = self.graph.node_weight_mut(idx) {
				entry.marks.drag_target = false;
			}
		}
	}

	pub fn drag_targets(&self) -> Vec<String> {
		self.nodes()
			.filter(|entry| entry.marks.drag_target)
			.map(|entry| entry.node.id.clone())
			.collect()
	}

	// ─── Local removals ──────────────────────────────────────────────────

	/// Remove a node and its incident edges.
	pub fn remove_node(&mut self, id: &str) -> Result<Node, StoreError> {
		let idx = self
			.nodes_by_id
			.remove(id)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
		self.edges_by_id.retain(|_, edge_idx| {
			self.graph
				.edge_endpoints(*edge_idx)
				.is_some_and(|(src, tgt)| src != idx && tgt != idx)
		});
		self.selection.retain(|s| s != id);
		if self.focused.as_deref() == Some(id) {
			self.focused = None;
		}
		self.graph
			.remove_node(idx)
			.map(|entry| entry.node)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))
	}

	pub fn remove_edge(&mut self, id: &str) -> Result<Edge, StoreError> {
		self.edges_by_id
			.remove(id)
			.and_then(|idx| self.graph.remove_edge(idx))
			.ok_or_else(|| StoreError::EdgeNotFound(id.to_string()))
	}

	// ─── Commands ────────────────────────────────────────────────────────

	/// Persisted commands of a node, oldest first.
	pub fn commands(&self, id: &str) -> Result<&[CommandRecord], StoreError> {
		Ok(&self.node(id)?.commands)
	}

	pub fn set_commands(&mut self, id: &str, commands: Vec<CommandRecord>) -> Result<(), StoreError> {
		let entry = self
			.entry_mut(id)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
		entry.node.commands = commands;
		Ok(())
	}

	/// Splice out the command at storage `index`.
	pub fn remove_command(&mut self, id: &str, index: usize) -> Result<CommandRecord, StoreError> {
		let entry = self
			.entry_mut(id)
			.ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
		let len = entry.node.commands.len();
		if index >= len {
			return Err(StoreError::CommandIndexOutOfRange {
				node: id.to_string(),
				index,
				len,
			});
		}
		Ok(entry.node.commands.remove(index))
	}

	/// Every node's name with its commands, newest first.
	pub fn command_overview(&self) -> Vec<(String, Vec<CommandRecord>)> {
		self.nodes()
			.map(|entry| {
				let newest_first = entry.node.commands.iter().rev().cloned().collect();
				(entry.node.name.clone(), newest_first)
			})
			.collect()
	}

	// ─── Viewport ────────────────────────────────────────────────────────

	pub fn viewport(&self) -> ViewTransform {
		self.viewport
	}

	pub fn viewport_mut(&mut self) -> &mut ViewTransform {
		&mut self.viewport
	}

	pub fn set_canvas_size(&mut self, width: f64, height: f64) {
		self.canvas = (width, height);
	}

	pub fn canvas_size(&self) -> (f64, f64) {
		self.canvas
	}

	pub fn node_radius(&self) -> f64 {
		self.node_size / 2.0
	}

	/// Box around every node, including its rendered radius.
	pub fn bounds(&self) -> Option<Bounds> {
		let r = self.node_radius();
		self.nodes().fold(None, |acc: Option<Bounds>, entry| {
			let p = entry.node.position;
			let b = Bounds {
				min_x: p.x - r,
				min_y: p.y - r,
				max_x: p.x + r,
				max_y: p.y + r,
			};
			Some(match acc {
				None => b,
				Some(a) => Bounds {
					min_x: a.min_x.min(b.min_x),
					min_y: a.min_y.min(b.min_y),
					max_x: a.max_x.max(b.max_x),
					max_y: a.max_y.max(b.max_y),
				},
			})
		})
	}

	/// Zoom and pan so every element fits inside the canvas with the
	/// configured margin, centered. Stored positions are untouched. Returns
	/// `None` (viewport unchanged) when there is nothing to fit or the canvas
	/// has no size yet.
	pub fn fit(&mut self) -> Option<ViewTransform> {
		let (w, h) = self.canvas;
		let bounds = self.bounds()?;
		if w <= 0.0 || h <= 0.0 {
			return None;
		}
		let (avail_w, avail_h) = (
			(w - 2.0 * self.fit_margin).max(1.0),
			(h - 2.0 * self.fit_margin).max(1.0),
		);
		let k = (avail_w / bounds.width())
			.min(avail_h / bounds.height())
			.clamp(MIN_ZOOM, MAX_ZOOM);
		let center = bounds.center();
		self.viewport = ViewTransform {
			x: w / 2.0 - center.x * k,
			y: h / 2.0 - center.y * k,
			k,
		};
		Some(self.viewport)
	}

	/// Visible canvas region in graph coordinates.
	pub fn visible_extent(&self) -> Bounds {
		let (w, h) = self.canvas;
		let top_left = self.viewport.screen_to_graph(0.0, 0.0);
		let bottom_right = self.viewport.screen_to_graph(w, h);
		Bounds {
			min_x: top_left.x,
			min_y: top_left.y,
			max_x: bottom_right.x,
			max_y: bottom_right.y,
		}
	}

	/// Where a new node goes: a fixed spot on an empty graph, otherwise the
	/// point at fractions `(u, v)` of the visible extent.
	pub fn spawn_position(&self, u: f64, v: f64) -> Position {
		if self.node_count() == 0 {
			return FIRST_NODE_POSITION;
		}
		let extent = self.visible_extent();
		if !extent.min_x.is_finite() || !extent.min_y.is_finite() {
			return FIRST_NODE_POSITION;
		}
		Position::new(
			extent.min_x + u * extent.width().max(MIN_SPAWN_SPAN),
			extent.min_y + v * extent.height().max(MIN_SPAWN_SPAN),
		)
	}

	// ─── Hit testing (graph coordinates) ─────────────────────────────────

	/// Topmost node under `p`.
	pub fn node_at(&self, p: Position) -> Option<String> {
		let r = self.node_radius();
		self.nodes()
			.filter(|entry| entry.node.position.distance_to(&p) <= r)
			.last()
			.map(|entry| entry.node.id.clone())
	}

	/// Edge whose segment passes within `tolerance` of `p`.
	pub fn edge_at(&self, p: Position, tolerance: f64) -> Option<String> {
		self.edges()
			.filter(|(_, from, to)| distance_to_segment(p, *from, *to) <= tolerance)
			.last()
			.map(|(edge, _, _)| edge.id.clone())
	}

	fn entry(&self, id: &str) -> Option<&NodeEntry> {
		self.nodes_by_id
			.get(id)
			.and_then(|&idx| self.graph.node_weight(idx))
	}

	fn entry_mut(&mut self, id: &str) -> Option<&mut NodeEntry> {
		let idx = *self.nodes_by_id.get(id)?;
		self.graph.node_weight_mut(idx)
	}
}

fn distance_to_segment(p: Position, a: Position, b: Position) -> f64 {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let len_sq = dx * dx + dy * dy;
	if len_sq < f64::EPSILON {
		return p.distance_to(&a);
	}
	let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
	p.distance_to(&Position::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::model::{DEFAULT_EDGE_COLOR, DEFAULT_EDGE_LABEL};
	use pretty_assertions::assert_eq;

	pub(crate) fn node(id: &str, x: f64, y: f64) -> Node {
		Node {
			id: id.into(),
			name: id.into(),
			icon: "PC".into(),
			icon_color: None,
			label: None,
			owned: false,
			notes: String::new(),
			position: Position::new(x, y),
			commands: Vec::new(),
		}
	}

	pub(crate) fn edge(id: &str, source: &str, target: &str) -> Edge {
		Edge {
			id: id.into(),
			source: source.into(),
			target: target.into(),
			label: DEFAULT_EDGE_LABEL.into(),
			color: DEFAULT_EDGE_COLOR.into(),
		}
	}

	fn store_with(nodes: Vec<Node>, edges: Vec<Edge>) -> GraphStore {
		let mut store = GraphStore::default();
		store.replace_all(GraphSnapshot { nodes, edges });
		store
	}

	#[test]
	fn replace_all_keeps_no_stale_ids() {
		let mut store = store_with(
			vec![node("a", 0.0, 0.0), node("b", 10.0, 0.0)],
			vec![edge("e1", "a", "b")],
		);
		store.replace_all(GraphSnapshot {
			nodes: vec![node("b", 10.0, 0.0), node("c", 20.0, 0.0)],
			edges: vec![edge("e2", "b", "c")],
		});

		let mut ids = store.element_ids();
		ids.sort();
		assert_eq!(ids, vec!["b", "c", "e2"]);
		assert!(store.node("a").is_err());
		assert_eq!(store.edge("e1"), Err(StoreError::EdgeNotFound("e1".into())));
	}

	#[test]
	fn replace_all_prunes_selection_and_keeps_survivor_marks() {
		let mut store = store_with(vec![node("a", 0.0, 0.0), node("b", 10.0, 0.0)], vec![]);
		store.toggle_selection("a").unwrap();
		store.toggle_selection("b").unwrap();

		let report = store.replace_all(GraphSnapshot {
			nodes: vec![node("b", 10.0, 0.0)],
			edges: vec![],
		});

		assert_eq!(report.deselected, vec!["a"]);
		assert_eq!(store.selection(), ["b"]);
		assert!(store.marks("b").unwrap().multi_selected);
	}

	#[test]
	fn dangling_edges_are_not_rendered() {
		let store = store_with(
			vec![node("a", 0.0, 0.0), node("b", 10.0, 0.0)],
			vec![
				edge("ok", "a", "b"),
				edge("bad-src", "ghost", "b"),
				edge("bad-tgt", "a", "ghost"),
			],
		);
		assert_eq!(store.edge_count(), 1);
		let rendered: Vec<_> = store.edges().map(|(e, _, _)| e.id.clone()).collect();
		assert_eq!(rendered, vec!["ok"]);
	}

	#[test]
	fn toggling_twice_restores_selection_and_mark() {
		let mut store = store_with(vec![node("a", 0.0, 0.0), node("b", 1.0, 0.0)], vec![]);
		store.toggle_selection("b").unwrap();
		let before = (store.selection().to_vec(), store.marks("a").unwrap());

		assert!(store.toggle_selection("a").unwrap());
		assert!(!store.toggle_selection("a").unwrap());

		assert_eq!((store.selection().to_vec(), store.marks("a").unwrap()), before);
	}

	#[test]
	fn selection_mark_is_independent_of_native_selection() {
		let mut store = store_with(vec![node("a", 0.0, 0.0)], vec![]);
		store.set_focus(Some("a"));
		store.set_selection_mark("a", true).unwrap();
		store.set_selection_mark("a", false).unwrap();
		let marks = store.marks("a").unwrap();
		assert!(marks.selected);
		assert!(!marks.multi_selected);
	}

	#[test]
	fn threshold_boundary_is_exclusive() {
		let store = store_with(
			vec![
				node("d", 0.0, 0.0),
				node("at", 120.0, 0.0),
				node("inside", 0.0, 119.9),
			],
			vec![],
		);
		let ids: Vec<_> = store
			.proximity_candidates("d", 120.0)
			.unwrap()
			.into_iter()
			.map(|(id, _)| id)
			.collect();
		assert_eq!(ids, vec!["inside"]);
	}

	#[test]
	fn nearest_candidate_prefers_distance_then_order() {
		let store = store_with(
			vec![
				node("d", 0.0, 0.0),
				node("far", 100.0, 0.0),
				node("near", 50.0, 0.0),
				node("near-too", 0.0, 50.0),
			],
			vec![],
		);
		assert_eq!(
			store.nearest_candidate("d", 120.0).unwrap(),
			Some("near".to_string())
		);
	}

	#[test]
	fn remove_node_drops_incident_edges_and_selection() {
		let mut store = store_with(
			vec![node("a", 0.0, 0.0), node("b", 1.0, 0.0), node("c", 2.0, 0.0)],
			vec![edge("ab", "a", "b"), edge("bc", "b", "c")],
		);
		store.toggle_selection("b").unwrap();
		store.remove_node("b").unwrap();

		assert_eq!(store.edge_count(), 0);
		assert!(store.edge("ab").is_err());
		assert!(store.selection().is_empty());
		assert_eq!(store.node_count(), 2);
	}

	#[test]
	fn remove_command_splices_by_storage_index() {
		let mut n = node("a", 0.0, 0.0);
		n.commands = ["id", "whoami", "uname -a"]
			.iter()
			.map(|c| CommandRecord {
				command: c.to_string(),
				output: String::new(),
				timestamp: chrono::NaiveDateTime::default(),
			})
			.collect();
		let mut store = store_with(vec![n], vec![]);

		let removed = store.remove_command("a", 1).unwrap();
		assert_eq!(removed.command, "whoami");
		assert!(matches!(
			store.remove_command("a", 5),
			Err(StoreError::CommandIndexOutOfRange { len: 2, .. })
		));
	}

	#[test]
	fn fit_bounds_all_nodes_with_margin_without_moving_them() {
		let mut store = store_with(vec![node("a", 0.0, 0.0), node("b", 1000.0, 0.0)], vec![]);
		store.set_canvas_size(800.0, 600.0);
		let t = store.fit().unwrap();

		// bounds are [-80, 1080] x [-80, 80]
		let (left, _) = t.graph_to_screen(Position::new(-80.0, 0.0));
		let (right, _) = t.graph_to_screen(Position::new(1080.0, 0.0));
		assert!((left - 60.0).abs() < 1e-9);
		assert!((right - 740.0).abs() < 1e-9);
		assert_eq!(store.node("b").unwrap().position, Position::new(1000.0, 0.0));
	}

	#[test]
	fn fit_on_empty_graph_leaves_viewport() {
		let mut store = GraphStore::default();
		store.set_canvas_size(800.0, 600.0);
		assert!(store.fit().is_none());
		assert_eq!(store.viewport(), ViewTransform::default());
	}

	#[test]
	fn spawn_position_uses_fixed_spot_then_extent() {
		let mut store = GraphStore::default();
		assert_eq!(store.spawn_position(0.5, 0.5), FIRST_NODE_POSITION);

		store.replace_all(GraphSnapshot {
			nodes: vec![node("a", 0.0, 0.0)],
			edges: vec![],
		});
		store.set_canvas_size(400.0, 200.0);
		assert_eq!(store.spawn_position(0.5, 0.5), Position::new(200.0, 100.0));
	}

	#[test]
	fn hit_testing_in_graph_coordinates() {
		let store = store_with(
			vec![node("a", 0.0, 0.0), node("b", 400.0, 0.0)],
			vec![edge("ab", "a", "b")],
		);
		assert_eq!(store.node_at(Position::new(50.0, 50.0)), Some("a".into()));
		assert_eq!(store.node_at(Position::new(200.0, 100.0)), None);
		assert_eq!(store.edge_at(Position::new(200.0, 3.0), 5.0), Some("ab".into()));
	}
}
