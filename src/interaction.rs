//! Interaction controller: gestures in, intents out.
//!
//! The controller reads and writes the [`GraphStore`] synchronously (marks,
//! selection, local positions) and returns the [`Intent`]s that need the
//! network or the user. It never performs I/O itself.
//!
//! | Gesture | Target | Effect |
//! |---------|--------|--------|
//! | tap | node | open node surface, clear multi-selection |
//! | tap + Shift/Ctrl | node | toggle selection membership |
//! | tap | background | clear selection, close surfaces |
//! | drag | selected node | drag-connect to the nearest node in range |
//! | drag | other node | reposition only |
//! | context tap | edge | ask to remove the edge |
//! | double tap | edge | open edge surface |

use log::{debug, warn};

use crate::gesture::{Gesture, GestureKind, Target};
use crate::model::{EdgeForm, NodeForm, Position};
use crate::store::GraphStore;

/// Externally visible state of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionState {
	Idle,
	MultiSelecting,
	DragConnectArmed,
	EditingNode,
	EditingEdge,
}

/// The edit surface currently open. At most one exists at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Surface {
	#[default]
	Closed,
	Node(String),
	Edge(String),
}

impl Surface {
	pub fn node_id(&self) -> Option<&str> {
		match self {
			Surface::Node(id) => Some(id),
			_ => None,
		}
	}

	pub fn edge_id(&self) -> Option<&str> {
		match self {
			Surface::Edge(id) => Some(id),
			_ => None,
		}
	}

	pub fn is_open(&self) -> bool {
		!matches!(self, Surface::Closed)
	}
}

/// Follow-up work produced by a gesture.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
	/// A surface was closed, possibly because another one opened.
	SurfaceClosed(Surface),
	OpenNodeEditor(NodeForm),
	OpenEdgeEditor(EdgeForm),
	SelectionChanged,
	PersistPosition { id: String, position: Position },
	Connect { source: String, target: String },
	ConfirmEdgeRemoval { id: String },
}

#[derive(Clone, Debug)]
struct DragSession {
	node: String,
	armed: bool,
}

pub struct InteractionController {
	surface: Surface,
	drag: Option<DragSession>,
	proximity_threshold: f64,
}

impl InteractionController {
	pub fn new(proximity_threshold: f64) -> Self {
		Self {
			surface: Surface::Closed,
			drag: None,
			proximity_threshold,
		}
	}

	pub fn surface(&self) -> &Surface {
		&self.surface
	}

	pub fn state(&self, store: &GraphStore) -> InteractionState {
		match (&self.surface, &self.drag) {
			(Surface::Node(_), _) => InteractionState::EditingNode,
			(Surface::Edge(_), _) => InteractionState::EditingEdge,
			(Surface::Closed, Some(drag)) if drag.armed => InteractionState::DragConnectArmed,
			_ if !store.selection().is_empty() => InteractionState::MultiSelecting,
			_ => InteractionState::Idle,
		}
	}

	/// Close whatever surface is open, returning it.
	pub fn close_surface(&mut self, store: &mut GraphStore) -> Surface {
		store.set_focus(None);
		std::mem::take(&mut self.surface)
	}

	pub fn handle(&mut self, store: &mut GraphStore, gesture: &Gesture) -> Vec<Intent> {
		match (gesture.kind, &gesture.target) {
			(GestureKind::Tap, Target::Node(id)) if gesture.modifiers.multi_select() => {
				match store.toggle_selection(id) {
					Ok(selected) => {
						debug!("multi-select {id}: {selected}, now {:?}", store.selection());
						vec![Intent::SelectionChanged]
					}
					Err(err) => {
						warn!("tap on unknown node: {err}");
						Vec::new()
					}
				}
			}
			(GestureKind::Tap, Target::Node(id)) => self.open_node(store, id),
			(GestureKind::Tap, Target::Background) => self.reset(store),
			(GestureKind::DoubleTap, Target::Edge(id)) => self.open_edge(store, id),
			(GestureKind::ContextTap, Target::Edge(id)) => {
				vec![Intent::ConfirmEdgeRemoval { id: id.clone() }]
			}
			(GestureKind::DragStart, Target::Node(id)) => {
				self.drag_start(store, id, gesture.position);
				Vec::new()
			}
			(GestureKind::DragMove, Target::Node(id)) => {
				self.drag_move(store, id, gesture.position);
				Vec::new()
			}
			(GestureKind::DragEnd, Target::Node(id)) => self.drag_end(store, id, gesture.position),
			_ => Vec::new(),
		}
	}

	fn open_node(&mut self, store: &mut GraphStore, id: &str) -> Vec<Intent> {
		let form = match store.node(id) {
			Ok(node) => NodeForm::from(node),
			Err(err) => {
				warn!("cannot open node surface: {err}");
				return Vec::new();
			}
		};
		let mut intents = self.force_close(store);
		if !store.clear_selection().is_empty() {
			intents.push(Intent::SelectionChanged);
		}
		store.set_focus(Some(id));
		self.surface = Surface::Node(id.to_string());
		debug!("node surface opened: {}", form.name);
		intents.push(Intent::OpenNodeEditor(form));
		intents
	}

	fn open_edge(&mut self, store: &mut GraphStore, id: &str) -> Vec<Intent> {
		let form = match store.edge(id) {
			Ok(edge) => EdgeForm::from(edge),
			Err(err) => {
				warn!("cannot open edge surface: {err}");
				return Vec::new();
			}
		};
		let mut intents = self.force_close(store);
		self.surface = Surface::Edge(id.to_string());
		intents.push(Intent::OpenEdgeEditor(form));
		intents
	}

	fn force_close(&mut self, store: &mut GraphStore) -> Vec<Intent> {
		match self.close_surface(store) {
			Surface::Closed => Vec::new(),
			prev => vec![Intent::SurfaceClosed(prev)],
		}
	}

	fn reset(&mut self, store: &mut GraphStore) -> Vec<Intent> {
		let mut intents = self.force_close(store);
		store.clear_selection();
		store.clear_drag_targets();
		self.drag = None;
		intents.push(Intent::SelectionChanged);
		intents
	}

	fn drag_start(&mut self, store: &mut GraphStore, id: &str, position: Option<Position>) {
		if !place(store, id, position) {
			return;
		}
		let armed = store.is_selected(id);
		if armed {
			debug!("drag-connect armed from {id}");
		}
		self.drag = Some(DragSession {
			node: id.to_string(),
			armed,
		});
	}

	fn drag_move(&mut self, store: &mut GraphStore, id: &str, position: Option<Position>) {
		if !place(store, id, position) {
			return;
		}
		if !self.armed_for(id) {
			return;
		}
		store.clear_drag_targets();
		if let Ok(candidates) = store.proximity_candidates(id, self.proximity_threshold) {
			for (candidate, _) in candidates {
				store.set_drag_target(&candidate, true);
			}
		}
	}

	fn drag_end(&mut self, store: &mut GraphStore, id: &str, position: Option<Position>) -> Vec<Intent> {
		place(store, id, position);
		let armed = self.armed_for(id);
		self.drag = None;

		let mut intents = Vec::new();
		if let Ok(node) = store.node(id) {
			intents.push(Intent::PersistPosition {
				id: id.to_string(),
				position: node.position,
			});
		}

		if armed {
			if let Ok(Some(target)) = store.nearest_candidate(id, self.proximity_threshold) {
				debug!("drag-connect {id} -> {target}");
				intents.push(Intent::Connect {
					source: id.to_string(),
					target,
				});
				store.deselect(id);
				intents.push(Intent::SelectionChanged);
			}
		}
		store.clear_drag_targets();
		intents
	}

	fn armed_for(&self, id: &str) -> bool {
		self.drag
			.as_ref()
			.is_some_and(|drag| drag.armed && drag.node == id)
	}
}

/// Move `id` to `position` if one was given. `false` when the node is unknown.
fn place(store: &mut GraphStore, id: &str, position: Option<Position>) -> bool {
	let Some(p) = position else {
		return true;
	};
	match store.set_position(id, p) {
		Ok(()) => true,
		Err(err) => {
			warn!("drag on unknown node: {err}");
			false
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gesture::Modifiers;
	use crate::model::GraphSnapshot;
	use crate::store::tests::{edge, node};
	use pretty_assertions::assert_eq;

	fn fixture() -> (InteractionController, GraphStore) {
		let mut store = GraphStore::default();
		store.replace_all(GraphSnapshot {
			nodes: vec![
				node("d", 0.0, 0.0),
				node("near", 300.0, 0.0),
				node("far", 500.0, 0.0),
			],
			edges: vec![edge("e1", "d", "near")],
		});
		(InteractionController::new(120.0), store)
	}

	fn shift_tap(id: &str) -> Gesture {
		Gesture::tap_node(id).with_modifiers(Modifiers::SHIFT)
	}

	#[test]
	fn plain_tap_opens_node_and_clears_selection() {
		let (mut ctl, mut store) = fixture();
		ctl.handle(&mut store, &shift_tap("near"));
		ctl.handle(&mut store, &shift_tap("far"));

		let intents = ctl.handle(&mut store, &Gesture::tap_node("d"));

		assert_eq!(ctl.state(&store), InteractionState::EditingNode);
		assert!(store.selection().is_empty());
		assert!(!store.marks("near").unwrap().multi_selected);
		assert!(store.marks("d").unwrap().selected);
		assert!(matches!(
			intents.last(),
			Some(Intent::OpenNodeEditor(form)) if form.id == "d"
		));
	}

	#[test]
	fn ctrl_tap_toggles_membership_without_opening() {
		let (mut ctl, mut store) = fixture();
		let tap = Gesture::tap_node("near").with_modifiers(Modifiers::CTRL);

		assert_eq!(ctl.handle(&mut store, &tap), vec![Intent::SelectionChanged]);
		assert_eq!(ctl.state(&store), InteractionState::MultiSelecting);
		assert_eq!(store.selection(), ["near"]);

		ctl.handle(&mut store, &tap);
		assert!(store.selection().is_empty());
		assert_eq!(ctl.state(&store), InteractionState::Idle);
	}

	#[test]
	fn background_tap_returns_to_idle() {
		let (mut ctl, mut store) = fixture();
		ctl.handle(&mut store, &shift_tap("d"));
		ctl.handle(&mut store, &shift_tap("near"));

		ctl.handle(&mut store, &Gesture::tap_background());

		assert_eq!(ctl.state(&store), InteractionState::Idle);
		assert!(store.nodes().all(|e| !e.marks.multi_selected));
	}

	#[test]
	fn drag_of_unselected_node_only_repositions() {
		let (mut ctl, mut store) = fixture();
		let to = Position::new(250.0, 0.0);

		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragStart, "d", Position::new(0.0, 0.0)));
		assert_eq!(ctl.state(&store), InteractionState::Idle);
		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragMove, "d", to));
		assert!(store.drag_targets().is_empty());

		let intents = ctl.handle(&mut store, &Gesture::drag(GestureKind::DragEnd, "d", to));
		assert_eq!(
			intents,
			vec![Intent::PersistPosition {
				id: "d".into(),
				position: to
			}]
		);
	}

	#[test]
	fn armed_drag_highlights_every_candidate_in_range() {
		let (mut ctl, mut store) = fixture();
		ctl.handle(&mut store, &shift_tap("d"));
		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragStart, "d", Position::new(0.0, 0.0)));
		assert_eq!(ctl.state(&store), InteractionState::DragConnectArmed);

		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragMove, "d", Position::new(400.0, 0.0)));
		let mut targets = store.drag_targets();
		targets.sort();
		assert_eq!(targets, vec!["far", "near"]);

		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragMove, "d", Position::new(0.0, 900.0)));
		assert!(store.drag_targets().is_empty());
	}

	#[test]
	fn armed_drop_connects_to_nearest_and_deselects() {
		let (mut ctl, mut store) = fixture();
		ctl.handle(&mut store, &shift_tap("d"));
		ctl.handle(&mut store, &shift_tap("far"));
		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragStart, "d", Position::new(0.0, 0.0)));

		// 50 from near, 150 from far
		let drop = Position::new(350.0, 0.0);
		let intents = ctl.handle(&mut store, &Gesture::drag(GestureKind::DragEnd, "d", drop));

		assert_eq!(
			intents,
			vec![
				Intent::PersistPosition {
					id: "d".into(),
					position: drop
				},
				Intent::Connect {
					source: "d".into(),
					target: "near".into()
				},
				Intent::SelectionChanged,
			]
		);
		assert_eq!(store.selection(), ["far"]);
		assert!(!store.marks("d").unwrap().multi_selected);
		assert!(store.drag_targets().is_empty());
	}

	#[test]
	fn armed_drop_out_of_range_keeps_selection() {
		let (mut ctl, mut store) = fixture();
		ctl.handle(&mut store, &shift_tap("d"));
		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragStart, "d", Position::new(0.0, 0.0)));
		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragMove, "d", Position::new(200.0, 0.0)));

		// exactly 120 from near
		let intents = ctl.handle(
			&mut store,
			&Gesture::drag(GestureKind::DragEnd, "d", Position::new(180.0, 0.0)),
		);

		assert_eq!(intents.len(), 1);
		assert_eq!(store.selection(), ["d"]);
		assert!(store.drag_targets().is_empty());
	}

	#[test]
	fn edge_gestures() {
		let (mut ctl, mut store) = fixture();
		assert_eq!(
			ctl.handle(&mut store, &Gesture::new(GestureKind::ContextTap, Target::Edge("e1".into()))),
			vec![Intent::ConfirmEdgeRemoval { id: "e1".into() }]
		);

		let intents = ctl.handle(&mut store, &Gesture::new(GestureKind::DoubleTap, Target::Edge("e1".into())));
		assert_eq!(ctl.state(&store), InteractionState::EditingEdge);
		assert!(matches!(&intents[..], [Intent::OpenEdgeEditor(form)] if form.label == "→"));
	}

	#[test]
	fn opening_one_surface_force_closes_the_other() {
		let (mut ctl, mut store) = fixture();
		ctl.handle(&mut store, &Gesture::tap_node("d"));

		let intents = ctl.handle(&mut store, &Gesture::new(GestureKind::DoubleTap, Target::Edge("e1".into())));
		assert_eq!(intents[0], Intent::SurfaceClosed(Surface::Node("d".into())));
		assert_eq!(ctl.surface(), &Surface::Edge("e1".into()));
		assert!(!store.marks("d").unwrap().selected);

		let intents = ctl.handle(&mut store, &Gesture::tap_node("near"));
		assert_eq!(intents[0], Intent::SurfaceClosed(Surface::Edge("e1".into())));
		assert_eq!(ctl.surface().node_id(), Some("near"));
		assert_eq!(ctl.surface().edge_id(), None);
	}

	#[test]
	fn unknown_targets_are_ignored() {
		let (mut ctl, mut store) = fixture();
		assert!(ctl.handle(&mut store, &Gesture::tap_node("ghost")).is_empty());
		assert!(ctl.handle(&mut store, &shift_tap("ghost")).is_empty());
		assert_eq!(ctl.state(&store), InteractionState::Idle);
	}

	#[test]
	fn drag_of_a_vanished_node_persists_nothing() {
		let (mut ctl, mut store) = fixture();
		let start = Gesture::drag(GestureKind::DragStart, "ghost", Position::new(0.0, 0.0));
		assert!(ctl.handle(&mut store, &start).is_empty());
		assert_eq!(ctl.state(&store), InteractionState::Idle);

		ctl.handle(&mut store, &shift_tap("d"));
		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragStart, "d", Position::new(0.0, 0.0)));
		store.remove_node("d").unwrap();

		ctl.handle(&mut store, &Gesture::drag(GestureKind::DragMove, "d", Position::new(280.0, 0.0)));
		assert!(store.drag_targets().is_empty());
		let intents = ctl.handle(&mut store, &Gesture::drag(GestureKind::DragEnd, "d", Position::new(290.0, 0.0)));
		assert!(intents.is_empty());
		assert_eq!(ctl.state(&store), InteractionState::Idle);
	}
}
