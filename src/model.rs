//! Graph data model and its wire representation.
//!
//! Snapshots arrive in the graph-library element shape:
//! `{"group": "nodes", "data": {...}, "position": {"x": .., "y": ..}}`.
//! The in-memory types are flat; conversion happens through private element
//! structs so the rest of the crate never sees the nesting.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Color used when an icon code has no catalogue entry.
pub const FALLBACK_ICON_COLOR: &str = "#007ACC";
pub const DEFAULT_EDGE_COLOR: &str = "#FF9800";
pub const DEFAULT_EDGE_LABEL: &str = "→";

/// Icon catalogue: code, picker caption, display color.
pub const ICONS: &[(&str, &str, &str)] = &[
	("PC", "🖥 PC", "#4285F4"),
	("Person", "🧌 Person", "#34A853"),
	("Admin", "🛡 Admin", "#FBBC05"),
	("Lock", "🔐 Lock", "#EA4335"),
	("Skull", "🏴‍☠️ Skull", "#9AA0A6"),
	("Endpoint", "🌐 Endpoint", "#9AA0A6"),
];

/// Display color for an icon code.
pub fn icon_color(code: &str) -> &'static str {
	ICONS
		.iter()
		.find(|(c, _, _)| *c == code)
		.map(|(_, _, color)| *color)
		.unwrap_or(FALLBACK_ICON_COLOR)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub x: f64,
	pub y: f64,
}

impl Position {
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance_to(&self, other: &Position) -> f64 {
		((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
	}
}

/// One persisted executed-command entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
	pub command: String,
	#[serde(default)]
	pub output: String,
	#[serde(with = "timestamp")]
	pub timestamp: NaiveDateTime,
}

/// A tracked host or asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeElement", into = "NodeElement")]
pub struct Node {
	pub id: String,
	pub name: String,
	pub icon: String,
	/// Server-derived fill color.
	pub icon_color: Option<String>,
	/// Server-derived caption (icon glyph, name, owned marker).
	pub label: Option<String>,
	pub owned: bool,
	pub notes: String,
	pub position: Position,
	/// Oldest first.
	pub commands: Vec<CommandRecord>,
}

impl Node {
	pub fn display_color(&self) -> &str {
		self.icon_color
			.as_deref()
			.unwrap_or_else(|| icon_color(&self.icon))
	}

	pub fn display_label(&self) -> &str {
		self.label.as_deref().unwrap_or(&self.name)
	}
}

/// A directed relationship between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "EdgeElement", into = "EdgeElement")]
pub struct Edge {
	pub id: String,
	pub source: String,
	pub target: String,
	pub label: String,
	pub color: String,
}

/// Complete `{nodes, edges}` state returned by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
	#[serde(default)]
	pub nodes: Vec<Node>,
	#[serde(default)]
	pub edges: Vec<Edge>,
}

#[derive(Clone, Serialize, Deserialize)]
struct NodeElement {
	#[serde(default = "nodes_group")]
	group: String,
	data: NodeData,
	#[serde(default)]
	position: Option<Position>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeData {
	id: String,
	#[serde(default)]
	name: String,
	#[serde(default)]
	icon: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	icon_color: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	label: Option<String>,
	#[serde(default)]
	notes: String,
	#[serde(default)]
	owned: bool,
	#[serde(default)]
	commands: Vec<CommandRecord>,
}

#[derive(Clone, Serialize, Deserialize)]
struct EdgeElement {
	#[serde(default = "edges_group")]
	group: String,
	data: EdgeData,
}

#[derive(Clone, Serialize, Deserialize)]
struct EdgeData {
	id: String,
	source: String,
	target: String,
	#[serde(default = "default_edge_label")]
	label: String,
	#[serde(default = "default_edge_color")]
	color: String,
}

fn nodes_group() -> String {
	"nodes".into()
}

fn edges_group() -> String {
	"edges".into()
}

fn default_edge_label() -> String {
	DEFAULT_EDGE_LABEL.into()
}

fn default_edge_color() -> String {
	DEFAULT_EDGE_COLOR.into()
}

impl From<NodeElement> for Node {
	fn from(el: NodeElement) -> Self {
		let d = el.data;
		Node {
			id: d.id,
			name: d.name,
			icon: d.icon,
			icon_color: d.icon_color,
			label: d.label,
			owned: d.owned,
			notes: d.notes,
			position: el.position.unwrap_or_default(),
			commands: d.commands,
		}
	}
}

impl From<Node> for NodeElement {
	fn from(n: Node) -> Self {
		NodeElement {
			group: nodes_group(),
			data: NodeData {
				id: n.id,
				name: n.name,
				icon: n.icon,
				icon_color: n.icon_color,
				label: n.label,
				notes: n.notes,
				owned: n.owned,
				commands: n.commands,
			},
			position: Some(n.position),
		}
	}
}

impl From<EdgeElement> for Edge {
	fn from(el: EdgeElement) -> Self {
		let d = el.data;
		Edge {
			id: d.id,
			source: d.source,
			target: d.target,
			label: d.label,
			color: d.color,
		}
	}
}

impl From<Edge> for EdgeElement {
	fn from(e: Edge) -> Self {
		EdgeElement {
			group: edges_group(),
			data: EdgeData {
				id: e.id,
				source: e.source,
				target: e.target,
				label: e.label,
				color: e.color,
			},
		}
	}
}

/// Accepts RFC 3339 as well as the offset-less ISO form the backend writes;
/// always writes the offset-less form.
mod timestamp {
	use chrono::{DateTime, NaiveDateTime};
	use serde::{Deserialize, Deserializer, Serializer, de::Error};

	const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

	pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(&ts.format(FORMAT).to_string())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
		let raw = String::deserialize(d)?;
		if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
			return Ok(dt.naive_utc());
		}
		NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(D::Error::custom)
	}
}

// ─── Request / response bodies ──────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewNode {
	pub name: String,
	pub icon: String,
	pub x: f64,
	pub y: f64,
}

/// Body of `PUT graph/nodes/{id}`: either the attribute set or a position.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodeUpdate {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub owned: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub x: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub y: Option<f64>,
}

impl NodeUpdate {
	pub fn attributes(form: &NodeForm) -> Self {
		Self {
			name: Some(form.name.trim().to_string()),
			icon: Some(form.icon.clone()),
			notes: Some(form.notes.clone()),
			owned: Some(form.owned),
			..Self::default()
		}
	}

	pub fn position(position: Position) -> Self {
		Self {
			x: Some(position.x),
			y: Some(position.y),
			..Self::default()
		}
	}

	pub fn is_position_only(&self) -> bool {
		self.name.is_none()
			&& self.icon.is_none()
			&& self.notes.is_none()
			&& self.owned.is_none()
			&& self.x.is_some()
			&& self.y.is_some()
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeEndpoints {
	pub source: String,
	pub target: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeUpdate {
	pub label: String,
	pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecuteRequest {
	pub command: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersistCommandRequest {
	pub command: String,
	pub output: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeleteCommandRequest {
	pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwitchFileRequest {
	pub name: String,
}

/// `{"id": ..}` returned by create endpoints.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Created {
	pub id: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CommandList {
	pub commands: Vec<CommandRecord>,
}

/// `GET files` answers either a bare array or `{"files": [...]}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FileList {
	Bare(Vec<String>),
	Wrapped { files: Vec<String> },
}

impl FileList {
	pub fn into_names(self) -> Vec<String> {
		match self {
			FileList::Bare(files) | FileList::Wrapped { files } => files,
		}
	}
}

// ─── Edit surface forms ─────────────────────────────────────────────────

/// Contents of the node edit surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeForm {
	pub id: String,
	pub name: String,
	pub icon: String,
	pub notes: String,
	pub owned: bool,
}

impl From<&Node> for NodeForm {
	fn from(node: &Node) -> Self {
		Self {
			id: node.id.clone(),
			name: node.name.clone(),
			icon: node.icon.clone(),
			notes: node.notes.clone(),
			owned: node.owned,
		}
	}
}

/// Contents of the edge edit surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeForm {
	pub id: String,
	pub label: String,
	pub color: String,
}

impl From<&Edge> for EdgeForm {
	fn from(edge: &Edge) -> Self {
		Self {
			id: edge.id.clone(),
			label: edge.label.clone(),
			color: edge.color.clone(),
		}
	}
}
