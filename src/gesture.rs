//! Pointer gestures as delivered to the interaction controller.
//!
//! The canvas component translates raw mouse events into these; nothing
//! downstream sees a DOM event.

use crate::model::Position;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureKind {
	Tap,
	DoubleTap,
	/// Secondary-button tap.
	ContextTap,
	DragStart,
	DragMove,
	DragEnd,
}

/// Element a gesture landed on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
	Background,
	Node(String),
	Edge(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
	pub shift: bool,
	pub ctrl: bool,
	pub alt: bool,
	pub meta: bool,
}

impl Modifiers {
	pub const SHIFT: Modifiers = Modifiers {
		shift: true,
		ctrl: false,
		alt: false,
		meta: false,
	};

	pub const CTRL: Modifiers = Modifiers {
		shift: false,
		ctrl: true,
		alt: false,
		meta: false,
	};

	/// Shift or Ctrl: the multi-select modifiers.
	pub fn multi_select(&self) -> bool {
		self.shift || self.ctrl
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gesture {
	pub kind: GestureKind,
	pub target: Target,
	pub modifiers: Modifiers,
	/// For drag gestures, the dragged node's position in canvas coordinates.
	pub position: Option<Position>,
}

impl Gesture {
	pub fn new(kind: GestureKind, target: Target) -> Self {
		Self {
			kind,
			target,
			modifiers: Modifiers::default(),
			position: None,
		}
	}

	pub fn tap_node(id: &str) -> Self {
		Self::new(GestureKind::Tap, Target::Node(id.into()))
	}

	pub fn tap_background() -> Self {
		Self::new(GestureKind::Tap, Target::Background)
	}

	pub fn drag(kind: GestureKind, id: &str, position: Position) -> Self {
		Self::new(kind, Target::Node(id.into())).at(position)
	}

	pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
		self.modifiers = modifiers;
		self
	}

	pub fn at(mut self, position: Position) -> Self {
		self.position = Some(position);
		self
	}
}
