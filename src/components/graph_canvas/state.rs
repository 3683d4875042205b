//! Pointer tracking for the canvas: raw presses and motion in, gestures out.

use crate::gesture::{Gesture, GestureKind, Modifiers, Target};
use crate::model::Position;
use crate::store::ViewTransform;

/// Screen pixels a press may wander before it counts as a drag.
pub const DRAG_SLOP: f64 = 4.0;
/// Edge hit distance, in screen pixels.
pub const EDGE_HIT_TOLERANCE: f64 = 8.0;

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug)]
struct Press {
	target: Target,
	modifiers: Modifiers,
	start_x: f64,
	start_y: f64,
	node_start: Option<Position>,
	last: Option<Position>,
	pan: PanState,
	dragging: bool,
}

/// What the component should do after a pointer event.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerAction {
	None,
	Gesture(Gesture),
	/// Move the viewport translation to `(x, y)`.
	Pan { x: f64, y: f64 },
}

#[derive(Debug, Default)]
pub struct PointerTracker {
	press: Option<Press>,
}

impl PointerTracker {
	/// Primary button went down at screen `(x, y)` over `target`.
	/// `node_start` is the pressed node's position, if a node was hit.
	pub fn press(
		&mut self,
		target: Target,
		modifiers: Modifiers,
		(x, y): (f64, f64),
		node_start: Option<Position>,
		view: ViewTransform,
	) {
		self.press = Some(Press {
			target,
			modifiers,
			start_x: x,
			start_y: y,
			node_start,
			last: node_start,
			pan: PanState {
				start_x: x,
				start_y: y,
				transform_start_x: view.x,
				transform_start_y: view.y,
			},
			dragging: false,
		});
	}

	pub fn motion(&mut self, (x, y): (f64, f64), k: f64) -> PointerAction {
		let Some(press) = self.press.as_mut() else {
			return PointerAction::None;
		};
		let (dx, dy) = (x - press.start_x, y - press.start_y);
		if !press.dragging && (dx * dx + dy * dy).sqrt() < DRAG_SLOP {
			return PointerAction::None;
		}
		let first = !press.dragging;
		press.dragging = true;

		match (&press.target, press.node_start) {
			(Target::Node(id), Some(start)) => {
				let position = Position::new(start.x + dx / k, start.y + dy / k);
				press.last = Some(position);
				let kind = if first {
					GestureKind::DragStart
				} else {
					GestureKind::DragMove
				};
				PointerAction::Gesture(Gesture::drag(kind, id, position).with_modifiers(press.modifiers))
			}
			_ => PointerAction::Pan {
				x: press.pan.transform_start_x + (x - press.pan.start_x),
				y: press.pan.transform_start_y + (y - press.pan.start_y),
			},
		}
	}

	/// Primary button released: a drop, a tap, or the end of a pan.
	pub fn release(&mut self) -> PointerAction {
		let Some(press) = self.press.take() else {
			return PointerAction::None;
		};
		match (press.dragging, &press.target, press.last) {
			(true, Target::Node(id), Some(last)) => {
				PointerAction::Gesture(Gesture::drag(GestureKind::DragEnd, id, last))
			}
			(true, _, _) => PointerAction::None,
			(false, target, _) => PointerAction::Gesture(
				Gesture::new(GestureKind::Tap, target.clone()).with_modifiers(press.modifiers),
			),
		}
	}

	/// Pointer left the canvas: finish a drag, drop anything else.
	pub fn cancel(&mut self) -> PointerAction {
		match &self.press {
			Some(press) if press.dragging => self.release(),
			_ => {
				self.press = None;
				PointerAction::None
			}
		}
	}

	pub fn is_dragging(&self) -> bool {
		self.press.as_ref().is_some_and(|p| p.dragging)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn view() -> ViewTransform {
		ViewTransform { x: 10.0, y: 20.0, k: 2.0 }
	}

	#[test]
	fn small_wobble_is_still_a_tap() {
		let mut tracker = PointerTracker::default();
		tracker.press(
			Target::Node("a".into()),
			Modifiers::SHIFT,
			(100.0, 100.0),
			Some(Position::new(0.0, 0.0)),
			view(),
		);
		assert_eq!(tracker.motion((102.0, 101.0), 2.0), PointerAction::None);
		assert_eq!(
			tracker.release(),
			PointerAction::Gesture(Gesture::tap_node("a").with_modifiers(Modifiers::SHIFT))
		);
	}

	#[test]
	fn node_drag_scales_motion_by_zoom() {
		let mut tracker = PointerTracker::default();
		tracker.press(
			Target::Node("a".into()),
			Modifiers::default(),
			(100.0, 100.0),
			Some(Position::new(50.0, 50.0)),
			view(),
		);
		let start = tracker.motion((120.0, 100.0), 2.0);
		assert_eq!(
			start,
			PointerAction::Gesture(Gesture::drag(GestureKind::DragStart, "a", Position::new(60.0, 50.0)))
		);
		let moved = tracker.motion((140.0, 120.0), 2.0);
		assert_eq!(
			moved,
			PointerAction::Gesture(Gesture::drag(GestureKind::DragMove, "a", Position::new(70.0, 60.0)))
		);
		assert!(tracker.is_dragging());
		assert_eq!(
			tracker.release(),
			PointerAction::Gesture(Gesture::drag(GestureKind::DragEnd, "a", Position::new(70.0, 60.0)))
		);
		assert!(!tracker.is_dragging());
	}

	#[test]
	fn background_drag_pans_without_a_tap() {
		let mut tracker = PointerTracker::default();
		tracker.press(Target::Background, Modifiers::default(), (0.0, 0.0), None, view());
		assert_eq!(
			tracker.motion((30.0, -10.0), 2.0),
			PointerAction::Pan { x: 40.0, y: 10.0 }
		);
		assert_eq!(tracker.release(), PointerAction::None);
	}

	#[test]
	fn leaving_mid_drag_drops_the_node() {
		let mut tracker = PointerTracker::default();
		tracker.press(
			Target::Node("a".into()),
			Modifiers::default(),
			(0.0, 0.0),
			Some(Position::new(0.0, 0.0)),
			view(),
		);
		tracker.motion((10.0, 0.0), 1.0);
		assert_eq!(
			tracker.cancel(),
			PointerAction::Gesture(Gesture::drag(GestureKind::DragEnd, "a", Position::new(10.0, 0.0)))
		);

		tracker.press(Target::Background, Modifiers::default(), (0.0, 0.0), None, view());
		assert_eq!(tracker.cancel(), PointerAction::None);
		assert_eq!(tracker.release(), PointerAction::None);
	}
}
