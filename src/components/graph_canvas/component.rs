use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::state::{EDGE_HIT_TOLERANCE, PointerAction, PointerTracker};
use crate::gesture::{Gesture, GestureKind, Modifiers, Target};
use crate::session::EditorSession;
use crate::store::{MAX_ZOOM, MIN_ZOOM};

fn modifiers(ev: &MouseEvent) -> Modifiers {
	Modifiers {
		shift: ev.shift_key(),
		ctrl: ev.ctrl_key(),
		alt: ev.alt_key(),
		meta: ev.meta_key(),
	}
}

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Element under screen point `(x, y)`.
fn hit(session: &EditorSession, (x, y): (f64, f64)) -> Target {
	let store = session.store().borrow();
	let view = store.viewport();
	let p = view.screen_to_graph(x, y);
	if let Some(id) = store.node_at(p) {
		Target::Node(id)
	} else if let Some(id) = store.edge_at(p, EDGE_HIT_TOLERANCE / view.k) {
		Target::Edge(id)
	} else {
		Target::Background
	}
}

/// Apply a gesture locally and run whatever it leaves pending.
fn run(session: &EditorSession, gesture: Gesture) {
	let pending = session.dispatch(&gesture);
	if pending.is_empty() {
		return;
	}
	let session = session.clone();
	spawn_local(async move {
		for intent in pending {
			// failures are logged by the gateway
			let _ = session.perform(intent).await;
		}
	});
}

fn apply(session: &EditorSession, action: PointerAction) {
	match action {
		PointerAction::None => {}
		PointerAction::Gesture(gesture) => run(session, gesture),
		PointerAction::Pan { x, y } => {
			let mut store = session.store().borrow_mut();
			let view = store.viewport_mut();
			view.x = x;
			view.y = y;
		}
	}
}

fn fit_to_parent(canvas: &HtmlCanvasElement) -> (f64, f64) {
	let (w, h) = canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.unwrap_or((800.0, 600.0));
	canvas.set_width(w as u32);
	canvas.set_height(h as u32);
	(w, h)
}

/// The graph surface. Fills its parent element and redraws every frame from
/// the session's store.
#[component]
pub fn GraphCanvas(session: EditorSession) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let tracker: Rc<RefCell<PointerTracker>> = Rc::default();
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (session_init, animate_init, resize_cb_init) =
		(session.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};
		let (w, h) = fit_to_parent(&canvas);
		session_init.store().borrow_mut().set_canvas_size(w, h);
		session_init.reset_view();

		let ctx: CanvasRenderingContext2d = match canvas.get_context("2d") {
			Ok(Some(ctx)) => match ctx.dyn_into() {
				Ok(ctx) => ctx,
				Err(_) => return,
			},
			_ => {
				log::error!("canvas has no 2d context; graph will not render");
				return;
			}
		};

		let (session_resize, canvas_resize) = (session_init.clone(), canvas.clone());
		*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
			let (nw, nh) = fit_to_parent(&canvas_resize);
			session_resize.store().borrow_mut().set_canvas_size(nw, nh);
		}));
		if let Some(ref cb) = *resize_cb_init.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (session_anim, animate_inner) = (session_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Ok(store) = session_anim.store().try_borrow() {
				render::render(&store, &ctx);
			}
			if let (Some(win), Some(cb)) = (web_sys::window(), animate_inner.borrow().as_ref()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let (session_md, tracker_md) = (session.clone(), tracker.clone());
	let on_mousedown = move |ev: MouseEvent| {
		if ev.button() != 0 {
			return;
		}
		let Some(point) = local_point(canvas_ref, &ev) else {
			return;
		};
		let target = hit(&session_md, point);
		let (node_start, view) = {
			let store = session_md.store().borrow();
			let start = match &target {
				Target::Node(id) => store.node(id).ok().map(|n| n.position),
				_ => None,
			};
			(start, store.viewport())
		};
		tracker_md
			.borrow_mut()
			.press(target, modifiers(&ev), point, node_start, view);
	};

	let (session_mm, tracker_mm) = (session.clone(), tracker.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let Some(point) = local_point(canvas_ref, &ev) else {
			return;
		};
		let k = session_mm.store().borrow().viewport().k;
		let action = tracker_mm.borrow_mut().motion(point, k);
		apply(&session_mm, action);
	};

	let (session_mu, tracker_mu) = (session.clone(), tracker.clone());
	let on_mouseup = move |ev: MouseEvent| {
		if ev.button() != 0 {
			return;
		}
		let action = tracker_mu.borrow_mut().release();
		apply(&session_mu, action);
	};

	let (session_ml, tracker_ml) = (session.clone(), tracker.clone());
	let on_mouseleave = move |_: MouseEvent| {
		let action = tracker_ml.borrow_mut().cancel();
		apply(&session_ml, action);
	};

	let session_dbl = session.clone();
	let on_dblclick = move |ev: MouseEvent| {
		let Some(point) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let target @ Target::Edge(_) = hit(&session_dbl, point) {
			run(&session_dbl, Gesture::new(GestureKind::DoubleTap, target));
		}
	};

	let session_cx = session.clone();
	let on_contextmenu = move |ev: MouseEvent| {
		ev.prevent_default();
		let Some(point) = local_point(canvas_ref, &ev) else {
			return;
		};
		let target = hit(&session_cx, point);
		if matches!(target, Target::Edge(_)) {
			run(
				&session_cx,
				Gesture::new(GestureKind::ContextTap, target).with_modifiers(modifiers(&ev)),
			);
		}
	};

	let session_wh = session.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		let mut store = session_wh.store().borrow_mut();
		let view = store.viewport_mut();
		let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
		let new_k = (view.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = new_k / view.k;
		view.x = x - (x - view.x) * ratio;
		view.y = y - (y - view.y) * ratio;
		view.k = new_k;
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:dblclick=on_dblclick
			on:contextmenu=on_contextmenu
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
