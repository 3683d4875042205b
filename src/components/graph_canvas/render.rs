use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use crate::store::{GraphStore, Marks};

const BACKGROUND: &str = "#1a1a2e";
const ARROW_COLOR: &str = "#FF5722";
const EDGE_WIDTH: f64 = 8.0;
const ARROW_SIZE: f64 = 22.0;
const NODE_FONT_PX: f64 = 18.0;
const EDGE_FONT_PX: f64 = 16.0;
const LABEL_MAX_WIDTH: f64 = 140.0;
const LINE_HEIGHT: f64 = 22.0;

/// Border width and color for a node's marks. A drag target outranks the
/// open node, which outranks multi-selection.
pub fn border_style(marks: Marks) -> (f64, &'static str) {
	if marks.drag_target {
		(6.0, "#00FF00")
	} else if marks.selected {
		(8.0, "#FFD700")
	} else if marks.multi_selected {
		(6.0, "orange")
	} else {
		(4.0, "rgba(255, 255, 255, 0.8)")
	}
}

/// Break `text` at newlines, then greedily at spaces so no line is wider
/// than `max_width`. A single word wider than that keeps its own line.
pub fn wrap_label(text: &str, max_width: f64, measure: impl Fn(&str) -> f64) -> Vec<String> {
	let mut lines = Vec::new();
	for paragraph in text.split('\n') {
		let mut line = String::new();
		for word in paragraph.split_whitespace() {
			let candidate = if line.is_empty() {
				word.to_string()
			} else {
				format!("{line} {word}")
			};
			if !line.is_empty() && measure(&candidate) > max_width {
				lines.push(std::mem::replace(&mut line, word.to_string()));
			} else {
				line = candidate;
			}
		}
		lines.push(line);
	}
	lines
}

pub fn render(store: &GraphStore, ctx: &CanvasRenderingContext2d) {
	let (width, height) = store.canvas_size();
	let view = store.viewport();
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, width, height);
	ctx.save();
	let _ = ctx.translate(view.x, view.y);
	let _ = ctx.scale(view.k, view.k);
	draw_edges(store, ctx);
	draw_nodes(store, ctx);
	ctx.restore();
}

fn measure(ctx: &CanvasRenderingContext2d, text: &str) -> f64 {
	ctx.measure_text(text).map(|m| m.width()).unwrap_or(0.0)
}

fn draw_edges(store: &GraphStore, ctx: &CanvasRenderingContext2d) {
	let r = store.node_radius();
	for (edge, from, to) in store.edges() {
		let (dx, dy) = (to.x - from.x, to.y - from.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist <= 2.0 * r {
			continue;
		}
		let (ux, uy) = (dx / dist, dy / dist);

		ctx.set_stroke_style_str(&edge.color);
		ctx.set_line_width(EDGE_WIDTH);
		ctx.begin_path();
		ctx.move_to(from.x + ux * r, from.y + uy * r);
		ctx.line_to(to.x - ux * (r + ARROW_SIZE), to.y - uy * (r + ARROW_SIZE));
		ctx.stroke();

		let (tip_x, tip_y) = (to.x - ux * r, to.y - uy * r);
		let (back_x, back_y) = (tip_x - ux * ARROW_SIZE, tip_y - uy * ARROW_SIZE);
		let (px, py) = (-uy * ARROW_SIZE * 0.5, ux * ARROW_SIZE * 0.5);
		ctx.set_fill_style_str(ARROW_COLOR);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();

		if edge.label.is_empty() {
			continue;
		}
		let (mx, my) = ((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
		ctx.set_font(&format!("{EDGE_FONT_PX}px sans-serif"));
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		let w = measure(ctx, &edge.label) + 8.0;
		ctx.set_fill_style_str("rgba(0, 0, 0, 0.7)");
		ctx.fill_rect(mx - w / 2.0, my - EDGE_FONT_PX * 0.7, w, EDGE_FONT_PX * 1.4);
		ctx.set_fill_style_str("white");
		let _ = ctx.fill_text(&edge.label, mx, my);
	}
}

fn draw_nodes(store: &GraphStore, ctx: &CanvasRenderingContext2d) {
	let r = store.node_radius();
	for entry in store.nodes() {
		let p = entry.node.position;

		ctx.begin_path();
		let _ = ctx.arc(p.x, p.y, r, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(entry.node.display_color());
		ctx.fill();

		let (border, color) = border_style(entry.marks);
		ctx.set_line_width(border);
		ctx.set_stroke_style_str(color);
		ctx.stroke();

		ctx.set_font(&format!("bold {NODE_FONT_PX}px sans-serif"));
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		ctx.set_fill_style_str("white");
		let lines = wrap_label(entry.node.display_label(), LABEL_MAX_WIDTH, |s| measure(ctx, s));
		let top = p.y - (lines.len() as f64 - 1.0) * LINE_HEIGHT / 2.0;
		for (i, line) in lines.iter().enumerate() {
			let _ = ctx.fill_text(line, p.x, top + i as f64 * LINE_HEIGHT);
		}
	}
}
