//! Engagement graph editor: hosts as nodes, relationships as edges, and a
//! per-host log of executed commands with live streamed output.
//!
//! The behavioral core (`store`, `interaction`, `stream`, `sync`, `session`)
//! is plain Rust over the [`backend::Backend`] and [`notify`] traits. The
//! Leptos client-side app wiring and routes live here.

use leptos::prelude::*;
use leptos_meta::*;
use leptos_router::components::*;
use leptos_router::path;
use log::{Level, info};

pub mod backend;
pub mod browser;
pub mod config;
pub mod error;
pub mod gesture;
pub mod http;
pub mod interaction;
pub mod model;
pub mod notify;
pub mod session;
pub mod store;
pub mod stream;
pub mod sync;

mod components;
mod pages;

use crate::config::ClientConfig;
use crate::pages::editor::Editor;
use crate::pages::not_found::NotFound;

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging(level: Level) {
	let _ = console_log::init_with_level(level);
	console_error_panic_hook::set_once();
	info!("Logging initialized at {level}");
}

/// An app router which renders the editor and handles 404's
#[component]
pub fn App() -> impl IntoView {
	// Provides context that manages stylesheets, titles, meta tags, etc.
	provide_meta_context();
	provide_context(ClientConfig::from_document());

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />

		// sets the document title
		<Title text="Engagement Graph" />

		// injects metadata in the <head> of the page
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<Router>
			<Routes fallback=|| view! { <NotFound /> }>
				<Route path=path!("/") view=Editor />
			</Routes>
		</Router>
	}
}
