//! Client configuration.
//!
//! Defaults cover the stock deployment. A page may override any field by
//! embedding JSON in `<meta name="engagement-graph-config" content="...">`.

use std::str::FromStr;

use log::Level;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the `<meta>` tag carrying configuration overrides.
pub const CONFIG_META_NAME: &str = "engagement-graph-config";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Scheme + host the API is served from. Empty means "same origin" and is
	/// replaced with the page origin at startup.
	pub base_url: String,
	/// Versioned root path of every endpoint.
	pub api_root: String,
	/// Drag-connect proximity, in canvas units. Candidates must be strictly closer.
	pub proximity_threshold: f64,
	/// Padding kept around the elements when fitting the viewport.
	pub fit_margin: f64,
	/// Rendered node diameter, in canvas units.
	pub node_size: f64,
	/// How long an in-page toast stays up before it counts as unacknowledged.
	pub toast_timeout_ms: u32,
	pub log_level: String,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			api_root: "/api/v1".into(),
			proximity_threshold: 120.0,
			fit_margin: 60.0,
			node_size: 160.0,
			toast_timeout_ms: 5000,
			log_level: "debug".into(),
		}
	}
}

impl ClientConfig {
	/// Parse overrides on top of the defaults.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(json)?;
		config.level()?;
		Ok(config)
	}

	/// Configured log level.
	pub fn level(&self) -> Result<Level, ConfigError> {
		Level::from_str(&self.log_level).map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
	}

	/// Absolute URL of an API path such as `graph/nodes`.
	pub fn endpoint(&self, path: &str) -> String {
		format!(
			"{}/{}/{}",
			self.base_url.trim_end_matches('/'),
			self.api_root.trim_matches('/'),
			path.trim_start_matches('/')
		)
	}

	/// Fill in `base_url` when it was left empty.
	pub fn with_origin(mut self, origin: &str) -> Self {
		if self.base_url.is_empty() {
			self.base_url = origin.to_string();
		}
		self
	}

	/// Read the configuration of the current page, falling back to defaults.
	pub fn from_document() -> Self {
		let Some(window) = web_sys::window() else {
			return Self::default();
		};
		let overrides = window
			.document()
			.and_then(|doc| {
				doc.query_selector(&format!("meta[name=\"{CONFIG_META_NAME}\"]"))
					.ok()
					.flatten()
			})
			.and_then(|meta| meta.get_attribute("content"));

		let config = match overrides {
			Some(json) => Self::from_json(&json).unwrap_or_else(|err| {
				log::warn!("ignoring page configuration: {err}");
				Self::default()
			}),
			None => Self::default(),
		};
		match window.location().origin() {
			Ok(origin) => config.with_origin(&origin),
			Err(_) => config,
		}
	}
}
