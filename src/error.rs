//! Error taxonomy for the editor.
//!
//! Validation errors never reach the network, transport errors come from the
//! backend, and store errors describe lookups against the local graph copy.
//! None of them are fatal to the session.

/// Transport failure: the request could not be sent or the backend answered
/// with a non-success status.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
	/// The request never produced a response.
	#[error("network error: {0}")]
	Network(String),

	/// The backend answered with a non-success HTTP status.
	#[error("request failed with status {status}: {message}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, or the canonical reason when the body was empty.
		message: String,
	},

	/// The response body could not be decoded.
	#[error("invalid response body: {0}")]
	Decode(String),

	/// The operation was aborted locally before it finished.
	#[error("cancelled")]
	Cancelled,
}

impl ApiError {
	/// Text shown inline to the user: the backend's own message when it sent
	/// one.
	pub fn user_message(&self) -> String {
		match self {
			ApiError::Status { message, .. } => message.clone(),
			other => other.to_string(),
		}
	}
}

impl From<reqwest::Error> for ApiError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			ApiError::Decode(err.to_string())
		} else {
			ApiError::Network(err.to_string())
		}
	}
}

impl From<serde_json::Error> for ApiError {
	fn from(err: serde_json::Error) -> Self {
		ApiError::Decode(err.to_string())
	}
}

/// Input rejected locally before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	/// A required form field was empty.
	#[error("{0} required")]
	MissingField(&'static str),

	/// A multi-node operation was invoked with too few selected nodes.
	#[error("select at least {required} nodes (have {selected})")]
	NotEnoughSelected {
		/// Minimum selection size.
		required: usize,
		/// Current selection size.
		selected: usize,
	},
}

impl ValidationError {
	/// Text shown in the blocking prompt for this error.
	pub fn prompt(&self) -> String {
		match self {
			ValidationError::MissingField(field) => {
				let mut chars = field.chars();
				let capitalized = chars
					.next()
					.map(|c| c.to_uppercase().chain(chars).collect::<String>())
					.unwrap_or_default();
				format!("{capitalized} required!")
			}
			ValidationError::NotEnoughSelected { required, .. } => {
				format!("Select at least {required} nodes to connect!")
			}
		}
	}
}

/// Lookup failure against the local graph copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
	#[error("node not found: {0}")]
	NodeNotFound(String),

	#[error("edge not found: {0}")]
	EdgeNotFound(String),

	#[error("command {index} out of range for node {node} ({len} commands)")]
	CommandIndexOutOfRange {
		node: String,
		index: usize,
		len: usize,
	},
}

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("invalid configuration JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("unknown log level: {0}")]
	LogLevel(String),
}

/// Umbrella error returned by session operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Api(#[from] ApiError),

	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error(transparent)]
	Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validation_prompts_match_editor_wording() {
		assert_eq!(ValidationError::MissingField("name").prompt(), "Name required!");
		assert_eq!(ValidationError::MissingField("label").prompt(), "Label required!");
		assert_eq!(
			ValidationError::NotEnoughSelected {
				required: 2,
				selected: 1
			}
			.prompt(),
			"Select at least 2 nodes to connect!"
		);
	}

	#[test]
	fn status_error_carries_message() {
		let err = ApiError::Status {
			status: 404,
			message: "Node not found".into(),
		};
		assert_eq!(
			err.to_string(),
			"request failed with status 404: Node not found"
		);
	}
}
