//! [`Backend`] over HTTP.
//!
//! Error bodies look like `{"error": "Node not found"}`; the message is lifted
//! out of them so it can be shown to the user verbatim.

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::backend::{Backend, ChunkStream};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::model::{
	CommandList, CommandRecord, Created, DeleteCommandRequest, EdgeEndpoints, EdgeUpdate,
	ExecuteRequest, FileList, GraphSnapshot, NewNode, NodeUpdate, PersistCommandRequest,
	SwitchFileRequest,
};

#[derive(Deserialize)]
struct ErrorBody {
	error: String,
}

pub struct HttpBackend {
	client: Client,
	config: ClientConfig,
}

impl HttpBackend {
	pub fn new(config: ClientConfig) -> Self {
		Self {
			client: Client::new(),
			config,
		}
	}

	fn url(&self, path: &str) -> String {
		self.config.endpoint(path)
	}

	fn node_url(&self, id: &str, action: &str) -> String {
		if action.is_empty() {
			self.url(&format!("graph/nodes/{id}"))
		} else {
			self.url(&format!("graph/nodes/{id}/{action}"))
		}
	}
}

/// Pass successful responses through; turn anything else into
/// [`ApiError::Status`] carrying the body's message.
async fn check(response: Response) -> Result<Response, ApiError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}
	let body = response.text().await.unwrap_or_default();
	Err(ApiError::Status {
		status: status.as_u16(),
		message: error_message(&body, status.canonical_reason()),
	})
}

fn error_message(body: &str, reason: Option<&str>) -> String {
	if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
		return parsed.error;
	}
	let body = body.trim();
	if body.is_empty() {
		reason.unwrap_or("request failed").to_string()
	} else {
		body.to_string()
	}
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
	let response = check(response).await?;
	let text = response.text().await?;
	Ok(serde_json::from_str(&text)?)
}

async fn empty(response: Response) -> Result<(), ApiError> {
	check(response).await.map(drop)
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
	async fn fetch_graph(&self) -> Result<GraphSnapshot, ApiError> {
		json(self.client.get(self.url("graph")).send().await?).await
	}

	async fn create_node(&self, node: &NewNode) -> Result<String, ApiError> {
		let response = self.client.post(self.url("graph/nodes")).json(node).send().await?;
		let created: Created = json(response).await?;
		Ok(created.id)
	}

	async fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<(), ApiError> {
		let response = self.client.put(self.node_url(id, "")).json(update).send().await?;
		empty(response).await
	}

	async fn delete_node(&self, id: &str) -> Result<(), ApiError> {
		empty(self.client.delete(self.node_url(id, "")).send().await?).await
	}

	async fn create_edge(&self, endpoints: &EdgeEndpoints) -> Result<String, ApiError> {
		let response = self.client.post(self.url("graph/edges")).json(endpoints).send().await?;
		let created: Created = json(response).await?;
		Ok(created.id)
	}

	async fn update_edge(&self, id: &str, update: &EdgeUpdate) -> Result<(), ApiError> {
		let url = self.url(&format!("graph/edges/{id}"));
		empty(self.client.put(url).json(update).send().await?).await
	}

	async fn delete_edge(&self, id: &str) -> Result<(), ApiError> {
		let url = self.url(&format!("graph/edges/{id}"));
		empty(self.client.delete(url).send().await?).await
	}

	async fn execute(&self, id: &str, command: &str) -> Result<ChunkStream, ApiError> {
		let body = ExecuteRequest {
			command: command.to_string(),
		};
		let response = self.client.post(self.node_url(id, "execute")).json(&body).send().await?;
		let response = check(response).await?;
		debug!("execute {id}: streaming {}", response.status());
		Ok(response
			.bytes_stream()
			.map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from))
			.boxed_local())
	}

	async fn persist_command(
		&self,
		id: &str,
		command: &str,
		output: &str,
	) -> Result<Vec<CommandRecord>, ApiError> {
		let body = PersistCommandRequest {
			command: command.to_string(),
			output: output.to_string(),
		};
		let response = self
			.client
			.post(self.node_url(id, "persist-command"))
			.json(&body)
			.send()
			.await?;
		let list: CommandList = json(response).await?;
		Ok(list.commands)
	}

	async fn delete_command(&self, id: &str, index: usize) -> Result<(), ApiError> {
		let response = self
			.client
			.delete(self.node_url(id, "delete-command"))
			.json(&DeleteCommandRequest { index })
			.send()
			.await?;
		empty(response).await
	}

	async fn clear_graph(&self) -> Result<(), ApiError> {
		empty(self.client.delete(self.url("graph")).send().await?).await
	}

	async fn list_files(&self) -> Result<Vec<String>, ApiError> {
		let files: FileList = json(self.client.get(self.url("files")).send().await?).await?;
		Ok(files.into_names())
	}

	async fn switch_file(&self, name: &str) -> Result<GraphSnapshot, ApiError> {
		let body = SwitchFileRequest {
			name: name.to_string(),
		};
		json(self.client.post(self.url("switch")).json(&body).send().await?).await
	}

	async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<GraphSnapshot, ApiError> {
		let url = Url::parse_with_params(&self.url("upload"), &[("name", name)])
			.map_err(|err| ApiError::Network(err.to_string()))?;
		let response = self
			.client
			.post(url)
			.header("Content-Type", "application/octet-stream")
			.body(bytes)
			.send()
			.await?;
		json(response).await
	}

	fn export_url(&self, name: &str) -> String {
		self.url(&format!("files/{name}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_message_prefers_json_error_field() {
		assert_eq!(
			error_message(r#"{"error": "Node not found"}"#, Some("Not Found")),
			"Node not found"
		);
		assert_eq!(error_message("boom\n", Some("Internal Server Error")), "boom");
		assert_eq!(error_message("", Some("Bad Request")), "Bad Request");
	}

	#[test]
	fn urls_are_rooted_at_the_api() {
		let backend = HttpBackend::new(ClientConfig::default().with_origin("http://127.0.0.1:5000"));
		assert_eq!(
			backend.node_url("node-1", "execute"),
			"http://127.0.0.1:5000/api/v1/graph/nodes/node-1/execute"
		);
		assert_eq!(backend.node_url("node-1", ""), "http://127.0.0.1:5000/api/v1/graph/nodes/node-1");
		assert_eq!(
			backend.export_url("engagement.json"),
			"http://127.0.0.1:5000/api/v1/files/engagement.json"
		);
	}
}
