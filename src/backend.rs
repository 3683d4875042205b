//! The persistence backend as seen by the client.
//!
//! Every call is a single request; nothing here retries or caches. The
//! browser build talks HTTP through [`crate::http::HttpBackend`]; tests plug in
//! an in-memory implementation.

use async_trait::async_trait;
use futures::stream::LocalBoxStream;

use crate::error::ApiError;
use crate::model::{
	CommandRecord, EdgeEndpoints, EdgeUpdate, GraphSnapshot, NewNode, NodeUpdate,
};

/// Raw body chunks of a command execution, in arrival order.
pub type ChunkStream = LocalBoxStream<'static, Result<Vec<u8>, ApiError>>;

#[async_trait(?Send)]
pub trait Backend {
	/// `GET graph`
	async fn fetch_graph(&self) -> Result<GraphSnapshot, ApiError>;

	/// `POST graph/nodes`, returning the new node id.
	async fn create_node(&self, node: &NewNode) -> Result<String, ApiError>;

	/// `PUT graph/nodes/{id}` with either attributes or a position.
	async fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<(), ApiError>;

	async fn delete_node(&self, id: &str) -> Result<(), ApiError>;

	/// `POST graph/edges`; the backend picks label and color.
	async fn create_edge(&self, endpoints: &EdgeEndpoints) -> Result<String, ApiError>;

	async fn update_edge(&self, id: &str, update: &EdgeUpdate) -> Result<(), ApiError>;

	async fn delete_edge(&self, id: &str) -> Result<(), ApiError>;

	/// `POST graph/nodes/{id}/execute`. Resolves once the response headers
	/// arrive; a non-success status is an error here, not inside the stream.
	async fn execute(&self, id: &str, command: &str) -> Result<ChunkStream, ApiError>;

	/// `POST graph/nodes/{id}/persist-command`, returning the node's full
	/// command list.
	async fn persist_command(
		&self,
		id: &str,
		command: &str,
		output: &str,
	) -> Result<Vec<CommandRecord>, ApiError>;

	/// `DELETE graph/nodes/{id}/delete-command`; `index` is oldest-first.
	async fn delete_command(&self, id: &str, index: usize) -> Result<(), ApiError>;

	/// `DELETE graph`
	async fn clear_graph(&self) -> Result<(), ApiError>;

	async fn list_files(&self) -> Result<Vec<String>, ApiError>;

	/// `POST switch`, returning the snapshot of the now-active file.
	async fn switch_file(&self, name: &str) -> Result<GraphSnapshot, ApiError>;

	/// `POST upload`, returning the snapshot of the uploaded file.
	async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<GraphSnapshot, ApiError>;

	/// Download location of a graph file. Navigating there is left to the
	/// browser.
	fn export_url(&self, name: &str) -> String;
}
