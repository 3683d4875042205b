//! Synchronisation between the local [`GraphStore`] and the backend.
//!
//! | Operation | Local effect |
//! |-----------|--------------|
//! | create node, update attributes, create/update/delete edge | refetch |
//! | update position | none (the node is already where the user dropped it) |
//! | delete node, delete command, clear | applied before the request, never rolled back |
//! | persist command | store the returned list on the node |
//! | switch/upload file | replace with the returned snapshot |
//!
//! Every refetch replaces the store wholesale and refits the viewport.
//! Failures are logged here and handed back; nothing retries.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, error, info};

use crate::backend::{Backend, ChunkStream};
use crate::error::ApiError;
use crate::model::{
	CommandRecord, EdgeEndpoints, EdgeForm, EdgeUpdate, GraphSnapshot, NewNode, NodeForm,
	NodeUpdate, Position,
};
use crate::store::{GraphStore, ReplaceReport};

pub type Shared<T> = Rc<RefCell<T>>;

/// Result of a pairwise connect run. Failed pairs do not stop the run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
	pub attempted: usize,
	/// `(source, target)` of each pair whose request failed.
	pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
	pub fn succeeded(&self) -> usize {
		self.attempted - self.failed.len()
	}

	pub fn is_complete(&self) -> bool {
		self.failed.is_empty()
	}
}

fn logged<T>(operation: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
	if let Err(err) = &result {
		error!("{operation} failed: {err}");
	}
	result
}

#[derive(Clone)]
pub struct SyncGateway {
	backend: Rc<dyn Backend>,
	store: Shared<GraphStore>,
}

impl SyncGateway {
	pub fn new(backend: Rc<dyn Backend>, store: Shared<GraphStore>) -> Self {
		Self { backend, store }
	}

	pub fn store(&self) -> &Shared<GraphStore> {
		&self.store
	}

	/// Replace the store with `snapshot` and fit the viewport around it.
	pub fn apply_snapshot(&self, snapshot: GraphSnapshot) -> ReplaceReport {
		let mut store = self.store.borrow_mut();
		let report = store.replace_all(snapshot);
		if !report.dangling.is_empty() {
			debug!("dropped dangling edges {:?}", report.dangling);
		}
		store.fit();
		report
	}

	/// Refetch the canonical graph. On failure the store is left as it was.
	pub async fn refresh(&self) -> Result<ReplaceReport, ApiError> {
		let snapshot = logged("fetch graph", self.backend.fetch_graph().await)?;
		Ok(self.apply_snapshot(snapshot))
	}

	async fn then_refresh(&self) {
		// already logged
		let _ = self.refresh().await;
	}

	pub async fn create_node(&self, node: &NewNode) -> Result<String, ApiError> {
		let id = logged("create node", self.backend.create_node(node).await)?;
		info!("created node {id} ({})", node.name);
		self.then_refresh().await;
		Ok(id)
	}

	pub async fn update_node(&self, form: &NodeForm) -> Result<(), ApiError> {
		let update = NodeUpdate::attributes(form);
		logged("update node", self.backend.update_node(&form.id, &update).await)?;
		self.then_refresh().await;
		Ok(())
	}

	/// Persist a dropped position without refetching.
	pub async fn update_position(&self, id: &str, position: Position) -> Result<(), ApiError> {
		let update = NodeUpdate::position(position);
		logged("update position", self.backend.update_node(id, &update).await)
	}

	pub async fn delete_node(&self, id: &str) -> Result<(), ApiError> {
		if let Err(err) = self.store.borrow_mut().remove_node(id) {
			debug!("delete node: {err}");
		}
		logged("delete node", self.backend.delete_node(id).await)
	}

	/// Create an edge and refetch.
	pub async fn connect(&self, source: &str, target: &str) -> Result<String, ApiError> {
		let id = self.create_edge(source, target).await?;
		self.then_refresh().await;
		Ok(id)
	}

	async fn create_edge(&self, source: &str, target: &str) -> Result<String, ApiError> {
		let endpoints = EdgeEndpoints {
			source: source.to_string(),
			target: target.to_string(),
		};
		let id = logged("create edge", self.backend.create_edge(&endpoints).await)?;
		debug!("created edge {id}: {source} -> {target}");
		Ok(id)
	}

	/// Connect consecutive pairs of `ids` in order, sequentially. Does not
	/// refetch; the caller refreshes once the whole run is done.
	pub async fn connect_sequence(&self, ids: &[String]) -> BatchOutcome {
		let mut outcome = BatchOutcome::default();
		for pair in ids.windows(2) {
			let (source, target) = (&pair[0], &pair[1]);
			outcome.attempted += 1;
			if self.create_edge(source, target).await.is_err() {
				outcome.failed.push((source.clone(), target.clone()));
			}
		}
		outcome
	}

	pub async fn update_edge(&self, form: &EdgeForm) -> Result<(), ApiError> {
		let update = EdgeUpdate {
			label: form.label.trim().to_string(),
			color: form.color.clone(),
		};
		logged("update edge", self.backend.update_edge(&form.id, &update).await)?;
		self.then_refresh().await;
		Ok(())
	}

	pub async fn delete_edge(&self, id: &str) -> Result<(), ApiError> {
		logged("delete edge", self.backend.delete_edge(id).await)?;
		self.then_refresh().await;
		Ok(())
	}

	pub async fn execute(&self, id: &str, command: &str) -> Result<ChunkStream, ApiError> {
		logged("execute", self.backend.execute(id, command).await)
	}

	/// Persist a transcript and store the node's authoritative command list.
	pub async fn persist_command(
		&self,
		id: &str,
		command: &str,
		output: &str,
	) -> Result<Vec<CommandRecord>, ApiError> {
		let commands = logged(
			"persist command",
			self.backend.persist_command(id, command, output).await,
		)?;
		if let Err(err) = self.store.borrow_mut().set_commands(id, commands.clone()) {
			debug!("persist command: {err}");
		}
		Ok(commands)
	}

	/// Splice the record out locally, then ask the backend to do the same.
	pub async fn delete_command(&self, id: &str, index: usize) -> Result<(), ApiError> {
		match self.store.borrow_mut().remove_command(id, index) {
			Ok(record) => debug!("removed command {index} ({}) from {id}", record.command),
			Err(err) => debug!("delete command: {err}"),
		}
		logged("delete command", self.backend.delete_command(id, index).await)
	}

	pub async fn clear_graph(&self) -> Result<(), ApiError> {
		self.store.borrow_mut().clear();
		logged("clear graph", self.backend.clear_graph().await)
	}

	pub async fn list_files(&self) -> Result<Vec<String>, ApiError> {
		logged("list files", self.backend.list_files().await)
	}

	pub async fn switch_file(&self, name: &str) -> Result<ReplaceReport, ApiError> {
		let snapshot = logged("switch file", self.backend.switch_file(name).await)?;
		info!("switched to {name}");
		Ok(self.apply_snapshot(snapshot))
	}

	pub async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<ReplaceReport, ApiError> {
		let snapshot = logged("upload file", self.backend.upload_file(name, bytes).await)?;
		info!("uploaded {name}");
		Ok(self.apply_snapshot(snapshot))
	}

	pub fn export_url(&self, name: &str) -> String {
		self.backend.export_url(name)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;

	use async_trait::async_trait;
	use futures::executor::block_on;
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::store::tests::{edge, node};

	/// Records calls; `fail` makes the named operations answer 500.
	#[derive(Default)]
	struct Recorder {
		calls: RefCell<Vec<String>>,
		fail: Vec<&'static str>,
		snapshots: RefCell<VecDeque<GraphSnapshot>>,
	}

	impl Recorder {
		fn call(&self, name: &'static str, detail: String) -> Result<(), ApiError> {
			self.calls.borrow_mut().push(format!("{name} {detail}").trim().to_string());
			if self.fail.contains(&name) {
				Err(ApiError::Status {
					status: 500,
					message: format!("{name} broke"),
				})
			} else {
				Ok(())
			}
		}

		fn calls(&self) -> Vec<String> {
			self.calls.borrow().clone()
		}
	}

	#[async_trait(?Send)]
	impl Backend for Recorder {
		async fn fetch_graph(&self) -> Result<GraphSnapshot, ApiError> {
			self.call("fetch", String::new())?;
			Ok(self.snapshots.borrow_mut().pop_front().unwrap_or_default())
		}
		async fn create_node(&self, node: &NewNode) -> Result<String, ApiError> {
			self.call("create_node", node.name.clone())?;
			Ok(format!("{}id", node.name))
		}
		async fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<(), ApiError> {
			let kind = if update.is_position_only() { "position" } else { "attributes" };
			self.call("update_node", format!("{id} {kind}"))
		}
		async fn delete_node(&self, id: &str) -> Result<(), ApiError> {
			self.call("delete_node", id.to_string())
		}
		async fn create_edge(&self, endpoints: &EdgeEndpoints) -> Result<String, ApiError> {
			self.call("create_edge", format!("{}->{}", endpoints.source, endpoints.target))?;
			if endpoints.target == "bad" {
				return Err(ApiError::Network("refused".into()));
			}
			Ok(format!("{}-{}", endpoints.source, endpoints.target))
		}
		async fn update_edge(&self, id: &str, update: &EdgeUpdate) -> Result<(), ApiError> {
			self.call("update_edge", format!("{id} {}", update.label))
		}
		async fn delete_edge(&self, id: &str) -> Result<(), ApiError> {
			self.call("delete_edge", id.to_string())
		}
		async fn execute(&self, id: &str, _command: &str) -> Result<ChunkStream, ApiError> {
			self.call("execute", id.to_string())?;
			Ok(Box::pin(futures::stream::empty()))
		}
		async fn persist_command(
			&self,
			id: &str,
			command: &str,
			output: &str,
		) -> Result<Vec<CommandRecord>, ApiError> {
			self.call("persist_command", id.to_string())?;
			Ok(vec![CommandRecord {
				command: command.into(),
				output: output.into(),
				timestamp: Default::default(),
			}])
		}
		async fn delete_command(&self, id: &str, index: usize) -> Result<(), ApiError> {
			self.call("delete_command", format!("{id} {index}"))
		}
		async fn clear_graph(&self) -> Result<(), ApiError> {
			self.call("clear", String::new())
		}
		async fn list_files(&self) -> Result<Vec<String>, ApiError> {
			self.call("list_files", String::new())?;
			Ok(vec!["default.json".into()])
		}
		async fn switch_file(&self, name: &str) -> Result<GraphSnapshot, ApiError> {
			self.call("switch", name.to_string())?;
			Ok(GraphSnapshot {
				nodes: vec![node("x", 0.0, 0.0)],
				edges: Vec::new(),
			})
		}
		async fn upload_file(&self, name: &str, _bytes: Vec<u8>) -> Result<GraphSnapshot, ApiError> {
			self.call("upload", name.to_string())?;
			Ok(GraphSnapshot::default())
		}
		fn export_url(&self, name: &str) -> String {
			format!("/files/{name}")
		}
	}

	fn gateway(recorder: Recorder) -> (SyncGateway, Rc<Recorder>) {
		let recorder = Rc::new(recorder);
		let store = Rc::new(RefCell::new(GraphStore::default()));
		store.borrow_mut().replace_all(GraphSnapshot {
			nodes: vec![node("a", 0.0, 0.0), node("b", 100.0, 0.0)],
			edges: vec![edge("e1", "a", "b")],
		});
		(SyncGateway::new(recorder.clone(), store), recorder)
	}

	#[test]
	fn position_update_does_not_refetch() {
		let (gateway, recorder) = gateway(Recorder::default());
		block_on(gateway.update_position("a", Position::new(5.0, 5.0))).unwrap();
		assert_eq!(recorder.calls(), vec!["update_node a position"]);
	}

	#[test]
	fn attribute_update_refetches_and_replaces() {
		let (gateway, recorder) = gateway(Recorder::default());
		let form = NodeForm {
			id: "a".into(),
			name: "web01".into(),
			..NodeForm::default()
		};
		block_on(gateway.update_node(&form)).unwrap();
		assert_eq!(recorder.calls(), vec!["update_node a attributes", "fetch"]);
		// refetch answered an empty graph
		assert_eq!(gateway.store().borrow().node_count(), 0);
	}

	#[test]
	fn failed_refetch_leaves_store_alone() {
		let (gateway, _) = gateway(Recorder {
			fail: vec!["fetch"],
			..Recorder::default()
		});
		assert!(block_on(gateway.refresh()).is_err());
		assert_eq!(gateway.store().borrow().node_count(), 2);
	}

	#[test]
	fn node_delete_is_optimistic_without_rollback() {
		let (gateway, recorder) = gateway(Recorder {
			fail: vec!["delete_node"],
			..Recorder::default()
		});
		let result = block_on(gateway.delete_node("a"));
		assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
		assert!(!gateway.store().borrow().contains_node("a"));
		assert_eq!(gateway.store().borrow().edge_count(), 0);
		assert_eq!(recorder.calls(), vec!["delete_node a"]);
	}

	#[test]
	fn connect_sequence_continues_past_failures() {
		let (gateway, recorder) = gateway(Recorder::default());
		let ids: Vec<String> = ["a", "bad", "b", "c"].iter().map(|s| s.to_string()).collect();
		let outcome = block_on(gateway.connect_sequence(&ids));
		assert_eq!(outcome.attempted, 3);
		assert_eq!(outcome.failed, vec![("a".to_string(), "bad".to_string())]);
		assert_eq!(outcome.succeeded(), 2);
		assert_eq!(
			recorder.calls(),
			vec!["create_edge a->bad", "create_edge bad->b", "create_edge b->c"]
		);
	}

	#[test]
	fn command_delete_splices_before_request() {
		let (gateway, recorder) = gateway(Recorder {
			fail: vec!["delete_command"],
			..Recorder::default()
		});
		let records: Vec<CommandRecord> = ["id", "whoami"]
			.iter()
			.map(|c| CommandRecord {
				command: c.to_string(),
				output: String::new(),
				timestamp: Default::default(),
			})
			.collect();
		gateway.store().borrow_mut().set_commands("a", records).unwrap();

		assert!(block_on(gateway.delete_command("a", 0)).is_err());
		let store = gateway.store().borrow();
		let left: Vec<&str> = store.commands("a").unwrap().iter().map(|r| r.command.as_str()).collect();
		assert_eq!(left, vec!["whoami"]);
		assert_eq!(recorder.calls(), vec!["delete_command a 0"]);
	}

	#[test]
	fn clear_is_optimistic() {
		let (gateway, _) = gateway(Recorder {
			fail: vec!["clear"],
			..Recorder::default()
		});
		assert!(block_on(gateway.clear_graph()).is_err());
		assert_eq!(gateway.store().borrow().node_count(), 0);
	}

	#[test]
	fn switch_file_replaces_with_returned_snapshot() {
		let (gateway, recorder) = gateway(Recorder::default());
		let report = block_on(gateway.switch_file("other.json")).unwrap();
		assert_eq!(report.nodes, 1);
		assert!(gateway.store().borrow().contains_node("x"));
		assert_eq!(recorder.calls(), vec!["switch other.json"]);
	}

	#[test]
	fn persist_command_stores_returned_list() {
		let (gateway, _) = gateway(Recorder::default());
		let commands = block_on(gateway.persist_command("b", "id", "uid=0\n")).unwrap();
		assert_eq!(commands.len(), 1);
		assert_eq!(gateway.store().borrow().commands("b").unwrap(), commands.as_slice());
	}
}
