//! The editing session: one per page, shared by every component.
//!
//! `EditorSession` is a cheap handle; clones share state. Gestures go through
//! [`EditorSession::dispatch`], which applies their local effects right away
//! and hands back the intents that need the network or the user, to be run
//! with [`EditorSession::perform`]. Views subscribe to [`Change`]s and read
//! the session back through its accessors.
//!
//! No `RefCell` borrow is held across an `.await`.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable};
use log::{debug, info, warn};

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::{ApiError, Error, ValidationError};
use crate::gesture::Gesture;
use crate::interaction::{Intent, InteractionController, InteractionState, Surface};
use crate::model::{CommandRecord, EdgeForm, NewNode, NodeForm};
use crate::notify::{Acknowledged, Notifier, Prompter};
use crate::store::GraphStore;
use crate::stream::{CommandLog, LogEntry, StreamRegistry, pump};
use crate::sync::{BatchOutcome, Shared, SyncGateway};

pub const COMMAND_COMPLETED: &str = "Command completed!";
pub const NODES_CONNECTED: &str = "Nodes connected in sequence!";
pub const CONFIRM_CLEAR: &str = "Clear all?";
pub const CONFIRM_EDGE_REMOVAL: &str = "Remove connection?";
pub const CONFIRM_NODE_DELETE: &str = "Delete node?";

/// What changed, so views know what to re-read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
	/// Elements, positions, marks or the viewport.
	Graph,
	Selection,
	/// An edit surface opened, closed or was resized.
	Surface,
	/// The open node's command list.
	Transcript,
	Files,
	Overview,
	/// The user acknowledged a command-completion notice.
	RevealCommands,
}

type Listener = Rc<dyn Fn(&EditorSession, Change)>;

/// State of the connect button for a selection of `selected` nodes.
pub fn connect_button(selected: usize) -> (bool, String) {
	if selected >= 2 {
		(true, format!("Connect {selected} Nodes"))
	} else {
		(false, "Connect Selected".to_string())
	}
}

/// Pseudo-random fraction in `[0, 1)` for `seed`.
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

#[derive(Default)]
struct Panels {
	node_form: Option<NodeForm>,
	edge_form: Option<EdgeForm>,
	maximized: bool,
	log: CommandLog,
	streams: StreamRegistry,
	files: Vec<String>,
	overview: Option<Vec<(String, Vec<CommandRecord>)>>,
	spawned: usize,
}

#[derive(Clone)]
pub struct EditorSession {
	config: Rc<ClientConfig>,
	store: Shared<GraphStore>,
	gateway: SyncGateway,
	controller: Shared<InteractionController>,
	panels: Shared<Panels>,
	notifier: Rc<dyn Notifier>,
	prompter: Rc<dyn Prompter>,
	listeners: Shared<Vec<Listener>>,
}

impl EditorSession {
	pub fn new(
		config: ClientConfig,
		backend: Rc<dyn Backend>,
		notifier: Rc<dyn Notifier>,
		prompter: Rc<dyn Prompter>,
	) -> Self {
		let store = Rc::new(RefCell::new(GraphStore::new(&config)));
		let controller = InteractionController::new(config.proximity_threshold);
		Self {
			gateway: SyncGateway::new(backend, store.clone()),
			store,
			controller: Rc::new(RefCell::new(controller)),
			panels: Rc::default(),
			config: Rc::new(config),
			notifier,
			prompter,
			listeners: Rc::default(),
		}
	}

	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	pub fn store(&self) -> &Shared<GraphStore> {
		&self.store
	}

	/// Call `listener` after every change. It receives the session so it
	/// need not hold a clone of it.
	pub fn subscribe(&self, listener: impl Fn(&EditorSession, Change) + 'static) {
		self.listeners.borrow_mut().push(Rc::new(listener));
	}

	fn emit(&self, change: Change) {
		let listeners: Vec<Listener> = self.listeners.borrow().clone();
		for listener in listeners {
			listener(self, change);
		}
	}

	/// Initial load: graph and file list.
	pub async fn load(&self) -> Result<(), Error> {
		self.gateway.refresh().await?;
		self.emit(Change::Graph);
		if let Err(err) = self.refresh_files().await {
			warn!("file list unavailable: {err}");
		}
		Ok(())
	}

	pub async fn refresh(&self) -> Result<(), Error> {
		self.gateway.refresh().await?;
		self.emit(Change::Graph);
		self.emit(Change::Selection);
		Ok(())
	}

	// ─── Gestures ────────────────────────────────────────────────────────

	/// Apply the local effects of `gesture`. Returns the intents still to be
	/// [performed](Self::perform).
	pub fn dispatch(&self, gesture: &Gesture) -> Vec<Intent> {
		let intents = {
			let mut store = self.store.borrow_mut();
			self.controller.borrow_mut().handle(&mut store, gesture)
		};
		self.emit(Change::Graph);

		let mut pending = Vec::new();
		for intent in intents {
			match intent {
				Intent::SurfaceClosed(surface) => self.surface_closed(surface),
				Intent::OpenNodeEditor(form) => self.node_editor_opened(form),
				Intent::OpenEdgeEditor(form) => {
					self.panels.borrow_mut().edge_form = Some(form);
					self.emit(Change::Surface);
				}
				Intent::SelectionChanged => self.emit(Change::Selection),
				other => pending.push(other),
			}
		}
		pending
	}

	/// Run an intent returned by [`dispatch`](Self::dispatch).
	pub async fn perform(&self, intent: Intent) -> Result<(), Error> {
		match intent {
			Intent::PersistPosition { id, position } => {
				self.gateway.update_position(&id, position).await?;
			}
			Intent::Connect { source, target } => {
				let result = self.gateway.connect(&source, &target).await;
				self.emit(Change::Graph);
				self.emit(Change::Selection);
				result?;
			}
			Intent::ConfirmEdgeRemoval { id } => {
				if self.prompter.confirm(CONFIRM_EDGE_REMOVAL) {
					self.delete_edge(&id).await?;
				}
			}
			other => debug!("nothing to perform for {other:?}"),
		}
		Ok(())
	}

	/// Dispatch and perform every resulting intent in order.
	pub async fn handle_gesture(&self, gesture: &Gesture) -> Result<(), Error> {
		let mut first_err = None;
		for intent in self.dispatch(gesture) {
			if let Err(err) = self.perform(intent).await {
				first_err.get_or_insert(err);
			}
		}
		first_err.map_or(Ok(()), Err)
	}

	fn node_editor_opened(&self, form: NodeForm) {
		let records = self
			.store
			.borrow()
			.commands(&form.id)
			.map(<[CommandRecord]>::to_vec)
			.unwrap_or_default();
		let mut panels = self.panels.borrow_mut();
		let orphaned = panels.log.open(&form.id, records);
		for block in orphaned {
			panels.streams.cancel(block);
		}
		panels.node_form = Some(form);
		drop(panels);
		self.emit(Change::Surface);
		self.emit(Change::Transcript);
	}

	fn surface_closed(&self, surface: Surface) {
		let mut panels = self.panels.borrow_mut();
		match &surface {
			Surface::Node(id) => {
				let cancelled = panels.streams.cancel_node(id);
				if !cancelled.is_empty() {
					info!("aborted {} command stream(s) of {id}", cancelled.len());
				}
				for block in panels.log.close() {
					panels.streams.cancel(block);
				}
				panels.node_form = None;
				panels.maximized = false;
			}
			Surface::Edge(_) => panels.edge_form = None,
			Surface::Closed => return,
		}
		drop(panels);
		self.emit(Change::Surface);
		self.emit(Change::Transcript);
	}

	/// Close the open edit surface, aborting its command streams.
	pub fn close_surface(&self) {
		let surface = {
			let mut store = self.store.borrow_mut();
			self.controller.borrow_mut().close_surface(&mut store)
		};
		self.surface_closed(surface);
		self.emit(Change::Graph);
	}

	pub fn toggle_maximized(&self) {
		{
			let mut panels = self.panels.borrow_mut();
			panels.maximized = !panels.maximized;
		}
		self.emit(Change::Surface);
	}

	// ─── Edits ───────────────────────────────────────────────────────────

	fn reject(&self, err: ValidationError) -> Error {
		self.prompter.alert(&err.prompt());
		Error::Validation(err)
	}

	/// Create a node at a spot inside the visible area.
	pub async fn add_node(&self, name: &str, icon: &str) -> Result<String, Error> {
		let name = name.trim();
		if name.is_empty() {
			return Err(self.reject(ValidationError::MissingField("name")));
		}
		let position = {
			let mut panels = self.panels.borrow_mut();
			let seed = panels.spawned * 2;
			panels.spawned += 1;
			self.store
				.borrow()
				.spawn_position(rand_simple(seed), rand_simple(seed + 1))
		};
		let node = NewNode {
			name: name.to_string(),
			icon: icon.to_string(),
			x: position.x,
			y: position.y,
		};
		let id = self.gateway.create_node(&node).await?;
		self.emit(Change::Graph);
		Ok(id)
	}

	/// Save the node surface and close it.
	pub async fn save_node(&self, form: NodeForm) -> Result<(), Error> {
		if form.name.trim().is_empty() {
			return Err(self.reject(ValidationError::MissingField("name")));
		}
		self.gateway.update_node(&form).await?;
		self.close_surface();
		Ok(())
	}

	pub async fn save_edge(&self, form: EdgeForm) -> Result<(), Error> {
		if form.label.trim().is_empty() {
			return Err(self.reject(ValidationError::MissingField("label")));
		}
		self.gateway.update_edge(&form).await?;
		self.close_surface();
		Ok(())
	}

	/// Ask, then remove the node locally and on the backend. A backend
	/// failure is reported but the node stays removed.
	pub async fn delete_node(&self, id: &str) -> Result<bool, Error> {
		if !self.prompter.confirm(CONFIRM_NODE_DELETE) {
			return Ok(false);
		}
		if self.controller.borrow().surface().node_id() == Some(id) {
			self.close_surface();
		}
		let result = self.gateway.delete_node(id).await;
		self.emit(Change::Graph);
		self.emit(Change::Selection);
		if let Err(err) = result {
			self.prompter
				.alert(&format!("Failed to delete node: {}", err.user_message()));
			return Err(err.into());
		}
		Ok(true)
	}

	pub async fn delete_edge(&self, id: &str) -> Result<(), Error> {
		if self.controller.borrow().surface().edge_id() == Some(id) {
			self.close_surface();
		}
		let result = self.gateway.delete_edge(id).await;
		self.emit(Change::Graph);
		Ok(result?)
	}

	/// Connect the selection pairwise in selection order, then refetch and
	/// clear the selection whatever the outcome.
	pub async fn connect_selected(&self) -> Result<BatchOutcome, Error> {
		let ids = self.store.borrow().selection().to_vec();
		if ids.len() < 2 {
			return Err(self.reject(ValidationError::NotEnoughSelected {
				required: 2,
				selected: ids.len(),
			}));
		}
		let outcome = self.gateway.connect_sequence(&ids).await;
		// failure already logged
		let _ = self.gateway.refresh().await;
		self.store.borrow_mut().clear_selection();
		self.emit(Change::Graph);
		self.emit(Change::Selection);

		if outcome.is_complete() {
			if self.notifier.notify(NODES_CONNECTED).await == Acknowledged::Yes {
				let _ = self.refresh().await;
			}
		} else {
			warn!(
				"connected {} of {} pairs; failed: {:?}",
				outcome.succeeded(),
				outcome.attempted,
				outcome.failed
			);
		}
		Ok(outcome)
	}

	pub async fn clear_graph(&self) -> Result<bool, Error> {
		if !self.prompter.confirm(CONFIRM_CLEAR) {
			return Ok(false);
		}
		self.close_surface();
		let result = self.gateway.clear_graph().await;
		self.emit(Change::Graph);
		self.emit(Change::Selection);
		result?;
		Ok(true)
	}

	pub fn reset_view(&self) {
		self.store.borrow_mut().fit();
		self.emit(Change::Graph);
	}

	// ─── Commands ────────────────────────────────────────────────────────

	/// Run `command` on the open node, streaming its output into a new
	/// transcript block. A blank command or no open node is a no-op.
	///
	/// On success the graph is refetched and the user notified. Closing the
	/// node surface aborts the read; the call then returns
	/// [`ApiError::Cancelled`] without refetching.
	pub async fn execute_command(&self, command: &str) -> Result<(), Error> {
		let command = command.trim();
		let Some(node) = self.open_node() else {
			debug!("execute ignored: no open node");
			return Ok(());
		};
		if command.is_empty() {
			debug!("execute ignored: empty command");
			return Ok(());
		}

		let (handle, registration) = AbortHandle::new_pair();
		let block = {
			let mut panels = self.panels.borrow_mut();
			let block = panels.log.start_block(command);
			panels.streams.register(block, &node, handle);
			block
		};
		self.emit(Change::Transcript);
		info!("execute on {node}: {command}");

		let session = self.clone();
		let read = async {
			let chunks = self.gateway.execute(&node, command).await?;
			pump(chunks, move |text| {
				let live = session.panels.borrow_mut().log.append(block, text);
				if live {
					session.emit(Change::Transcript);
				}
			})
			.await
		};
		let outcome = Abortable::new(read, registration).await;
		self.panels.borrow_mut().streams.unregister(block);

		match outcome {
			Err(_aborted) => {
				self.panels.borrow_mut().log.discard(block);
				self.emit(Change::Transcript);
				Err(ApiError::Cancelled.into())
			}
			Ok(Err(err)) => {
				self.panels.borrow_mut().log.fail(block, &err.user_message());
				self.emit(Change::Transcript);
				Err(err.into())
			}
			Ok(Ok(bytes)) => {
				debug!("command on {node} finished after {bytes} bytes");
				self.panels.borrow_mut().log.finish(block);
				self.emit(Change::Transcript);
				let _ = self.refresh().await;
				if self.notifier.notify(COMMAND_COMPLETED).await == Acknowledged::Yes {
					self.emit(Change::RevealCommands);
				}
				Ok(())
			}
		}
	}

	/// Persist a transcript for the open node and show the returned list.
	pub async fn persist_command_output(
		&self,
		command: &str,
		output: &str,
	) -> Result<Vec<CommandRecord>, Error> {
		let Some(node) = self.open_node() else {
			return Ok(Vec::new());
		};
		let commands = self.gateway.persist_command(&node, command, output).await?;
		self.repopulate(&node, commands.clone());
		Ok(commands)
	}

	/// Delete the open node's persisted command at oldest-first `index`.
	pub async fn delete_persisted_command(&self, index: usize) -> Result<(), Error> {
		let Some(node) = self.open_node() else {
			return Ok(());
		};
		let result = self.gateway.delete_command(&node, index).await;
		let remaining = self
			.store
			.borrow()
			.commands(&node)
			.map(<[CommandRecord]>::to_vec)
			.unwrap_or_default();
		self.repopulate(&node, remaining);
		Ok(result?)
	}

	fn repopulate(&self, node: &str, records: Vec<CommandRecord>) {
		{
			let mut panels = self.panels.borrow_mut();
			if panels.log.node() != Some(node) {
				return;
			}
			panels.log.repopulate(records);
		}
		self.emit(Change::Transcript);
	}

	fn open_node(&self) -> Option<String> {
		self.controller.borrow().surface().node_id().map(str::to_string)
	}

	/// Refetch, then list every node's commands newest first.
	pub async fn view_all_commands(&self) -> Result<Vec<(String, Vec<CommandRecord>)>, Error> {
		self.refresh().await?;
		let overview = self.store.borrow().command_overview();
		self.panels.borrow_mut().overview = Some(overview.clone());
		self.emit(Change::Overview);
		Ok(overview)
	}

	pub fn close_overview(&self) {
		self.panels.borrow_mut().overview = None;
		self.emit(Change::Overview);
	}

	// ─── Files ───────────────────────────────────────────────────────────

	pub async fn refresh_files(&self) -> Result<Vec<String>, Error> {
		let files = self.gateway.list_files().await?;
		self.panels.borrow_mut().files = files.clone();
		self.emit(Change::Files);
		Ok(files)
	}

	pub async fn switch_file(&self, name: &str) -> Result<(), Error> {
		self.close_surface();
		self.gateway.switch_file(name).await?;
		self.emit(Change::Graph);
		self.emit(Change::Selection);
		Ok(())
	}

	pub async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<(), Error> {
		self.close_surface();
		self.gateway.upload_file(name, bytes).await?;
		self.emit(Change::Graph);
		self.emit(Change::Selection);
		let _ = self.refresh_files().await;
		Ok(())
	}

	pub fn export_url(&self, name: &str) -> String {
		self.gateway.export_url(name)
	}

	// ─── Reads for views ─────────────────────────────────────────────────

	pub fn surface(&self) -> Surface {
		self.controller.borrow().surface().clone()
	}

	pub fn interaction_state(&self) -> InteractionState {
		self.controller.borrow().state(&self.store.borrow())
	}

	pub fn node_form(&self) -> Option<NodeForm> {
		self.panels.borrow().node_form.clone()
	}

	pub fn edge_form(&self) -> Option<EdgeForm> {
		self.panels.borrow().edge_form.clone()
	}

	pub fn is_maximized(&self) -> bool {
		self.panels.borrow().maximized
	}

	/// Open node's command list in display order.
	pub fn transcript(&self) -> Vec<LogEntry> {
		self.panels.borrow().log.entries()
	}

	/// Whether a command of the open node is still streaming.
	pub fn is_running(&self) -> bool {
		self.panels
			.borrow()
			.log
			.entries()
			.iter()
			.any(|entry| matches!(entry, LogEntry::Live(block) if block.is_running()))
	}

	/// Title of the command flyout, while a node surface is open.
	pub fn flyout_title(&self) -> Option<String> {
		let node = self.open_node()?;
		let store = self.store.borrow();
		let name = store.node(&node).map(|n| n.name.as_str()).unwrap_or("Node");
		Some(format!("Commands: {name}"))
	}

	pub fn selection(&self) -> Vec<String> {
		self.store.borrow().selection().to_vec()
	}

	pub fn connect_button(&self) -> (bool, String) {
		connect_button(self.store.borrow().selection().len())
	}

	pub fn files(&self) -> Vec<String> {
		self.panels.borrow().files.clone()
	}

	pub fn overview(&self) -> Option<Vec<(String, Vec<CommandRecord>)>> {
		self.panels.borrow().overview.clone()
	}
}
