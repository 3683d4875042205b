//! The engagement graph editor page.

use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Element, HtmlInputElement, ScrollBehavior, ScrollIntoViewOptions};

use crate::browser::{BrowserNotifier, BrowserPrompter, request_notification_permission};
use crate::components::graph_canvas::GraphCanvas;
use crate::config::ClientConfig;
use crate::http::HttpBackend;
use crate::model::{CommandRecord, DEFAULT_EDGE_COLOR, EdgeForm, ICONS, NodeForm};
use crate::session::{Change, EditorSession, connect_button};
use crate::stream::{BlockStatus, LogEntry};

type SessionHandle = StoredValue<EditorSession, LocalStorage>;

const FLYOUT_ID: &str = "node-command-flyout";

/// Reactive copy of what the views read from the session.
#[derive(Clone, Copy)]
struct Mirror {
	counts: RwSignal<(usize, usize)>,
	connect: RwSignal<(bool, String)>,
	node_form: RwSignal<Option<NodeForm>>,
	node_draft: RwSignal<NodeForm>,
	edge_form: RwSignal<Option<EdgeForm>>,
	edge_draft: RwSignal<EdgeForm>,
	maximized: RwSignal<bool>,
	transcript: RwSignal<Vec<LogEntry>>,
	running: RwSignal<bool>,
	flyout_title: RwSignal<Option<String>>,
	files: RwSignal<Vec<String>>,
	selected_file: RwSignal<String>,
	overview: RwSignal<Option<Vec<(String, Vec<CommandRecord>)>>>,
}

impl Mirror {
	fn new() -> Self {
		Self {
			counts: RwSignal::new((0, 0)),
			connect: RwSignal::new(connect_button(0)),
			node_form: RwSignal::new(None),
			node_draft: RwSignal::new(NodeForm::default()),
			edge_form: RwSignal::new(None),
			edge_draft: RwSignal::new(EdgeForm::default()),
			maximized: RwSignal::new(false),
			transcript: RwSignal::new(Vec::new()),
			running: RwSignal::new(false),
			flyout_title: RwSignal::new(None),
			files: RwSignal::new(Vec::new()),
			selected_file: RwSignal::new(String::new()),
			overview: RwSignal::new(None),
		}
	}

	fn sync(&self, session: &EditorSession, change: Change) {
		match change {
			Change::Graph => {
				let counts = {
					let store = session.store().borrow();
					(store.node_count(), store.edge_count())
				};
				if self.counts.get_untracked() != counts {
					self.counts.set(counts);
				}
				let title = session.flyout_title();
				if self.flyout_title.get_untracked() != title {
					self.flyout_title.set(title);
				}
			}
			Change::Selection => self.connect.set(session.connect_button()),
			Change::Surface => {
				let node_form = session.node_form();
				match &node_form {
					Some(form) if self.node_draft.get_untracked().id != form.id => {
						self.node_draft.set(form.clone())
					}
					Some(_) => {}
					None => self.node_draft.set(NodeForm::default()),
				}
				match session.edge_form() {
					Some(form) if self.edge_draft.get_untracked().id != form.id => self.edge_draft.set(form),
					Some(_) => {}
					None => self.edge_draft.set(EdgeForm::default()),
				}
				self.node_form.set(node_form);
				self.edge_form.set(session.edge_form());
				self.maximized.set(session.is_maximized());
				self.flyout_title.set(session.flyout_title());
			}
			Change::Transcript => {
				self.transcript.set(session.transcript());
				self.running.set(session.is_running());
			}
			Change::Files => {
				let files = session.files();
				let selected = self.selected_file.get_untracked();
				if !files.contains(&selected) {
					self.selected_file.set(files.first().cloned().unwrap_or_default());
				}
				self.files.set(files);
			}
			Change::Overview => self.overview.set(session.overview()),
			Change::RevealCommands => reveal_flyout(),
		}
	}
}

fn reveal_flyout() {
	let Some(flyout) = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.get_element_by_id(FLYOUT_ID))
	else {
		return;
	};
	let options = ScrollIntoViewOptions::new();
	options.set_behavior(ScrollBehavior::Smooth);
	flyout.scroll_into_view_with_scroll_into_view_options(&options);
}

/// Keep every live transcript scrolled to its newest output.
fn scroll_live_outputs() {
	let Some(list) = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.query_selector_all(".live-output").ok())
	else {
		return;
	};
	for i in 0..list.length() {
		if let Some(el) = list.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
			el.set_scroll_top(el.scroll_height());
		}
	}
}

/// Run a session operation in the background. Failures are already logged
/// or shown by the session.
fn spawn<F, Fut>(session: SessionHandle, op: F)
where
	F: FnOnce(EditorSession) -> Fut + 'static,
	Fut: std::future::Future<Output = ()> + 'static,
{
	let session = session.get_value();
	spawn_local(op(session));
}

#[component]
pub fn Editor() -> impl IntoView {
	let config = use_context::<ClientConfig>().unwrap_or_default();
	let notifier = Rc::new(BrowserNotifier::new(config.toast_timeout_ms));
	let toast = notifier.toast_signal();
	let backend = Rc::new(HttpBackend::new(config.clone()));
	let session = EditorSession::new(config, backend, notifier.clone(), Rc::new(BrowserPrompter));

	let mirror = Mirror::new();
	session.subscribe(move |s, change| mirror.sync(s, change));
	let handle: SessionHandle = StoredValue::new_local(session);
	let notifier = StoredValue::new_local(notifier);

	spawn_local(request_notification_permission());
	spawn(handle, |s| async move {
		if let Err(err) = s.load().await {
			log::error!("initial load failed: {err}");
		}
	});

	Effect::new(move |_| {
		mirror.transcript.track();
		scroll_live_outputs();
	});

	view! {
		<div class="editor">
			<Toolbar session=handle mirror=mirror />
			<div class="graph-area">
				<GraphCanvas session=handle.get_value() />
			</div>
			<NodeModal session=handle mirror=mirror />
			<CommandFlyout mirror=mirror />
			<EdgeModal session=handle mirror=mirror />
			<OverviewModal session=handle mirror=mirror />
			{move || {
				toast
					.get()
					.map(|message| {
						view! {
							<div
								class="toast"
								on:click=move |_| notifier.with_value(|n| n.acknowledge_toast())
							>
								{message}
							</div>
						}
					})
			}}
		</div>
	}
}

#[component]
fn Toolbar(session: SessionHandle, mirror: Mirror) -> impl IntoView {
	let name = RwSignal::new(String::new());
	let icon = RwSignal::new(ICONS[0].0.to_string());

	let add_node = move |_| {
		let (n, i) = (name.get_untracked(), icon.get_untracked());
		spawn(session, move |s| async move {
			if s.add_node(&n, &i).await.is_ok() {
				name.set(String::new());
			}
		});
	};

	let on_upload = move |ev: leptos::ev::Event| {
		let Some(input) = ev
			.target()
			.and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
		else {
			return;
		};
		let Some(file) = input.files().and_then(|files| files.get(0)) else {
			return;
		};
		input.set_value("");
		spawn(session, move |s| async move {
			let name = file.name();
			match JsFuture::from(file.array_buffer()).await {
				Ok(buffer) => {
					let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
					let _ = s.upload_file(&name, bytes).await;
				}
				Err(err) => log::error!("reading {name} failed: {err:?}"),
			}
		});
	};

	let export = move |_| {
		let file = mirror.selected_file.get_untracked();
		if file.is_empty() {
			return;
		}
		let url = session.with_value(|s| s.export_url(&file));
		if let Some(window) = web_sys::window() {
			let _ = window.location().set_href(&url);
		}
	};

	view! {
		<div class="toolbar">
			<input
				type="text"
				placeholder="Node name"
				prop:value=move || name.get()
				on:input=move |ev| name.set(event_target_value(&ev))
			/>
			<select
				prop:value=move || icon.get()
				on:change=move |ev| icon.set(event_target_value(&ev))
			>
				{ICONS
					.iter()
					.map(|(code, caption, _)| view! { <option value=*code>{*caption}</option> })
					.collect_view()}
			</select>
			<button on:click=add_node>"Add Node"</button>
			<button
				disabled=move || !mirror.connect.get().0
				on:click=move |_| spawn(session, |s| async move {
					let _ = s.connect_selected().await;
				})
			>
				{move || mirror.connect.get().1}
			</button>
			<button on:click=move |_| session.with_value(|s| s.reset_view())>"Reset View"</button>
			<button on:click=move |_| spawn(session, |s| async move {
				let _ = s.view_all_commands().await;
			})>"View All Commands"</button>
			<button on:click=move |_| spawn(session, |s| async move {
				let _ = s.clear_graph().await;
			})>"Clear Graph"</button>

			<span class="separator" />
			<select
				prop:value=move || mirror.selected_file.get()
				on:change=move |ev| mirror.selected_file.set(event_target_value(&ev))
			>
				{move || {
					mirror
						.files
						.get()
						.into_iter()
						.map(|f| view! { <option value=f.clone()>{f.clone()}</option> })
						.collect_view()
				}}
			</select>
			<button on:click=move |_| {
				let file = mirror.selected_file.get_untracked();
				if !file.is_empty() {
					spawn(session, move |s| async move {
						let _ = s.switch_file(&file).await;
					});
				}
			}>"Switch"</button>
			<button on:click=export>"Export"</button>
			<label class="upload">
				"Upload" <input type="file" accept=".json" on:change=on_upload />
			</label>
			<span class="stats">
				{move || {
					let (nodes, edges) = mirror.counts.get();
					format!("{nodes} nodes, {edges} edges")
				}}
			</span>
		</div>
	}
}

fn status_caption(status: &BlockStatus) -> &'static str {
	match status {
		BlockStatus::Running => "Running...",
		BlockStatus::Finished => "Done",
		BlockStatus::Failed(_) => "Failed",
	}
}

/// The open node's commands. `session` is `None` for read-only copies.
fn command_entries(entries: Vec<LogEntry>, session: Option<SessionHandle>) -> AnyView {
	if entries.is_empty() {
		return view! { <p class="empty">"No commands executed yet"</p> }.into_any();
	}
	entries
		.into_iter()
		.map(|entry| match entry {
			LogEntry::Live(block) => view! {
				<div class="persisted-command live">
					<div class="command-head">
						<strong>{block.command}</strong>
						<small>{status_caption(&block.status)}</small>
					</div>
					<pre class="live-output">{block.output}</pre>
				</div>
			}
			.into_any(),
			LogEntry::Persisted { index, record } => {
				let delete = session.map(|session| {
					view! {
						<button
							class="small"
							on:click=move |_| spawn(session, move |s| async move {
								let _ = s.delete_persisted_command(index).await;
							})
						>
							"Delete"
						</button>
					}
				});
				view! {
					<div class="persisted-command">
						<div class="command-head">
							<strong>{record.command}</strong>
							{delete}
						</div>
						<pre>{record.output}</pre>
						<small>{record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()}</small>
					</div>
				}
				.into_any()
			}
		})
		.collect_view()
		.into_any()
}

#[component]
fn NodeModal(session: SessionHandle, mirror: Mirror) -> impl IntoView {
	let draft = mirror.node_draft;
	let command = RwSignal::new(String::new());

	let run_command = move || {
		let cmd = command.get_untracked();
		spawn(session, move |s| async move {
			let _ = s.execute_command(&cmd).await;
			command.set(String::new());
		});
	};

	view! {
		<Show when=move || mirror.node_form.get().is_some()>
			<div class="modal">
				<div class=move || {
					if mirror.maximized.get() { "modal-content maximized" } else { "modal-content" }
				}>
					<div class="modal-head">
						<h3>"Edit Node"</h3>
						<button on:click=move |_| session.with_value(|s| s.toggle_maximized())>
							{move || if mirror.maximized.get() { "Restore" } else { "Maximize" }}
						</button>
						<button on:click=move |_| session.with_value(|s| s.close_surface())>"Close"</button>
					</div>
					<label>"Name"</label>
					<input
						type="text"
						prop:value=move || draft.get().name
						on:input=move |ev| draft.update(|d| d.name = event_target_value(&ev))
					/>
					<label>"Icon"</label>
					<select
						prop:value=move || draft.get().icon
						on:change=move |ev| draft.update(|d| d.icon = event_target_value(&ev))
					>
						{ICONS
							.iter()
							.map(|(code, caption, _)| view! { <option value=*code>{*caption}</option> })
							.collect_view()}
					</select>
					<label>"Notes"</label>
					<textarea
						prop:value=move || draft.get().notes
						on:input=move |ev| draft.update(|d| d.notes = event_target_value(&ev))
					/>
					<label class="checkbox">
						<input
							type="checkbox"
							prop:checked=move || draft.get().owned
							on:change=move |ev| draft.update(|d| d.owned = event_target_checked(&ev))
						/>
						"Owned"
					</label>
					<div class="actions">
						<button on:click=move |_| {
							let form = draft.get_untracked();
							spawn(session, move |s| async move {
								let _ = s.save_node(form).await;
							});
						}>"Save"</button>
						<button class="danger" on:click=move |_| {
							let id = draft.get_untracked().id;
							spawn(session, move |s| async move {
								let _ = s.delete_node(&id).await;
							});
						}>"Delete Node"</button>
					</div>

					<h4>"Run Command"</h4>
					<div class="command-bar">
						<input
							type="text"
							placeholder="nmap -sV 10.0.0.5"
							prop:value=move || command.get()
							prop:disabled=move || mirror.running.get()
							on:input=move |ev| command.set(event_target_value(&ev))
							on:keydown=move |ev: leptos::ev::KeyboardEvent| {
								if ev.key() == "Enter" {
									run_command();
								}
							}
						/>
						<button disabled=move || mirror.running.get() on:click=move |_| run_command()>
							"Run"
						</button>
					</div>
					<div id="persisted-commands">
						{move || command_entries(mirror.transcript.get(), Some(session))}
					</div>
				</div>
			</div>
		</Show>
	}
}

#[component]
fn CommandFlyout(mirror: Mirror) -> impl IntoView {
	view! {
		<Show when=move || mirror.flyout_title.get().is_some()>
			<div id=FLYOUT_ID class="flyout">
				<h4>{move || mirror.flyout_title.get().unwrap_or_default()}</h4>
				{move || command_entries(mirror.transcript.get(), None)}
			</div>
		</Show>
	}
}

#[component]
fn EdgeModal(session: SessionHandle, mirror: Mirror) -> impl IntoView {
	let draft = mirror.edge_draft;
	view! {
		<Show when=move || mirror.edge_form.get().is_some()>
			<div class="modal">
				<div class="modal-content small">
					<h3>"Edit Connection"</h3>
					<label>"Label"</label>
					<input
						type="text"
						prop:value=move || draft.get().label
						on:input=move |ev| draft.update(|d| d.label = event_target_value(&ev))
					/>
					<label>"Color"</label>
					<input
						type="color"
						prop:value=move || {
							let color = draft.get().color;
							if color.is_empty() { DEFAULT_EDGE_COLOR.to_string() } else { color }
						}
						on:input=move |ev| draft.update(|d| d.color = event_target_value(&ev))
					/>
					<div class="actions">
						<button on:click=move |_| {
							let form = draft.get_untracked();
							spawn(session, move |s| async move {
								let _ = s.save_edge(form).await;
							});
						}>"Save"</button>
						<button class="danger" on:click=move |_| {
							let id = draft.get_untracked().id;
							spawn(session, move |s| async move {
								let _ = s.delete_edge(&id).await;
							});
						}>"Delete"</button>
						<button on:click=move |_| session.with_value(|s| s.close_surface())>"Close"</button>
					</div>
				</div>
			</div>
		</Show>
	}
}

#[component]
fn OverviewModal(session: SessionHandle, mirror: Mirror) -> impl IntoView {
	view! {
		<Show when=move || mirror.overview.get().is_some()>
			<div class="modal">
				<div class="modal-content">
					<div class="modal-head">
						<h3>"All Commands"</h3>
						<button on:click=move |_| session.with_value(|s| s.close_overview())>"Close"</button>
					</div>
					{move || {
						mirror
							.overview
							.get()
							.unwrap_or_default()
							.into_iter()
							.map(|(node, commands)| {
								view! {
									<section class="overview-node">
										<h4>{node}</h4>
										{commands
											.into_iter()
											.map(|record| {
												view! {
													<div class="persisted-command">
														<strong>{record.command}</strong>
														<pre>{record.output}</pre>
														<small>
															{record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()}
														</small>
													</div>
												}
											})
											.collect_view()}
									</section>
								}
							})
							.collect_view()
					}}
				</div>
			</div>
		</Show>
	}
}
