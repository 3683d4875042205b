//! Browser implementations of [`Notifier`] and [`Prompter`].

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{Either, select};
use leptos::prelude::*;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Notification, NotificationOptions, NotificationPermission};

use crate::notify::{Acknowledged, NotificationCapability, Notifier, NotifyChannel, Prompter, select_channel};

const NOTIFICATION_TITLE: &str = "Engagement Graph";

/// `window.confirm` / `window.alert`.
pub struct BrowserPrompter;

impl Prompter for BrowserPrompter {
	fn confirm(&self, message: &str) -> bool {
		web_sys::window()
			.and_then(|w| w.confirm_with_message(message).ok())
			.unwrap_or(false)
	}

	fn alert(&self, message: &str) {
		if let Some(window) = web_sys::window() {
			let _ = window.alert_with_message(message);
		}
	}
}

pub fn notification_capability() -> NotificationCapability {
	let Some(window) = web_sys::window() else {
		return NotificationCapability::Unsupported;
	};
	if !js_sys::Reflect::has(&window, &JsValue::from_str("Notification")).unwrap_or(false) {
		return NotificationCapability::Unsupported;
	}
	match Notification::permission() {
		NotificationPermission::Granted => NotificationCapability::Granted,
		NotificationPermission::Denied => NotificationCapability::Denied,
		_ => NotificationCapability::Undecided,
	}
}

/// Ask for notification permission if the user has not decided yet.
pub async fn request_notification_permission() {
	if notification_capability() != NotificationCapability::Undecided {
		return;
	}
	match Notification::request_permission() {
		Ok(promise) => match JsFuture::from(promise).await {
			Ok(answer) => debug!("notification permission: {:?}", answer.as_string()),
			Err(err) => warn!("notification permission request failed: {err:?}"),
		},
		Err(err) => warn!("notification permission unavailable: {err:?}"),
	}
}

/// Resolve after `ms` milliseconds.
pub async fn sleep(ms: u32) {
	let promise = js_sys::Promise::new(&mut |resolve, _reject| {
		let scheduled = web_sys::window().and_then(|w| {
			w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32)
				.ok()
		});
		if scheduled.is_none() {
			let _ = resolve.call0(&JsValue::NULL);
		}
	});
	let _ = JsFuture::from(promise).await;
}

type AckSender = Rc<RefCell<Option<oneshot::Sender<Acknowledged>>>>;

fn answer(sender: &AckSender, ack: Acknowledged) {
	if let Some(tx) = sender.borrow_mut().take() {
		let _ = tx.send(ack);
	}
}

/// System notification when permitted, otherwise a toast rendered from
/// [`BrowserNotifier::toast_signal`].
pub struct BrowserNotifier {
	toast: RwSignal<Option<String>>,
	pending: AckSender,
	timeout_ms: u32,
}

impl BrowserNotifier {
	pub fn new(timeout_ms: u32) -> Self {
		Self {
			toast: RwSignal::new(None),
			pending: Rc::default(),
			timeout_ms,
		}
	}

	/// Message of the toast currently shown, if any.
	pub fn toast_signal(&self) -> RwSignal<Option<String>> {
		self.toast
	}

	/// The user clicked the toast.
	pub fn acknowledge_toast(&self) {
		self.toast.set(None);
		answer(&self.pending, Acknowledged::Yes);
	}

	async fn wait(&self, rx: oneshot::Receiver<Acknowledged>) -> Acknowledged {
		match select(rx, Box::pin(sleep(self.timeout_ms))).await {
			Either::Left((Ok(ack), _)) => ack,
			_ => Acknowledged::No,
		}
	}

	async fn system(&self, message: &str) -> Acknowledged {
		let options = NotificationOptions::new();
		options.set_body(message);
		let notification = match Notification::new_with_options(NOTIFICATION_TITLE, &options) {
			Ok(n) => n,
			Err(err) => {
				warn!("system notification failed, using toast: {err:?}");
				return self.show_toast(message).await;
			}
		};
		let (tx, rx) = oneshot::channel();
		let sender: AckSender = Rc::new(RefCell::new(Some(tx)));
		let (on_click_tx, on_close_tx) = (sender.clone(), sender);
		let on_click = Closure::<dyn FnMut()>::new(move || answer(&on_click_tx, Acknowledged::Yes));
		let on_close = Closure::<dyn FnMut()>::new(move || answer(&on_close_tx, Acknowledged::No));
		notification.set_onclick(Some(on_click.as_ref().unchecked_ref()));
		notification.set_onclose(Some(on_close.as_ref().unchecked_ref()));

		let ack = self.wait(rx).await;
		notification.set_onclick(None);
		notification.set_onclose(None);
		if ack == Acknowledged::Yes {
			if let Some(window) = web_sys::window() {
				let _ = window.focus();
			}
		}
		notification.close();
		ack
	}

	async fn show_toast(&self, message: &str) -> Acknowledged {
		let (tx, rx) = oneshot::channel();
		// a newer toast replaces an unanswered one
		answer(&self.pending, Acknowledged::No);
		*self.pending.borrow_mut() = Some(tx);
		self.toast.set(Some(message.to_string()));

		let ack = self.wait(rx).await;
		if ack == Acknowledged::No && self.toast.get_untracked().as_deref() == Some(message) {
			self.toast.set(None);
		}
		ack
	}
}

#[async_trait(?Send)]
impl Notifier for BrowserNotifier {
	async fn notify(&self, message: &str) -> Acknowledged {
		match select_channel(notification_capability()) {
			NotifyChannel::System => self.system(message).await,
			NotifyChannel::Toast => self.show_toast(message).await,
		}
	}
}
