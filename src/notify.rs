//! User-facing notices and blocking prompts.
//!
//! [`Notifier`] is fire-and-wait: the future resolves once the user clicked
//! the notice or it went away on its own. Which channel carries the notice is
//! decided per call, so a permission granted mid-session takes effect on the
//! next notice.

use async_trait::async_trait;

/// State of the platform notification facility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationCapability {
	Unsupported,
	/// Supported, the user has not been asked yet.
	Undecided,
	Granted,
	Denied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyChannel {
	/// Platform notification outside the page.
	System,
	/// In-page toast.
	Toast,
}

pub fn select_channel(capability: NotificationCapability) -> NotifyChannel {
	match capability {
		NotificationCapability::Granted => NotifyChannel::System,
		_ => NotifyChannel::Toast,
	}
}

/// Whether the user acted on a notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acknowledged {
	Yes,
	No,
}

#[async_trait(?Send)]
pub trait Notifier {
	async fn notify(&self, message: &str) -> Acknowledged;
}

/// Modal questions that block until answered.
pub trait Prompter {
	fn confirm(&self, message: &str) -> bool;

	fn alert(&self, message: &str);
}
