use engagement_graph::App;
use engagement_graph::config::ClientConfig;

fn main() {
	let level = ClientConfig::from_document()
		.level()
		.unwrap_or(log::Level::Debug);
	engagement_graph::init_logging(level);

	leptos::mount::mount_to_body(App)
}
