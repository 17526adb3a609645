mod flags;
mod lifecycle;
mod name;
mod storage;

pub use flags::*;
pub use lifecycle::*;
pub use name::*;
use std::sync::Once;
pub use storage::*;
use tracing::Level;
use tracing_subscriber::filter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static START: Once = Once::new();

/// Installs the global tracing subscriber. Safe to call more than once.
pub fn init() {
	init_with(Level::INFO);
}

pub fn init_with(level: Level) {
	START.call_once(|| {
		let filter = filter::Targets::new()
			.with_default(level.min(Level::WARN))
			.with_target("webvm", level)
			.with_target("webvm_loader::leak", Level::INFO.max(level));
		let layered = tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer())
			.with(filter);

		// Another subscriber (a test harness, an embedding host) wins if it got there first.
		let _ = layered.try_init();
	});
}
