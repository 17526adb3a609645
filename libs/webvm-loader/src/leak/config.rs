use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Switches for the individual shutdown sweeps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakPreventionConfig {
	/// Skip the whole sweep when the host reports that the process is going down.
	pub skip_memory_leak_checks_on_jvm_shutdown: bool,
	pub clear_jdbc: bool,
	pub check_threads: bool,
	/// Interrupt (or shut down the executor of) threads the application left running.
	pub stop_threads: bool,
	pub stop_timer_threads: bool,
	/// Move HTTP client keep-alive threads over to the parent loader.
	pub http_client_keep_alive_thread: bool,
	pub thread_locals: bool,
	pub rmi_targets: bool,
	pub object_stream_class_caches: bool,
	pub log_factory_release: bool,
	pub auxiliary: bool,
	pub thread_stop_poll_interval_ms: u64,
	pub thread_stop_max_polls: u32,
}

impl Default for LeakPreventionConfig {
	fn default() -> Self {
		LeakPreventionConfig {
			skip_memory_leak_checks_on_jvm_shutdown: false,
			clear_jdbc: true,
			check_threads: true,
			stop_threads: false,
			stop_timer_threads: false,
			http_client_keep_alive_thread: true,
			thread_locals: true,
			rmi_targets: true,
			object_stream_class_caches: true,
			log_factory_release: true,
			auxiliary: true,
			thread_stop_poll_interval_ms: 20,
			thread_stop_max_polls: 100,
		}
	}
}

impl LeakPreventionConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.thread_stop_poll_interval_ms)
	}
}
