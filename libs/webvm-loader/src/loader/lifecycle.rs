use super::modified::is_tracked_jar;
use crate::leak::{LeakSweeper, SweepContext};
use crate::WebappClassLoader;
use tracing::{debug, info, instrument, warn};
use webvm_core::{Lifecycle, LifecycleError, LifecycleState};
use webvm_resources::{WEB_INF_CLASSES, WEB_INF_LIB};

impl WebappClassLoader {
	fn set_state(&self, state: LifecycleState) {
		debug!("{} -> {state}", self.identity);
		*self.state.write() = state;
	}

	/// Collects the class directories and archives and records the archive timestamps
	/// the modification check compares against.
	fn start_internal(&self) -> Result<(), LifecycleError> {
		let Some(resources) = self.resources() else {
			return Err(LifecycleError::Failed {
				operation: "start",
				component: self.identity.to_string(),
				reason: "no resources have been configured".to_string(),
			});
		};

		let mut repositories = vec![];
		for classes in resources.get_resources(WEB_INF_CLASSES) {
			if classes.is_directory() && classes.can_read() {
				repositories.extend(classes.url());
			}
		}

		let mut jar_times = self.jar_modification_times.write();
		for jar in resources.list_resources(WEB_INF_LIB) {
			if is_tracked_jar(&jar) {
				repositories.extend(jar.url());
				jar_times.insert(jar.name().to_string(), jar.last_modified());
			}
		}
		drop(jar_times);

		*self.local_repositories.write() = repositories;
		Ok(())
	}

	/// Runs the leak sweep while the loader is still available to it.
	fn clear_references(&self) {
		let context_name = self.context_name();
		let runtime = self.host_runtime();
		let ctx = SweepContext {
			loader: &self.identity,
			parent: Some(self.parent.identity()),
			context_name: &context_name,
			config: &self.config.leak,
		};
		let report = LeakSweeper::new(ctx, runtime.as_ref()).run();
		if report.has_errors() {
			warn!(context = %context_name, "Memory leaks detected while stopping the web application");
		}
		*self.last_leak_report.lock() = Some(report);
	}

	fn release(&self) {
		self.next_generation();
		self.resource_entries.write().clear();
		self.jar_modification_times.write().clear();
		self.local_repositories.write().clear();
		self.packages.clear();
		self.locks.clear();
		self.arena.lock().clear();
		*self.resources.write() = None;
	}
}

impl Lifecycle for WebappClassLoader {
	#[instrument(skip_all)]
	fn init(&self) -> Result<(), LifecycleError> {
		let _transition = self.transition.lock();
		let state = *self.state.read();
		match state {
			LifecycleState::New => {}
			LifecycleState::Destroying | LifecycleState::Destroyed => {
				return Err(LifecycleError::invalid("init", state));
			}
			_ => return Ok(()),
		}
		self.set_state(LifecycleState::Initializing);
		self.set_state(LifecycleState::Initialized);
		Ok(())
	}

	#[instrument(skip_all)]
	fn start(&self) -> Result<(), LifecycleError> {
		let _transition = self.transition.lock();
		let state = *self.state.read();
		match state {
			LifecycleState::Started => return Ok(()),
			LifecycleState::New
			| LifecycleState::Initialized
			| LifecycleState::Stopped
			| LifecycleState::Failed => {}
			_ => return Err(LifecycleError::invalid("start", state)),
		}

		self.set_state(LifecycleState::StartingPrep);
		self.set_state(LifecycleState::Starting);
		if let Err(err) = self.start_internal() {
			self.set_state(LifecycleState::Failed);
			return Err(err);
		}
		self.set_state(LifecycleState::Started);
		info!("Started {} for context [{}]", self.identity, self.context_name());
		Ok(())
	}

	#[instrument(skip_all)]
	fn stop(&self) -> Result<(), LifecycleError> {
		let _transition = self.transition.lock();
		let state = *self.state.read();
		match state {
			LifecycleState::Stopped => return Ok(()),
			LifecycleState::New | LifecycleState::Initialized | LifecycleState::Failed => {
				self.set_state(LifecycleState::Stopped);
				return Ok(());
			}
			LifecycleState::Started | LifecycleState::Starting => {}
			_ => return Err(LifecycleError::invalid("stop", state)),
		}

		self.set_state(LifecycleState::StoppingPrep);
		self.clear_references();
		self.set_state(LifecycleState::Stopping);
		self.release();
		self.set_state(LifecycleState::Stopped);
		Ok(())
	}

	#[instrument(skip_all)]
	fn destroy(&self) -> Result<(), LifecycleError> {
		if self.state().is_available() {
			self.stop()?;
		}

		let _transition = self.transition.lock();
		if *self.state.read() == LifecycleState::Destroyed {
			return Ok(());
		}
		self.set_state(LifecycleState::Destroying);
		self.external_repositories.write().clear();
		self.release();
		self.set_state(LifecycleState::Destroyed);
		Ok(())
	}

	fn state(&self) -> LifecycleState {
		*self.state.read()
	}
}
