use crate::leak::{HostRuntime, NoHostRuntime};
use crate::{DelegateRef, LoaderConfig, WebappClassLoader};
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use eyre::eyre;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use webvm_core::{Lifecycle, LifecycleError, LifecycleState};
use webvm_resources::WebResourceRoot;

/// Owns the class loader of one web application and replaces it when the application
/// changes on disk.
pub struct WebappLoader {
	config: LoaderConfig,
	resources: Arc<dyn WebResourceRoot>,
	parent: DelegateRef,
	platform: DelegateRef,
	runtime: Arc<dyn HostRuntime>,
	state: RwLock<LifecycleState>,
	transition: Mutex<()>,
	loader: RwLock<Option<Arc<WebappClassLoader>>>,
	reloads: AtomicUsize,
}

impl WebappLoader {
	pub fn new(
		resources: Arc<dyn WebResourceRoot>,
		parent: DelegateRef,
		platform: DelegateRef,
		config: LoaderConfig,
	) -> WebappLoader {
		WebappLoader {
			config,
			resources,
			parent,
			platform,
			runtime: Arc::new(NoHostRuntime),
			state: RwLock::new(LifecycleState::New),
			transition: Mutex::new(()),
			loader: RwLock::new(None),
			reloads: AtomicUsize::new(0),
		}
	}

	pub fn with_host_runtime(mut self, runtime: Arc<dyn HostRuntime>) -> WebappLoader {
		self.runtime = runtime;
		self
	}

	pub fn config(&self) -> &LoaderConfig {
		&self.config
	}

	/// The current class loader; `None` unless started.
	pub fn loader(&self) -> Option<Arc<WebappClassLoader>> {
		self.loader.read().clone()
	}

	pub fn reload_count(&self) -> usize {
		self.reloads.load(Ordering::Acquire)
	}

	pub fn modified(&self) -> bool {
		self.loader().is_some_and(|loader| loader.modified())
	}

	fn create_class_loader(&self) -> Result<Arc<WebappClassLoader>, LifecycleError> {
		let loader = WebappClassLoader::new(self.parent.clone(), self.platform.clone(), self.config.clone());
		loader.set_resources(self.resources.clone());
		loader.set_host_runtime(self.runtime.clone());
		loader.init()?;
		loader.start()?;
		Ok(Arc::new(loader))
	}

	fn discard(loader: &WebappClassLoader) -> Result<(), LifecycleError> {
		loader.stop()?;
		loader.destroy()
	}

	/// Replaces the class loader with a fresh one. Classes loaded by the old loader stay
	/// valid but are no longer handed out.
	#[instrument(skip_all)]
	pub fn reload(&self) -> Result<Arc<WebappClassLoader>, LifecycleError> {
		let _transition = self.transition.lock();
		let state = *self.state.read();
		if state != LifecycleState::Started {
			return Err(LifecycleError::invalid("reload", state));
		}

		let old = self.loader.write().take();
		if let Some(old) = old {
			WebappLoader::discard(&old)?;
		}
		let loader = match self.create_class_loader() {
			Ok(loader) => loader,
			Err(err) => {
				*self.state.write() = LifecycleState::Failed;
				return Err(err);
			}
		};
		*self.loader.write() = Some(loader.clone());
		self.reloads.fetch_add(1, Ordering::AcqRel);
		Ok(loader)
	}

	/// The periodic check: reloads when reloading is enabled and the loader reports a
	/// change. Returns whether a reload happened.
	pub fn background_process(&self) -> Result<bool, LifecycleError> {
		if !self.config.reloadable || !self.modified() {
			return Ok(false);
		}
		info!(
			"Reloading context [{}] after a change was detected",
			self.resources.context().name
		);
		self.reload()?;
		Ok(true)
	}
}

impl Lifecycle for WebappLoader {
	fn init(&self) -> Result<(), LifecycleError> {
		let _transition = self.transition.lock();
		let mut state = self.state.write();
		if *state == LifecycleState::New {
			*state = LifecycleState::Initialized;
		}
		Ok(())
	}

	#[instrument(skip_all)]
	fn start(&self) -> Result<(), LifecycleError> {
		let _transition = self.transition.lock();
		let state = *self.state.read();
		match state {
			LifecycleState::Started => return Ok(()),
			LifecycleState::Destroying | LifecycleState::Destroyed => {
				return Err(LifecycleError::invalid("start", state));
			}
			_ => {}
		}

		debug!("Starting the web application loader");
		*self.state.write() = LifecycleState::Starting;
		match self.create_class_loader() {
			Ok(loader) => {
				*self.loader.write() = Some(loader);
				*self.state.write() = LifecycleState::Started;
				Ok(())
			}
			Err(err) => {
				error!("Failed to start the web application class loader: {err}");
				*self.state.write() = LifecycleState::Failed;
				Err(err)
			}
		}
	}

	#[instrument(skip_all)]
	fn stop(&self) -> Result<(), LifecycleError> {
		let _transition = self.transition.lock();
		if *self.state.read() == LifecycleState::Stopped {
			return Ok(());
		}

		debug!("Stopping the web application loader");
		*self.state.write() = LifecycleState::Stopping;
		let loader = self.loader.write().take();
		if let Some(loader) = loader {
			WebappLoader::discard(&loader)?;
		}
		*self.state.write() = LifecycleState::Stopped;
		Ok(())
	}

	fn destroy(&self) -> Result<(), LifecycleError> {
		if *self.state.read() != LifecycleState::Destroyed {
			self.stop()?;
			*self.state.write() = LifecycleState::Destroyed;
		}
		Ok(())
	}

	fn state(&self) -> LifecycleState {
		*self.state.read()
	}
}

/// Calls [`WebappLoader::background_process`] every `delay` on a dedicated thread until
/// shut down or dropped.
pub struct BackgroundProcessor {
	stop: Option<Sender<()>>,
	handle: Option<JoinHandle<()>>,
}

impl BackgroundProcessor {
	pub fn spawn(loader: Arc<WebappLoader>, delay: Duration) -> eyre::Result<BackgroundProcessor> {
		let (stop, stopped) = bounded::<()>(1);
		let handle = thread::Builder::new()
			.name("webvm-background".to_string())
			.spawn(move || loop {
				match stopped.recv_timeout(delay) {
					Err(RecvTimeoutError::Timeout) => {
						if let Err(err) = loader.background_process() {
							error!("Background processing failed: {err}");
						}
					}
					Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
				}
			})?;

		Ok(BackgroundProcessor {
			stop: Some(stop),
			handle: Some(handle),
		})
	}

	pub fn shutdown(mut self) -> eyre::Result<()> {
		self.halt()
	}

	fn halt(&mut self) -> eyre::Result<()> {
		drop(self.stop.take());
		if let Some(handle) = self.handle.take() {
			handle
				.join()
				.map_err(|_| eyre!("background processor thread panicked"))?;
		}
		Ok(())
	}
}

impl Drop for BackgroundProcessor {
	fn drop(&mut self) {
		if let Err(err) = self.halt() {
			error!("{err}");
		}
	}
}
