use crate::leak::{HostRuntime, LeakReport, NoHostRuntime};
use crate::{
	ClassArena, ClassLoadError, ClassRef, DelegateLoader, DelegateRef, DelegationFilter,
	IllegalStateError, LoaderConfig, LoaderIdentity, LoaderRef, NameLocks, PackageRegistry, ResourceEntry,
	TransformerList, TransformerRef,
};
use ahash::{HashMap, HashMapExt};
use parking_lot::{Mutex, RwLock};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use webvm_core::{binary_name_to_path, LifecycleState};
use webvm_resources::{Repository, ResourceUrl, WebResourceRoot};

mod lifecycle;
mod modified;
mod resolve;
mod resource;

/// The class loader of one web application.
///
/// Classes are looked up in tiers: the platform loader for anything it can see, then
/// (depending on [`WebappClassLoader::delegate`] and the delegation filter) the parent
/// and the application's own `/WEB-INF/classes` and `/WEB-INF/lib` repositories. A class
/// name is defined at most once; later requests return the same [`ClassRef`].
///
/// Lookups only succeed while the loader is available (see
/// [`LifecycleState::is_available`]). Outside that window class lookups fail with a
/// not-found error carrying an [`crate::IllegalStateError`] and resource lookups come
/// back empty.
pub struct WebappClassLoader {
	identity: LoaderRef,
	parent: DelegateRef,
	platform: DelegateRef,
	config: LoaderConfig,
	filter: DelegationFilter,
	delegate: AtomicBool,
	state: RwLock<LifecycleState>,
	/// Bumped whenever the loader drops what it has defined. A resolution that started in
	/// an earlier generation must not publish into this one.
	generation: AtomicU64,
	/// Serializes lifecycle transitions against each other.
	transition: Mutex<()>,
	resources: RwLock<Option<Arc<dyn WebResourceRoot>>>,
	resource_entries: RwLock<HashMap<String, Arc<ResourceEntry>>>,
	local_repositories: RwLock<Vec<ResourceUrl>>,
	external_repositories: RwLock<Vec<Arc<dyn Repository>>>,
	jar_modification_times: RwLock<HashMap<String, u64>>,
	arena: Mutex<ClassArena>,
	packages: PackageRegistry,
	locks: NameLocks,
	transformers: TransformerList,
	host: RwLock<Arc<dyn HostRuntime>>,
	last_leak_report: Mutex<Option<LeakReport>>,
}

impl WebappClassLoader {
	pub fn new(parent: DelegateRef, platform: DelegateRef, config: LoaderConfig) -> WebappClassLoader {
		let identity = LoaderIdentity::new("WebappClassLoader", Some(parent.identity().clone()));
		WebappClassLoader {
			arena: Mutex::new(ClassArena::new(identity.clone())),
			identity,
			parent,
			platform,
			filter: config.filter(),
			delegate: AtomicBool::new(config.delegate),
			locks: NameLocks::new(config.locking),
			config,
			state: RwLock::new(LifecycleState::New),
			generation: AtomicU64::new(0),
			transition: Mutex::new(()),
			resources: RwLock::new(None),
			resource_entries: RwLock::new(HashMap::new()),
			local_repositories: RwLock::new(vec![]),
			external_repositories: RwLock::new(vec![]),
			jar_modification_times: RwLock::new(HashMap::new()),
			packages: PackageRegistry::new(),
			transformers: TransformerList::new(),
			host: RwLock::new(Arc::new(NoHostRuntime)),
			last_leak_report: Mutex::new(None),
		}
	}

	/// A fresh loader over the same resources and settings, without any transformers.
	/// The copy starts out in [`LifecycleState::New`]; nothing it loads is shared with
	/// this loader.
	pub fn copy_without_transformers(&self) -> WebappClassLoader {
		let copy = WebappClassLoader::new(self.parent.clone(), self.platform.clone(), self.config.clone());
		copy.set_delegate(self.delegate());
		*copy.resources.write() = self.resources.read().clone();
		*copy.host.write() = self.host.read().clone();
		*copy.jar_modification_times.write() = self.jar_modification_times.read().clone();
		copy
	}

	pub fn identity(&self) -> &LoaderRef {
		&self.identity
	}

	pub fn parent(&self) -> &DelegateRef {
		&self.parent
	}

	pub fn config(&self) -> &LoaderConfig {
		&self.config
	}

	pub fn delegate(&self) -> bool {
		self.delegate.load(Ordering::Acquire)
	}

	pub fn set_delegate(&self, delegate: bool) {
		self.delegate.store(delegate, Ordering::Release);
	}

	pub fn resources(&self) -> Option<Arc<dyn WebResourceRoot>> {
		self.resources.read().clone()
	}

	pub fn set_resources(&self, resources: Arc<dyn WebResourceRoot>) {
		*self.resources.write() = Some(resources);
	}

	pub fn set_host_runtime(&self, runtime: Arc<dyn HostRuntime>) {
		*self.host.write() = runtime;
	}

	pub fn host_runtime(&self) -> Arc<dyn HostRuntime> {
		self.host.read().clone()
	}

	/// What the leak sweep of the last stop found, if the loader has been stopped.
	pub fn last_leak_report(&self) -> Option<LeakReport> {
		self.last_leak_report.lock().clone()
	}

	pub fn context_name(&self) -> String {
		self.resources()
			.map(|resources| resources.context().name)
			.unwrap_or_else(|| "unknown".to_string())
	}

	pub fn host_name(&self) -> Option<String> {
		self.resources().map(|resources| resources.context().host)
	}

	pub fn service_name(&self) -> Option<String> {
		self.resources().map(|resources| resources.context().service)
	}

	pub fn add_transformer(&self, transformer: TransformerRef) -> bool {
		self.transformers.add(transformer)
	}

	pub fn remove_transformer(&self, transformer: &TransformerRef) -> bool {
		self.transformers.remove(transformer)
	}

	pub fn transformers(&self) -> Arc<Vec<TransformerRef>> {
		self.transformers.snapshot()
	}

	/// Adds a repository searched after the resource root.
	pub fn add_repository(&self, repository: Arc<dyn Repository>) {
		info!("Adding external repository {}", repository.url());
		self.external_repositories.write().push(repository);
	}

	/// Every location classes are read from: the class directories and archives found at
	/// start, followed by the external repositories.
	pub fn urls(&self) -> Vec<ResourceUrl> {
		let mut urls = self.local_repositories.read().clone();
		urls.extend(self.external_repositories.read().iter().map(|repository| repository.url()));
		urls
	}

	/// Whether the application ships its own logging configuration.
	pub fn has_logging_config(&self) -> bool {
		self.find_resource("logging.properties").is_some()
	}

	/// The class cached for `name`, without searching for it.
	pub fn find_loaded_class(&self, name: &str) -> Option<ClassRef> {
		let path = binary_name_to_path(name, true);
		self.cached_class(&path)
			.or_else(|| self.arena.lock().find(name))
	}

	fn cached_class(&self, path: &str) -> Option<ClassRef> {
		self.resource_entries
			.read()
			.get(path)
			.and_then(|entry| entry.loaded_class().cloned())
	}

	pub(crate) fn generation(&self) -> u64 {
		self.generation.load(Ordering::SeqCst)
	}

	/// Invalidates every resolution in flight. Called before the caches are cleared.
	pub(crate) fn next_generation(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}

	/// Records `entry` for `path` unless one exists already. Returns the entry the map
	/// holds afterwards, or `None` once `generation` has passed.
	fn insert_entry(&self, path: &str, entry: ResourceEntry, generation: u64) -> Option<Arc<ResourceEntry>> {
		if let Some(existing) = self.resource_entries.read().get(path) {
			return Some(existing.clone());
		}
		let mut entries = self.resource_entries.write();
		if self.generation() != generation {
			return None;
		}
		Some(entries.entry(path.to_string()).or_insert_with(|| Arc::new(entry)).clone())
	}

	pub(crate) fn check_available(&self, resource: &str) -> Result<(), IllegalStateError> {
		let state = *self.state.read();
		if state.is_available() {
			return Ok(());
		}
		let err = IllegalStateError {
			resource: resource.to_string(),
			state,
		};
		info!("{err}");
		Err(err)
	}
}

impl Display for WebappClassLoader {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "WebappClassLoader\r\n")?;
		write!(f, "  context: {}\r\n", self.context_name())?;
		write!(f, "  delegate: {}\r\n", self.delegate())?;
		write!(f, "----------> Parent Classloader:\r\n")?;
		write!(f, "{}\r\n", self.parent.identity())?;
		let transformers = self.transformers.snapshot();
		if !transformers.is_empty() {
			write!(f, "----------> Class file transformers:\r\n")?;
			for transformer in transformers.iter() {
				write!(f, "{}\r\n", transformer.name())?;
			}
		}
		Ok(())
	}
}

impl DelegateLoader for WebappClassLoader {
	fn identity(&self) -> &LoaderRef {
		&self.identity
	}

	fn load_class(&self, name: &str, resolve: bool) -> Result<ClassRef, ClassLoadError> {
		WebappClassLoader::load_class(self, name, resolve)
	}

	fn get_resource(&self, name: &str) -> Option<ResourceUrl> {
		WebappClassLoader::get_resource(self, name)
	}

	fn get_resources(&self, name: &str) -> Vec<ResourceUrl> {
		WebappClassLoader::get_resources(self, name)
	}

	fn get_resource_bytes(&self, name: &str) -> Option<Vec<u8>> {
		self.get_resource_as_stream(name)
	}
}
