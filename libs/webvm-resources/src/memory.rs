use crate::{
	file_name, join_path, Certificate, ContextInfo, EmptyResource, ResourceError, ResourceRef,
	ResourceUrl, WebResource, WebResourceRoot, WEB_INF_CLASSES, WEB_INF_LIB,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use webvm_core::binary_name_to_path;
use webvm_reader::Manifest;

#[derive(Clone)]
struct MemoryFile {
	data: Arc<[u8]>,
	last_modified: u64,
	readable: bool,
}

/// An archive mounted under `/WEB-INF/lib`.
#[derive(Clone, Debug)]
pub struct MemoryJar {
	name: String,
	last_modified: u64,
	readable: bool,
	entries: BTreeMap<String, Arc<[u8]>>,
	manifest: Option<Arc<Manifest>>,
	certificates: Vec<Certificate>,
}

impl MemoryJar {
	pub fn new(name: impl Into<String>) -> MemoryJar {
		MemoryJar {
			name: name.into(),
			last_modified: 0,
			readable: true,
			entries: BTreeMap::new(),
			manifest: None,
			certificates: vec![],
		}
	}

	/// Adds an entry by class-path relative name, e.g. `com/acme/Bar.class`.
	pub fn with_entry(mut self, entry: &str, data: impl Into<Vec<u8>>) -> MemoryJar {
		let data: Vec<u8> = data.into();
		self.entries.insert(entry.trim_start_matches('/').to_string(), data.into());
		self
	}

	pub fn with_class(self, binary_name: &str, data: impl Into<Vec<u8>>) -> MemoryJar {
		let path = binary_name_to_path(binary_name, false);
		self.with_entry(&path, data)
	}

	pub fn with_manifest(mut self, manifest: Manifest) -> MemoryJar {
		self.manifest = Some(Arc::new(manifest));
		self
	}

	pub fn with_certificate(mut self, certificate: Certificate) -> MemoryJar {
		self.certificates.push(certificate);
		self
	}

	pub fn unreadable(mut self) -> MemoryJar {
		self.readable = false;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

#[derive(Default)]
struct MemoryState {
	files: BTreeMap<String, MemoryFile>,
	jars: Vec<MemoryJar>,
}

/// A mutable resource root kept entirely in memory. Timestamps come from a logical clock
/// that advances on every change, so two changes never share a timestamp.
pub struct MemoryResourceRoot {
	context: ContextInfo,
	clock: AtomicU64,
	state: RwLock<MemoryState>,
}

impl MemoryResourceRoot {
	pub fn new(context_name: impl Into<String>) -> MemoryResourceRoot {
		MemoryResourceRoot::with_context(ContextInfo {
			name: context_name.into(),
			host: "localhost".to_string(),
			service: "Catalina".to_string(),
		})
	}

	pub fn with_context(context: ContextInfo) -> MemoryResourceRoot {
		MemoryResourceRoot {
			context,
			clock: AtomicU64::new(1_000),
			state: RwLock::new(MemoryState::default()),
		}
	}

	fn tick(&self) -> u64 {
		self.clock.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// Stores a file at a web application path and returns its timestamp.
	pub fn put(&self, path: &str, data: impl Into<Vec<u8>>) -> u64 {
		let data: Vec<u8> = data.into();
		let last_modified = self.tick();
		self.state.write().files.insert(
			normalize(path),
			MemoryFile {
				data: data.into(),
				last_modified,
				readable: true,
			},
		);
		last_modified
	}

	/// Stores class bytes under `/WEB-INF/classes`.
	pub fn put_class(&self, binary_name: &str, data: impl Into<Vec<u8>>) -> u64 {
		let path = join_path(WEB_INF_CLASSES, &binary_name_to_path(binary_name, false));
		self.put(&path, data)
	}

	/// Appends a JAR to `/WEB-INF/lib`, or replaces one with the same name in place.
	pub fn add_jar(&self, mut jar: MemoryJar) -> u64 {
		let last_modified = self.tick();
		jar.last_modified = last_modified;
		let mut state = self.state.write();
		match state.jars.iter_mut().find(|existing| existing.name == jar.name) {
			Some(existing) => *existing = jar,
			None => state.jars.push(jar),
		}
		last_modified
	}

	pub fn remove_jar(&self, name: &str) -> bool {
		let mut state = self.state.write();
		let before = state.jars.len();
		state.jars.retain(|jar| jar.name != name);
		state.jars.len() != before
	}

	/// Advances the timestamp of a file or of a JAR (`/WEB-INF/lib/<name>`).
	pub fn touch(&self, path: &str) -> bool {
		let path = normalize(path);
		let last_modified = self.tick();
		let mut state = self.state.write();
		if let Some(file) = state.files.get_mut(&path) {
			file.last_modified = last_modified;
			return true;
		}
		if let Some(jar) = state.jars.iter_mut().find(|jar| jar_path(&jar.name) == path) {
			jar.last_modified = last_modified;
			return true;
		}
		false
	}

	pub fn remove(&self, path: &str) -> bool {
		self.state.write().files.remove(&normalize(path)).is_some()
	}

	pub fn set_readable(&self, path: &str, readable: bool) -> bool {
		let path = normalize(path);
		let mut state = self.state.write();
		if let Some(file) = state.files.get_mut(&path) {
			file.readable = readable;
			return true;
		}
		false
	}

	fn url(&self, path: &str) -> ResourceUrl {
		ResourceUrl::new(format!("memory:{}{path}", self.context.name))
	}

	fn is_directory(state: &MemoryState, path: &str) -> bool {
		let prefix = format!("{}/", path.trim_end_matches('/'));
		state.files.keys().any(|file| file.starts_with(&prefix))
			|| state.jars.iter().any(|jar| jar_path(&jar.name).starts_with(&prefix))
	}

	fn file_resource(&self, state: &MemoryState, path: &str) -> Option<MemoryResource> {
		if let Some(file) = state.files.get(path) {
			let code_base = path
				.starts_with(&format!("{WEB_INF_CLASSES}/"))
				.then(|| self.url(WEB_INF_CLASSES));
			return Some(MemoryResource {
				path: path.to_string(),
				directory: false,
				readable: file.readable,
				last_modified: file.last_modified,
				data: Some(file.data.clone()),
				url: Some(self.url(path)),
				code_base,
				manifest: None,
				certificates: vec![],
			});
		}

		if let Some(jar) = state.jars.iter().find(|jar| jar_path(&jar.name) == path) {
			return Some(MemoryResource {
				path: path.to_string(),
				directory: false,
				readable: jar.readable,
				last_modified: jar.last_modified,
				data: None,
				url: Some(self.url(path)),
				code_base: None,
				manifest: jar.manifest.clone(),
				certificates: vec![],
			});
		}

		if MemoryResourceRoot::is_directory(state, path) {
			return Some(MemoryResource::directory(path, self.url(path)));
		}
		None
	}

	fn jar_entry(&self, jar: &MemoryJar, path: &str) -> Option<MemoryResource> {
		let entry = path.trim_start_matches('/');
		let jar_url = self.url(&jar_path(&jar.name));
		if let Some(data) = jar.entries.get(entry) {
			return Some(MemoryResource {
				path: path.to_string(),
				directory: false,
				readable: jar.readable,
				last_modified: jar.last_modified,
				data: Some(data.clone()),
				url: Some(ResourceUrl::jar_entry(&jar_url, entry)),
				code_base: Some(jar_url),
				manifest: jar.manifest.clone(),
				certificates: jar.certificates.clone(),
			});
		}

		let prefix = format!("{}/", entry.trim_end_matches('/'));
		if jar.entries.keys().any(|name| name.starts_with(&prefix)) {
			let mut resource = MemoryResource::directory(path, ResourceUrl::jar_entry(&jar_url, entry));
			resource.last_modified = jar.last_modified;
			resource.code_base = Some(jar_url);
			return Some(resource);
		}
		None
	}

	fn class_loader_matches(&self, path: &str, first_only: bool) -> Vec<ResourceRef> {
		let state = self.state.read();
		let mut out: Vec<ResourceRef> = vec![];

		let classes_path = join_path(WEB_INF_CLASSES, path);
		if let Some(resource) = self.file_resource(&state, &classes_path) {
			let mut resource = resource;
			resource.path = path.to_string();
			out.push(Arc::new(resource));
			if first_only {
				return out;
			}
		}

		for jar in &state.jars {
			if let Some(resource) = self.jar_entry(jar, path) {
				out.push(Arc::new(resource));
				if first_only {
					return out;
				}
			}
		}
		out
	}
}

impl WebResourceRoot for MemoryResourceRoot {
	fn get_resource(&self, path: &str) -> ResourceRef {
		let path = normalize(path);
		let state = self.state.read();
		match self.file_resource(&state, &path) {
			Some(resource) => Arc::new(resource),
			None => EmptyResource::shared(path),
		}
	}

	fn get_resources(&self, path: &str) -> Vec<ResourceRef> {
		let resource = self.get_resource(path);
		if resource.exists() {
			vec![resource]
		} else {
			vec![]
		}
	}

	fn list_resources(&self, path: &str) -> Vec<ResourceRef> {
		let dir = normalize(path);
		let prefix = format!("{}/", dir.trim_end_matches('/'));
		let children: Vec<String> = {
			let state = self.state.read();
			let mut jars = vec![];
			let mut others = BTreeSet::new();
			for jar in &state.jars {
				let jar_path = jar_path(&jar.name);
				match jar_path.strip_prefix(&prefix) {
					Some(rest) if !rest.contains('/') => jars.push(rest.to_string()),
					Some(rest) => {
						let child = rest.split('/').next().unwrap_or(rest);
						others.insert(child.to_string());
					}
					None => {}
				}
			}
			for file in state.files.keys() {
				if let Some(rest) = file.strip_prefix(&prefix) {
					let child = rest.split('/').next().unwrap_or(rest);
					if !jars.iter().any(|jar| jar == child) {
						others.insert(child.to_string());
					}
				}
			}
			jars.into_iter().chain(others).collect()
		};

		children
			.into_iter()
			.map(|child| self.get_resource(&join_path(&dir, &child)))
			.collect()
	}

	fn get_class_loader_resource(&self, path: &str) -> ResourceRef {
		match self.class_loader_matches(path, true).pop() {
			Some(resource) => resource,
			None => EmptyResource::shared(path),
		}
	}

	fn get_class_loader_resources(&self, path: &str) -> Vec<ResourceRef> {
		self.class_loader_matches(path, false)
	}

	fn context(&self) -> ContextInfo {
		self.context.clone()
	}
}

fn normalize(path: &str) -> String {
	let trimmed = path.trim_end_matches('/');
	if trimmed.starts_with('/') {
		trimmed.to_string()
	} else {
		format!("/{trimmed}")
	}
}

fn jar_path(name: &str) -> String {
	join_path(WEB_INF_LIB, name)
}

#[derive(Clone, Debug)]
pub struct MemoryResource {
	path: String,
	directory: bool,
	readable: bool,
	last_modified: u64,
	data: Option<Arc<[u8]>>,
	url: Option<ResourceUrl>,
	code_base: Option<ResourceUrl>,
	manifest: Option<Arc<Manifest>>,
	certificates: Vec<Certificate>,
}

impl MemoryResource {
	fn directory(path: &str, url: ResourceUrl) -> MemoryResource {
		MemoryResource {
			path: path.to_string(),
			directory: true,
			readable: true,
			last_modified: 0,
			data: None,
			url: Some(url),
			code_base: None,
			manifest: None,
			certificates: vec![],
		}
	}
}

impl WebResource for MemoryResource {
	fn exists(&self) -> bool {
		true
	}

	fn is_file(&self) -> bool {
		!self.directory
	}

	fn is_directory(&self) -> bool {
		self.directory
	}

	fn can_read(&self) -> bool {
		self.readable
	}

	fn name(&self) -> &str {
		file_name(&self.path)
	}

	fn path(&self) -> &str {
		&self.path
	}

	fn last_modified(&self) -> u64 {
		self.last_modified
	}

	fn content(&self) -> Result<Vec<u8>, ResourceError> {
		if !self.readable {
			return Err(ResourceError::NotReadable(self.path.clone()));
		}
		match &self.data {
			Some(data) => Ok(data.to_vec()),
			None => Err(ResourceError::NotReadable(self.path.clone())),
		}
	}

	fn url(&self) -> Option<ResourceUrl> {
		self.url.clone()
	}

	fn code_base(&self) -> Option<ResourceUrl> {
		self.code_base.clone()
	}

	fn certificates(&self) -> Vec<Certificate> {
		self.certificates.clone()
	}

	fn manifest(&self) -> Option<Arc<Manifest>> {
		self.manifest.clone()
	}
}
