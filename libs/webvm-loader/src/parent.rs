use crate::{ClassArena, ClassLoadError, ClassRef, CodeSource, DefineError, LoaderIdentity, LoaderRef};
use ahash::{HashMap, HashMapExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::trace;
use webvm_core::binary_name_to_path;
use webvm_resources::ResourceUrl;

/// The contract a web application loader needs from its parent and from the platform
/// loader. Resource names are class-path relative without a leading slash.
pub trait DelegateLoader: Send + Sync {
	fn identity(&self) -> &LoaderRef;

	fn load_class(&self, name: &str, resolve: bool) -> Result<ClassRef, ClassLoadError>;

	fn get_resource(&self, name: &str) -> Option<ResourceUrl>;

	fn get_resources(&self, name: &str) -> Vec<ResourceUrl>;

	fn get_resource_bytes(&self, name: &str) -> Option<Vec<u8>>;
}

pub type DelegateRef = Arc<dyn DelegateLoader>;

/// A parent-first loader over classes and resources registered in memory. Stands in for
/// the container's shared and platform loaders.
pub struct SharedLoader {
	identity: LoaderRef,
	parent: Option<DelegateRef>,
	arena: Mutex<ClassArena>,
	classes: RwLock<HashMap<String, Arc<Vec<u8>>>>,
	resources: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl SharedLoader {
	pub fn new(name: impl Into<String>, parent: Option<DelegateRef>) -> Arc<SharedLoader> {
		let identity = LoaderIdentity::new(name, parent.as_ref().map(|parent| parent.identity().clone()));
		Arc::new(SharedLoader {
			arena: Mutex::new(ClassArena::new(identity.clone())),
			identity,
			parent,
			classes: RwLock::new(HashMap::new()),
			resources: RwLock::new(HashMap::new()),
		})
	}

	/// The root of a loader hierarchy. It may define `java.*` classes.
	pub fn platform() -> Arc<SharedLoader> {
		let identity = LoaderIdentity::new("platform", None);
		Arc::new(SharedLoader {
			arena: Mutex::new(ClassArena::trusted(identity.clone())),
			identity,
			parent: None,
			classes: RwLock::new(HashMap::new()),
			resources: RwLock::new(HashMap::new()),
		})
	}

	pub fn parent(&self) -> Option<&DelegateRef> {
		self.parent.as_ref()
	}

	/// Registers class-file bytes for `binary_name`; the class is defined on first load.
	/// The bytes are also served as the `.class` resource.
	pub fn add_class(&self, binary_name: &str, data: impl Into<Vec<u8>>) {
		let data = Arc::new(data.into());
		self.resources
			.write()
			.insert(binary_name_to_path(binary_name, false), data.clone());
		self.classes.write().insert(binary_name.to_string(), data);
	}

	pub fn add_resource(&self, name: &str, data: impl Into<Vec<u8>>) {
		self.resources
			.write()
			.insert(name.trim_start_matches('/').to_string(), Arc::new(data.into()));
	}

	pub fn find_loaded_class(&self, name: &str) -> Option<ClassRef> {
		self.arena.lock().find(name)
	}

	fn url_of(&self, name: &str) -> ResourceUrl {
		ResourceUrl::new(format!("loader:{}/{}", self.identity.name(), name))
	}

	fn find_class(&self, name: &str) -> Result<ClassRef, ClassLoadError> {
		let Some(data) = self.classes.read().get(name).cloned() else {
			return Err(ClassLoadError::not_found(name));
		};

		let mut arena = self.arena.lock();
		if let Some(class) = arena.find(name) {
			return Ok(class);
		}
		let code_source = CodeSource {
			location: Some(self.url_of("")),
			certificates: vec![],
		};
		arena.define(name, &data, code_source).map_err(|err| match err {
			DefineError::Format(err) => ClassLoadError::ClassFormat {
				name: name.to_string(),
				reason: err.to_string(),
			},
			other => ClassLoadError::Linkage {
				name: name.to_string(),
				reason: other.to_string(),
			},
		})
	}
}

impl DelegateLoader for SharedLoader {
	fn identity(&self) -> &LoaderRef {
		&self.identity
	}

	fn load_class(&self, name: &str, resolve: bool) -> Result<ClassRef, ClassLoadError> {
		if let Some(class) = self.find_loaded_class(name) {
			if resolve {
				class.link();
			}
			return Ok(class);
		}

		if let Some(parent) = &self.parent {
			match parent.load_class(name, resolve) {
				Ok(class) => return Ok(class),
				Err(err) if err.is_not_found() => {}
				Err(err) => return Err(err),
			}
		}

		trace!("Searching {} for {name}", self.identity);
		let class = self.find_class(name)?;
		if resolve {
			class.link();
		}
		Ok(class)
	}

	fn get_resource(&self, name: &str) -> Option<ResourceUrl> {
		if let Some(url) = self.parent.as_ref().and_then(|parent| parent.get_resource(name)) {
			return Some(url);
		}
		let name = name.trim_start_matches('/');
		self.resources
			.read()
			.contains_key(name)
			.then(|| self.url_of(name))
	}

	fn get_resources(&self, name: &str) -> Vec<ResourceUrl> {
		let mut urls = self
			.parent
			.as_ref()
			.map(|parent| parent.get_resources(name))
			.unwrap_or_default();
		let name = name.trim_start_matches('/');
		if self.resources.read().contains_key(name) {
			urls.push(self.url_of(name));
		}
		urls
	}

	fn get_resource_bytes(&self, name: &str) -> Option<Vec<u8>> {
		if let Some(data) = self.parent.as_ref().and_then(|parent| parent.get_resource_bytes(name)) {
			return Some(data);
		}
		self.resources
			.read()
			.get(name.trim_start_matches('/'))
			.map(|data| data.to_vec())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::class_file;

	#[test]
	fn parent_first() {
		let platform = SharedLoader::platform();
		platform.add_class("java.lang.Object", class_file("java/lang/Object"));
		let shared = SharedLoader::new("shared", Some(platform.clone()));
		shared.add_class("java.lang.Object", class_file("java/lang/Object"));
		shared.add_class("com.lib.Util", class_file("com/lib/Util"));

		let object = shared.load_class("java.lang.Object", false).unwrap();
		assert!(object.defined_by(platform.identity()));
		let util = shared.load_class("com.lib.Util", true).unwrap();
		assert!(util.defined_by(shared.identity()));
		assert!(util.is_linked());
		assert!(Arc::ptr_eq(&util, &shared.load_class("com.lib.Util", false).unwrap()));
		assert!(shared.load_class("com.lib.Missing", false).unwrap_err().is_not_found());
	}

	#[test]
	fn resources() {
		let platform = SharedLoader::platform();
		platform.add_resource("a.txt", b"platform".to_vec());
		let shared = SharedLoader::new("shared", Some(platform.clone()));
		shared.add_resource("/a.txt", b"shared".to_vec());
		shared.add_resource("b.txt", b"b".to_vec());

		assert_eq!(shared.get_resource_bytes("a.txt"), Some(b"platform".to_vec()));
		assert_eq!(shared.get_resources("a.txt").len(), 2);
		assert_eq!(
			shared.get_resource("b.txt").map(|url| url.to_string()),
			Some("loader:shared/b.txt".to_string())
		);
		assert_eq!(shared.get_resource("c.txt"), None);
	}

	#[test]
	fn class_files_are_resources() {
		let shared = SharedLoader::new("shared", None);
		shared.add_class("com.lib.Util", class_file("com/lib/Util"));
		assert!(shared.get_resource("com/lib/Util.class").is_some());
	}
}
