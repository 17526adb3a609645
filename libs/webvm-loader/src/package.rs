use ahash::{HashMap, HashMapExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use webvm_reader::{
	Manifest, IMPLEMENTATION_TITLE, IMPLEMENTATION_VENDOR, IMPLEMENTATION_VERSION,
	SPECIFICATION_TITLE, SPECIFICATION_VENDOR, SPECIFICATION_VERSION,
};
use webvm_resources::ResourceUrl;

/// A package defined by a loader, with the version metadata of the manifest it was first
/// seen in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Package {
	pub name: String,
	pub specification_title: Option<String>,
	pub specification_version: Option<String>,
	pub specification_vendor: Option<String>,
	pub implementation_title: Option<String>,
	pub implementation_version: Option<String>,
	pub implementation_vendor: Option<String>,
	pub seal_base: Option<ResourceUrl>,
}

impl Package {
	pub fn new(name: impl Into<String>) -> Package {
		Package {
			name: name.into(),
			..Package::default()
		}
	}

	pub fn from_manifest(name: &str, manifest: &Manifest, code_base: Option<&ResourceUrl>) -> Package {
		let attribute = |key: &str| manifest.package_attribute(name, key).map(str::to_string);
		let seal_base = if manifest.is_package_sealed(name) {
			code_base.cloned()
		} else {
			None
		};
		Package {
			name: name.to_string(),
			specification_title: attribute(SPECIFICATION_TITLE),
			specification_version: attribute(SPECIFICATION_VERSION),
			specification_vendor: attribute(SPECIFICATION_VENDOR),
			implementation_title: attribute(IMPLEMENTATION_TITLE),
			implementation_version: attribute(IMPLEMENTATION_VERSION),
			implementation_vendor: attribute(IMPLEMENTATION_VENDOR),
			seal_base,
		}
	}

	pub fn is_sealed(&self) -> bool {
		self.seal_base.is_some()
	}

	pub fn is_sealed_by(&self, code_base: Option<&ResourceUrl>) -> bool {
		self.seal_base.is_some() && self.seal_base.as_ref() == code_base
	}

	/// Whether a class from `code_base`, whose archive carries `manifest`, may join this
	/// package. A sealed package only accepts classes from its seal base; an unsealed one
	/// rejects classes from an archive that claims to seal it.
	pub fn admits(&self, code_base: Option<&ResourceUrl>, manifest: Option<&Manifest>) -> bool {
		if self.is_sealed() {
			return self.is_sealed_by(code_base);
		}
		!manifest.is_some_and(|manifest| manifest.is_package_sealed(&self.name))
	}
}

/// Packages defined by one loader. Definition is insert-if-absent: the first class seen
/// in a package fixes its metadata and seal.
#[derive(Default)]
pub struct PackageRegistry {
	packages: RwLock<HashMap<String, Arc<Package>>>,
}

impl PackageRegistry {
	pub fn new() -> PackageRegistry {
		PackageRegistry {
			packages: RwLock::new(HashMap::new()),
		}
	}

	pub fn get(&self, name: &str) -> Option<Arc<Package>> {
		self.packages.read().get(name).cloned()
	}

	/// Returns the package called `name`, defining it from `manifest` if it is new.
	pub fn define(&self, name: &str, manifest: Option<&Manifest>, code_base: Option<&ResourceUrl>) -> Arc<Package> {
		if let Some(package) = self.get(name) {
			return package;
		}

		let mut packages = self.packages.write();
		if let Some(package) = packages.get(name) {
			return package.clone();
		}
		let package = Arc::new(match manifest {
			Some(manifest) => Package::from_manifest(name, manifest, code_base),
			None => Package::new(name),
		});
		debug!("Defined package {name} (sealed: {})", package.is_sealed());
		packages.insert(name.to_string(), package.clone());
		package
	}

	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.packages.read().keys().cloned().collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.packages.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.packages.read().is_empty()
	}

	pub fn clear(&self) {
		self.packages.write().clear();
	}
}
