use crate::{
	ClassLoadError, ClassRef, CodeSource, DefineError, IllegalStateError, NameKind, NotFoundCause,
	ResourceEntry, SecurityViolation, WebappClassLoader,
};
use tracing::{error, info, trace, warn};
use webvm_core::{binary_name_to_path, binary_to_internal_name, package_name};
use webvm_resources::ResourceRef;

impl WebappClassLoader {
	/// Loads `name`, linking it when `resolve` is set.
	///
	/// Search order: this loader's cache, the platform loader (only for names it has a
	/// class file for), then the parent and the local repositories. The parent goes first
	/// when delegation is on or the name matches the delegation filter, last otherwise.
	pub fn load_class(&self, name: &str, resolve: bool) -> Result<ClassRef, ClassLoadError> {
		trace!("load_class({name}, {resolve})");
		let class = self.load_class_unlinked(name)?;
		if resolve {
			class.link();
		}
		Ok(class)
	}

	fn load_class_unlinked(&self, name: &str) -> Result<ClassRef, ClassLoadError> {
		self.check_state_for_class_loading(name)?;

		let path = binary_name_to_path(name, true);
		if let Some(class) = self.cached_class(&path) {
			trace!("  Returning class from cache");
			return Ok(class);
		}

		self.locks.with_lock(name, || self.load_class_locked(name, &path))
	}

	fn load_class_locked(&self, name: &str, path: &str) -> Result<ClassRef, ClassLoadError> {
		self.check_state_for_class_loading(name)?;

		if let Some(class) = self.cached_class(path) {
			trace!("  Returning class from cache");
			return Ok(class);
		}
		if let Some(class) = self.arena.lock().find(name) {
			trace!("  Returning class from cache");
			return Ok(class);
		}

		if let Some(class) = self.load_from_platform(name)? {
			return Ok(class);
		}

		if let Some(package) = package_name(name) {
			if let Some(prefix) = self.config.restricted_prefix(package) {
				info!("Security violation, attempt to use restricted class {name} (package prefix {prefix})");
				return Err(ClassLoadError::NotFound {
					name: name.to_string(),
					cause: Some(NotFoundCause::AccessDenied {
						package: package.to_string(),
					}),
				});
			}
		}

		let delegate_first = self.delegate() || self.filter.matches(name, NameKind::Class);

		if delegate_first {
			trace!("  Delegating to parent classloader {}", self.parent.identity());
			if let Some(class) = self.load_from_parent(name)? {
				trace!("  Loading class from parent");
				return Ok(class);
			}
		}

		trace!("  Searching local repositories");
		match self.find_class(name) {
			Ok(class) => {
				trace!("  Loading class from local repository");
				return Ok(class);
			}
			Err(err) if err.is_not_found() && !err.is_illegal_state() => {}
			Err(err) => return Err(err),
		}

		if !delegate_first {
			trace!("  Delegating to parent classloader at end: {}", self.parent.identity());
			if let Some(class) = self.load_from_parent(name)? {
				trace!("  Loading class from parent");
				return Ok(class);
			}
		}

		Err(ClassLoadError::not_found(name))
	}

	/// Asks the platform loader, but only when it has the class file. Application classes
	/// can therefore never override the platform's own.
	fn load_from_platform(&self, name: &str) -> Result<Option<ClassRef>, ClassLoadError> {
		let resource_name = binary_name_to_path(name, false);
		if self.platform.get_resource(&resource_name).is_none() {
			return Ok(None);
		}
		match self.platform.load_class(name, false) {
			Ok(class) => Ok(Some(class)),
			Err(err) if err.is_not_found() => Ok(None),
			Err(err) => Err(err),
		}
	}

	fn load_from_parent(&self, name: &str) -> Result<Option<ClassRef>, ClassLoadError> {
		match self.parent.load_class(name, false) {
			Ok(class) => Ok(Some(class)),
			Err(err) if err.is_not_found() => Ok(None),
			Err(err) => Err(err),
		}
	}

	/// Searches only this loader's repositories, never the parent or the platform.
	pub fn find_class(&self, name: &str) -> Result<ClassRef, ClassLoadError> {
		trace!("    find_class({name})");
		let generation = self.generation();
		self.check_state_for_class_loading(name)?;

		if let Some(class) = self.find_class_internal(name, generation)? {
			return Ok(class);
		}
		if let Some(class) = self.find_class_external(name, generation)? {
			return Ok(class);
		}
		trace!("    --> Returning ClassNotFoundException");
		Err(ClassLoadError::not_found(name))
	}

	/// The loader was stopped after `name` started resolving.
	fn superseded(&self, name: &str) -> ClassLoadError {
		let err = IllegalStateError {
			resource: name.to_string(),
			state: *self.state.read(),
		};
		info!("{err}");
		ClassLoadError::NotFound {
			name: name.to_string(),
			cause: Some(NotFoundCause::IllegalState(err)),
		}
	}

	fn check_state_for_class_loading(&self, name: &str) -> Result<(), ClassLoadError> {
		self.check_available(name).map_err(|err| ClassLoadError::NotFound {
			name: name.to_string(),
			cause: Some(NotFoundCause::IllegalState(err)),
		})
	}

	/// Looks `name` up in the resource root and defines it on first sight. The resource
	/// entry is recorded before definition so modification tracking covers it even if
	/// definition fails.
	fn find_class_internal(&self, name: &str, generation: u64) -> Result<Option<ClassRef>, ClassLoadError> {
		let Some(resources) = self.resources() else {
			return Ok(None);
		};
		let path = binary_name_to_path(name, true);

		let existing = self.resource_entries.read().get(&path).cloned();
		let (entry, resource) = match existing {
			Some(entry) => (entry, None),
			None => {
				let resource = resources.get_class_loader_resource(&path);
				if !resource.exists() {
					return Ok(None);
				}
				let Some(entry) = self.insert_entry(&path, ResourceEntry::new(resource.last_modified()), generation)
				else {
					return Err(self.superseded(name));
				};
				(entry, Some(resource))
			}
		};
		if let Some(class) = entry.loaded_class() {
			return Ok(Some(class.clone()));
		}

		self.locks.with_lock(name, || {
			// Another thread may have defined it while we waited.
			if let Some(class) = entry.loaded_class() {
				return Ok(Some(class.clone()));
			}
			let resource = resource.unwrap_or_else(|| resources.get_class_loader_resource(&path));
			if !resource.exists() {
				return Ok(None);
			}
			let class = self.define_from_resource(name, &resource, generation)?;
			Ok(class.map(|class| entry.set_loaded_class(class)))
		})
	}

	/// Repositories added through [`WebappClassLoader::add_repository`]. Their classes are
	/// not modification tracked.
	fn find_class_external(&self, name: &str, generation: u64) -> Result<Option<ClassRef>, ClassLoadError> {
		let repositories = self.external_repositories.read().clone();
		if repositories.is_empty() {
			return Ok(None);
		}
		let path = binary_name_to_path(name, true);

		self.locks.with_lock(name, || {
			if let Some(class) = self.arena.lock().find(name) {
				return Ok(Some(class));
			}
			for repository in &repositories {
				if let Some(resource) = repository.find(&path) {
					trace!("    Found {name} in external repository {}", repository.url());
					return self.define_from_resource(name, &resource, generation);
				}
			}
			Ok(None)
		})
	}

	/// Reads, transforms and defines the class in `resource`. Must be called with the
	/// name lock held. An unreadable resource counts as not found. Nothing is defined once
	/// `generation` has passed.
	fn define_from_resource(
		&self,
		name: &str,
		resource: &ResourceRef,
		generation: u64,
	) -> Result<Option<ClassRef>, ClassLoadError> {
		let content = match resource.content() {
			Ok(content) => content,
			Err(err) => {
				warn!("Failed to read class {name} from {}: {err}", resource.path());
				return Ok(None);
			}
		};

		let code_base = resource.code_base();
		let code_source = CodeSource {
			location: code_base.clone(),
			certificates: resource.certificates(),
		};

		let internal_name = binary_to_internal_name(name);
		let bytes = self
			.transformers
			.apply(&self.identity, &internal_name, Some(&code_source), content)
			.map_err(|err| {
				error!("Failed to transform class with name [{name}]: {err}");
				ClassLoadError::ClassFormat {
					name: name.to_string(),
					reason: err.0,
				}
			})?;

		if self.generation() != generation {
			return Err(self.superseded(name));
		}

		if let Some(package) = package_name(name) {
			let manifest = resource.manifest();
			let defined = self.packages.define(package, manifest.as_deref(), code_base.as_ref());
			if self.config.enforce_sealing && !defined.admits(code_base.as_ref(), manifest.as_deref()) {
				warn!("Sealing violation loading {name}: package {package} is sealed");
				return Err(ClassLoadError::Security {
					name: name.to_string(),
					violation: SecurityViolation::Sealing {
						package: package.to_string(),
					},
				});
			}
		}

		let defined = {
			let mut arena = self.arena.lock();
			if self.generation() != generation {
				return Err(self.superseded(name));
			}
			arena.define(name, &bytes, code_source)
		};
		match defined {
			Ok(class) => Ok(Some(class)),
			Err(DefineError::Duplicate(existing)) => Ok(Some(existing)),
			Err(DefineError::Format(err)) => Err(ClassLoadError::ClassFormat {
				name: name.to_string(),
				reason: err.to_string(),
			}),
			Err(DefineError::Prohibited { package }) => Err(ClassLoadError::Security {
				name: name.to_string(),
				violation: SecurityViolation::ProhibitedPackage { package },
			}),
			Err(err) => Err(ClassLoadError::Linkage {
				name: name.to_string(),
				reason: err.to_string(),
			}),
		}
	}
}
