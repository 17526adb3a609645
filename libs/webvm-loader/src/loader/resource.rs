use crate::{NameKind, ResourceEntry, WebappClassLoader};
use tracing::{error, trace, warn};
use webvm_core::{is_class_resource, name_to_path, path_to_internal_name};
use webvm_resources::{ResourceRef, ResourceUrl};

impl WebappClassLoader {
	/// The URL of `name`, a class-path relative resource name. Parent and local lookup are
	/// ordered the same way as for classes; the platform tier does not apply.
	pub fn get_resource(&self, name: &str) -> Option<ResourceUrl> {
		trace!("get_resource({name})");
		if self.check_available(name).is_err() {
			return None;
		}

		let delegate_first = self.delegate() || self.filter.matches(name, NameKind::Resource);
		if delegate_first {
			if let Some(url) = self.parent.get_resource(name) {
				trace!("  --> Returning '{url}' from parent");
				return Some(url);
			}
		}

		if let Some(url) = self.find_resource(name) {
			trace!("  --> Returning '{url}'");
			return Some(url);
		}

		if !delegate_first {
			if let Some(url) = self.parent.get_resource(name) {
				trace!("  --> Returning '{url}' from parent");
				return Some(url);
			}
		}

		trace!("  --> Resource not found, returning None");
		None
	}

	/// Every URL for `name`, parent results first when the name is delegated first.
	pub fn get_resources(&self, name: &str) -> Vec<ResourceUrl> {
		if self.check_available(name).is_err() {
			return vec![];
		}

		let parent = self.parent.get_resources(name);
		let local = self.find_resources(name);
		let delegate_first = self.delegate() || self.filter.matches(name, NameKind::Resource);
		let (first, second) = if delegate_first { (parent, local) } else { (local, parent) };
		first.into_iter().chain(second).collect()
	}

	/// Searches only the local repositories and records the resource for modification
	/// tracking.
	pub fn find_resource(&self, name: &str) -> Option<ResourceUrl> {
		trace!("    find_resource({name})");
		let generation = self.generation();
		if self.check_available(name).is_err() {
			return None;
		}

		let path = name_to_path(name);
		if let Some(resources) = self.resources() {
			let resource = resources.get_class_loader_resource(&path);
			if resource.exists() {
				self.track_last_modified(&path, &resource, generation);
				if let Some(url) = resource.url() {
					return Some(url);
				}
			}
		}

		self.find_external(&path).and_then(|resource| resource.url())
	}

	/// Every local URL for `name`, without duplicates, in discovery order.
	pub fn find_resources(&self, name: &str) -> Vec<ResourceUrl> {
		trace!("    find_resources({name})");
		if self.check_available(name).is_err() {
			return vec![];
		}

		let path = name_to_path(name);
		let mut urls: Vec<ResourceUrl> = vec![];
		let mut push = |url: ResourceUrl| {
			if !urls.contains(&url) {
				urls.push(url);
			}
		};

		if let Some(resources) = self.resources() {
			for resource in resources.get_class_loader_resources(&path) {
				if let Some(url) = resource.exists().then(|| resource.url()).flatten() {
					push(url);
				}
			}
		}
		for repository in self.external_repositories.read().iter() {
			if let Some(url) = repository.find(&path).and_then(|resource| resource.url()) {
				push(url);
			}
		}
		urls
	}

	/// The content of `name`. Class files found locally go through the registered
	/// transformers first; a transformer failure is logged and yields `None`.
	pub fn get_resource_as_stream(&self, name: &str) -> Option<Vec<u8>> {
		trace!("get_resource_as_stream({name})");
		let generation = self.generation();
		if self.check_available(name).is_err() {
			return None;
		}

		let delegate_first = self.delegate() || self.filter.matches(name, NameKind::Resource);
		if delegate_first {
			if let Some(content) = self.parent.get_resource_bytes(name) {
				trace!("  --> Returning stream from parent");
				return Some(content);
			}
		}

		trace!("  Searching local repositories");
		let path = name_to_path(name);
		let local = self.resources().and_then(|resources| {
			let resource = resources.get_class_loader_resource(&path);
			resource.exists().then_some(resource)
		});
		match local {
			Some(resource) => {
				let content = self.read_local(name, &path, &resource)?;
				self.track_last_modified(&path, &resource, generation);
				return Some(content);
			}
			None => {
				if let Some(content) = self.find_external(&path).and_then(|resource| resource.content().ok()) {
					return Some(content);
				}
			}
		}

		if !delegate_first {
			if let Some(content) = self.parent.get_resource_bytes(name) {
				trace!("  --> Returning stream from parent");
				return Some(content);
			}
		}

		trace!("  --> Resource not found, returning None");
		None
	}

	fn read_local(&self, name: &str, path: &str, resource: &ResourceRef) -> Option<Vec<u8>> {
		let content = match resource.content() {
			Ok(content) => content,
			Err(err) => {
				warn!("Failed to read resource {name}: {err}");
				return None;
			}
		};
		if !is_class_resource(name) || self.transformers.is_empty() {
			return Some(content);
		}

		let internal_name = path_to_internal_name(path);
		match self.transformers.apply(&self.identity, internal_name, None, content) {
			Ok(content) => Some(content),
			Err(err) => {
				error!("Failed to transform class with name [{name}]: {err}");
				None
			}
		}
	}

	fn find_external(&self, path: &str) -> Option<ResourceRef> {
		self.external_repositories
			.read()
			.iter()
			.find_map(|repository| repository.find(path))
	}

	fn track_last_modified(&self, path: &str, resource: &ResourceRef, generation: u64) {
		if self.resource_entries.read().contains_key(path) {
			return;
		}
		self.insert_entry(path, ResourceEntry::new(resource.last_modified()), generation);
	}
}
