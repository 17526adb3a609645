use crate::ResourceError;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use webvm_reader::Manifest;

/// Location of a resource, `file:` for plain files and `jar:file:...!/entry` for archive
/// members. Only used for identity and diagnostics, never dereferenced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceUrl(String);

impl ResourceUrl {
	pub fn new(url: impl Into<String>) -> ResourceUrl {
		ResourceUrl(url.into())
	}

	pub fn file(path: &Path) -> ResourceUrl {
		let path = path.to_string_lossy().replace('\\', "/");
		if path.starts_with('/') {
			ResourceUrl(format!("file:{path}"))
		} else {
			ResourceUrl(format!("file:/{path}"))
		}
	}

	pub fn jar_entry(jar: &ResourceUrl, entry: &str) -> ResourceUrl {
		ResourceUrl(format!("jar:{}!/{}", jar.0, entry.trim_start_matches('/')))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for ResourceUrl {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// An opaque signer certificate attached to an archive entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Certificate {
	pub subject: String,
	pub encoded: Vec<u8>,
}

/// Names a resource root reports for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextInfo {
	pub name: String,
	pub host: String,
	pub service: String,
}

pub trait WebResource: Send + Sync + Debug {
	fn exists(&self) -> bool;
	fn is_file(&self) -> bool;
	fn is_directory(&self) -> bool;
	fn can_read(&self) -> bool;

	/// Last path segment.
	fn name(&self) -> &str;
	/// Web application path this resource was looked up with.
	fn path(&self) -> &str;
	/// Milliseconds since the epoch; `0` for resources that do not exist.
	fn last_modified(&self) -> u64;

	fn content(&self) -> Result<Vec<u8>, ResourceError>;
	fn url(&self) -> Option<ResourceUrl>;
	/// The repository (directory or archive) the resource was found in.
	fn code_base(&self) -> Option<ResourceUrl>;
	fn certificates(&self) -> Vec<Certificate>;
	fn manifest(&self) -> Option<Arc<Manifest>>;
}

pub type ResourceRef = Arc<dyn WebResource>;

pub trait WebResourceRoot: Send + Sync {
	fn get_resource(&self, path: &str) -> ResourceRef;

	/// Every resource at `path` across all backing sets, highest precedence first.
	fn get_resources(&self, path: &str) -> Vec<ResourceRef>;

	/// Direct children of the directory at `path`. Empty for files and missing paths.
	fn list_resources(&self, path: &str) -> Vec<ResourceRef>;

	/// Looks `path` up relative to `/WEB-INF/classes`, then in each JAR of `/WEB-INF/lib`.
	/// Always returns a resource; check [`WebResource::exists`].
	fn get_class_loader_resource(&self, path: &str) -> ResourceRef;

	fn get_class_loader_resources(&self, path: &str) -> Vec<ResourceRef>;

	fn context(&self) -> ContextInfo;
}

/// Placeholder returned for lookups that found nothing.
#[derive(Clone, Debug)]
pub struct EmptyResource {
	path: String,
}

impl EmptyResource {
	pub fn new(path: impl Into<String>) -> EmptyResource {
		EmptyResource { path: path.into() }
	}

	pub fn shared(path: impl Into<String>) -> ResourceRef {
		Arc::new(EmptyResource::new(path))
	}
}

impl WebResource for EmptyResource {
	fn exists(&self) -> bool {
		false
	}

	fn is_file(&self) -> bool {
		false
	}

	fn is_directory(&self) -> bool {
		false
	}

	fn can_read(&self) -> bool {
		false
	}

	fn name(&self) -> &str {
		crate::file_name(&self.path)
	}

	fn path(&self) -> &str {
		&self.path
	}

	fn last_modified(&self) -> u64 {
		0
	}

	fn content(&self) -> Result<Vec<u8>, ResourceError> {
		Err(ResourceError::NotFound(self.path.clone()))
	}

	fn url(&self) -> Option<ResourceUrl> {
		None
	}

	fn code_base(&self) -> Option<ResourceUrl> {
		None
	}

	fn certificates(&self) -> Vec<Certificate> {
		vec![]
	}

	fn manifest(&self) -> Option<Arc<Manifest>> {
		None
	}
}
