use crate::{JarArchive, ResourceError, ResourceRef, ResourceUrl, WebResource};
use std::path::PathBuf;
use std::sync::Arc;

/// A class path location consulted outside the resource root, such as a directory or an
/// archive added at runtime.
pub trait Repository: Send + Sync {
	fn url(&self) -> ResourceUrl;

	/// Looks up a class-path relative path (`/com/acme/Foo.class`).
	fn find(&self, path: &str) -> Option<ResourceRef>;
}

pub struct DirectoryRepository {
	dir: PathBuf,
}

impl DirectoryRepository {
	pub fn new(dir: impl Into<PathBuf>) -> Result<DirectoryRepository, ResourceError> {
		let dir = dir.into();
		if !dir.is_dir() {
			return Err(ResourceError::NotFound(dir.display().to_string()));
		}
		Ok(DirectoryRepository { dir })
	}
}

impl Repository for DirectoryRepository {
	fn url(&self) -> ResourceUrl {
		ResourceUrl::file(&self.dir)
	}

	fn find(&self, path: &str) -> Option<ResourceRef> {
		let mut file = self.dir.clone();
		for segment in path.split('/').filter(|s| !s.is_empty() && *s != "..") {
			file.push(segment);
		}

		let metadata = std::fs::metadata(&file).ok()?;
		if !metadata.is_file() {
			return None;
		}
		Some(Arc::new(RepositoryFile {
			path: path.to_string(),
			file,
			code_base: self.url(),
			last_modified: crate::modified_millis(&metadata),
		}))
	}
}

impl Repository for Arc<JarArchive> {
	fn url(&self) -> ResourceUrl {
		JarArchive::url(self).clone()
	}

	fn find(&self, path: &str) -> Option<ResourceRef> {
		self.entry(path, path)
	}
}

#[derive(Debug)]
struct RepositoryFile {
	path: String,
	file: PathBuf,
	code_base: ResourceUrl,
	last_modified: u64,
}

impl WebResource for RepositoryFile {
	fn exists(&self) -> bool {
		true
	}

	fn is_file(&self) -> bool {
		true
	}

	fn is_directory(&self) -> bool {
		false
	}

	fn can_read(&self) -> bool {
		true
	}

	fn name(&self) -> &str {
		crate::file_name(&self.path)
	}

	fn path(&self) -> &str {
		&self.path
	}

	fn last_modified(&self) -> u64 {
		self.last_modified
	}

	fn content(&self) -> Result<Vec<u8>, ResourceError> {
		std::fs::read(&self.file).map_err(|source| ResourceError::Io {
			path: self.path.clone(),
			source,
		})
	}

	fn url(&self) -> Option<ResourceUrl> {
		Some(ResourceUrl::file(&self.file))
	}

	fn code_base(&self) -> Option<ResourceUrl> {
		Some(self.code_base.clone())
	}

	fn certificates(&self) -> Vec<crate::Certificate> {
		vec![]
	}

	fn manifest(&self) -> Option<Arc<webvm_reader::Manifest>> {
		None
	}
}
