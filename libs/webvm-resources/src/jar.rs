use crate::{Certificate, ResourceError, ResourceRef, ResourceUrl, WebResource};
use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use webvm_reader::Manifest;
use zip::ZipArchive;

const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

struct JarEntry {
	index: usize,
	directory: bool,
}

/// A JAR held in memory with a name index, so lookups never scan the central directory.
pub struct JarArchive {
	name: String,
	url: ResourceUrl,
	last_modified: u64,
	lookup: HashMap<String, JarEntry>,
	manifest: Option<Arc<Manifest>>,
	archive: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
}

impl JarArchive {
	pub fn new(
		name: impl Into<String>,
		url: ResourceUrl,
		last_modified: u64,
		data: Vec<u8>,
	) -> Result<Arc<JarArchive>, ResourceError> {
		let name = name.into();
		let broken = |source| ResourceError::Archive {
			path: name.clone(),
			source,
		};

		let mut archive = ZipArchive::new(Cursor::new(data)).map_err(broken)?;
		let mut lookup = HashMap::new();
		for index in 0..archive.len() {
			let file = archive.by_index(index).map_err(broken)?;
			let directory = file.is_dir();
			let entry_name = file.name().trim_end_matches('/').to_string();
			lookup.insert(entry_name, JarEntry { index, directory });
		}

		let manifest = match lookup.get(MANIFEST_NAME) {
			Some(entry) => {
				let mut file = archive.by_index(entry.index).map_err(broken)?;
				let mut data = Vec::with_capacity(file.size() as usize);
				file.read_to_end(&mut data).map_err(|source| ResourceError::Io {
					path: format!("{name}!/{MANIFEST_NAME}"),
					source,
				})?;
				match Manifest::read(&data) {
					Ok(manifest) => Some(Arc::new(manifest)),
					Err(err) => {
						warn!("Ignoring unreadable manifest in {name}: {err}");
						None
					}
				}
			}
			None => None,
		};

		debug!("Indexed {} entries of {name}", lookup.len());
		Ok(Arc::new(JarArchive {
			name,
			url,
			last_modified,
			lookup,
			manifest,
			archive: Mutex::new(archive),
		}))
	}

	pub fn open(path: &Path) -> Result<Arc<JarArchive>, ResourceError> {
		let display = path.display().to_string();
		let io = |source| ResourceError::Io {
			path: display.clone(),
			source,
		};
		let data = std::fs::read(path).map_err(io)?;
		let last_modified = crate::modified_millis(&std::fs::metadata(path).map_err(io)?);
		let name = crate::file_name(&display).to_string();
		JarArchive::new(name, ResourceUrl::file(path), last_modified, data)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn url(&self) -> &ResourceUrl {
		&self.url
	}

	pub fn last_modified(&self) -> u64 {
		self.last_modified
	}

	pub fn manifest(&self) -> Option<Arc<Manifest>> {
		self.manifest.clone()
	}

	pub fn contains(&self, entry: &str) -> bool {
		self.lookup.contains_key(entry.trim_matches('/'))
	}

	/// Resource for `entry` (a class-path relative name, leading slash optional).
	pub fn entry(self: &Arc<Self>, entry: &str, lookup_path: &str) -> Option<ResourceRef> {
		let key = entry.trim_matches('/');
		let found = self.lookup.get(key)?;
		Some(Arc::new(JarEntryResource {
			jar: self.clone(),
			index: found.index,
			directory: found.directory,
			entry: key.to_string(),
			path: lookup_path.to_string(),
		}))
	}

	fn read(&self, index: usize) -> Result<Vec<u8>, ResourceError> {
		let mut guard = self.archive.lock();
		let mut file = guard.by_index(index).map_err(|source| ResourceError::Archive {
			path: self.name.clone(),
			source,
		})?;

		let mut data = Vec::with_capacity(file.size() as usize);
		file.read_to_end(&mut data).map_err(|source| ResourceError::Io {
			path: self.name.clone(),
			source,
		})?;
		Ok(data)
	}
}

impl Debug for JarArchive {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JarArchive")
			.field("name", &self.name)
			.field("entries", &self.lookup.len())
			.finish()
	}
}

#[derive(Debug)]
pub struct JarEntryResource {
	jar: Arc<JarArchive>,
	index: usize,
	directory: bool,
	entry: String,
	path: String,
}

impl WebResource for JarEntryResource {
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
		true
	}

	fn name(&self) -> &str {
		crate::file_name(&self.entry)
	}

	fn path(&self) -> &str {
		&self.path
	}

	fn last_modified(&self) -> u64 {
		self.jar.last_modified
	}

	fn content(&self) -> Result<Vec<u8>, ResourceError> {
		if self.directory {
			return Err(ResourceError::NotReadable(self.path.clone()));
		}
		self.jar.read(self.index)
	}

	fn url(&self) -> Option<ResourceUrl> {
		Some(ResourceUrl::jar_entry(&self.jar.url, &self.entry))
	}

	fn code_base(&self) -> Option<ResourceUrl> {
		Some(self.jar.url.clone())
	}

	fn certificates(&self) -> Vec<Certificate> {
		vec![]
	}

	fn manifest(&self) -> Option<Arc<Manifest>> {
		self.jar.manifest()
	}
}
