use crate::{
	join_path, modified_millis, Certificate, ContextInfo, EmptyResource, JarArchive, ResourceError,
	ResourceRef, ResourceUrl, WebResource, WebResourceRoot, WEB_INF_CLASSES, WEB_INF_LIB,
};
use ahash::HashMap;
use parking_lot::RwLock;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use webvm_reader::Manifest;

/// An exploded web application on disk.
///
/// The JARs under `/WEB-INF/lib` are opened on first use and kept until the next listing
/// of that directory, which reopens archives whose timestamp changed and drops the ones
/// that are gone. Class loader lookups never rescan the directory themselves.
pub struct DirResourceRoot {
	base: PathBuf,
	context: ContextInfo,
	/// The archives of the last `/WEB-INF/lib` scan, in name order.
	jars: RwLock<Option<Vec<Arc<JarArchive>>>>,
}

type DirEntry = (String, PathBuf, Metadata);

impl DirResourceRoot {
	pub fn new(base: impl Into<PathBuf>, context: ContextInfo) -> Result<DirResourceRoot, ResourceError> {
		let base = base.into();
		let metadata = std::fs::metadata(&base).map_err(|source| ResourceError::Io {
			path: base.display().to_string(),
			source,
		})?;
		if !metadata.is_dir() {
			return Err(ResourceError::NotFound(base.display().to_string()));
		}

		Ok(DirResourceRoot {
			base,
			context,
			jars: RwLock::new(None),
		})
	}

	pub fn base(&self) -> &Path {
		&self.base
	}

	fn resolve(&self, path: &str) -> PathBuf {
		let mut out = self.base.clone();
		for segment in path.split('/') {
			match segment {
				"" | "." | ".." => {}
				segment => out.push(segment),
			}
		}
		out
	}

	fn file_resource(&self, path: &str, code_base: Option<ResourceUrl>) -> ResourceRef {
		let file = self.resolve(path);
		match std::fs::metadata(&file) {
			Ok(metadata) => Arc::new(FileResource::new(path, file, &metadata, code_base)),
			Err(_) => EmptyResource::shared(path),
		}
	}

	/// Entries of the directory at `path`, in name order.
	fn read_sorted(&self, path: &str) -> Vec<DirEntry> {
		let Ok(read_dir) = std::fs::read_dir(self.resolve(path)) else {
			return vec![];
		};
		let mut entries: Vec<DirEntry> = read_dir
			.flatten()
			.filter_map(|entry| {
				let metadata = std::fs::metadata(entry.path()).ok()?;
				Some((entry.file_name().to_string_lossy().to_string(), entry.path(), metadata))
			})
			.collect();
		entries.sort_by(|a, b| a.0.cmp(&b.0));
		entries
	}

	/// Replaces the cached archives with the JARs among `entries`. Unchanged archives are
	/// reused.
	fn refresh_jars(&self, entries: &[DirEntry]) -> Vec<Arc<JarArchive>> {
		let previous: HashMap<String, Arc<JarArchive>> = self
			.jars
			.read()
			.iter()
			.flatten()
			.map(|jar| (jar.name().to_string(), jar.clone()))
			.collect();

		let mut jars = vec![];
		for (name, path, metadata) in entries {
			if !metadata.is_file() || !name.ends_with(".jar") {
				continue;
			}
			let last_modified = modified_millis(metadata);
			if let Some(jar) = previous.get(name).filter(|jar| jar.last_modified() == last_modified) {
				jars.push(jar.clone());
				continue;
			}

			match JarArchive::open(path) {
				Ok(jar) => {
					debug!("Opened {}", path.display());
					jars.push(jar);
				}
				Err(err) => warn!("Skipping unreadable archive {}: {err}", path.display()),
			}
		}

		let dropped = previous
			.keys()
			.filter(|name| !jars.iter().any(|jar| jar.name() == name.as_str()))
			.count();
		if dropped > 0 {
			debug!("Dropped {dropped} archives no longer in {WEB_INF_LIB}");
		}
		*self.jars.write() = Some(jars.clone());
		jars
	}

	fn lib_jars(&self) -> Vec<Arc<JarArchive>> {
		if let Some(jars) = self.jars.read().as_ref() {
			return jars.clone();
		}
		self.refresh_jars(&self.read_sorted(WEB_INF_LIB))
	}

	fn classes_resource(&self, path: &str) -> ResourceRef {
		let classes = self.resolve(WEB_INF_CLASSES);
		self.file_resource(&join_path(WEB_INF_CLASSES, path), Some(ResourceUrl::file(&classes)))
	}
}

impl WebResourceRoot for DirResourceRoot {
	fn get_resource(&self, path: &str) -> ResourceRef {
		self.file_resource(path, None)
	}

	fn get_resources(&self, path: &str) -> Vec<ResourceRef> {
		let resource = self.get_resource(path);
		if resource.exists() {
			vec![resource]
		} else {
			vec![]
		}
	}

	/// Listing `/WEB-INF/lib` also refreshes the archives class loader lookups search.
	fn list_resources(&self, path: &str) -> Vec<ResourceRef> {
		let entries = self.read_sorted(path);
		if path.trim_end_matches('/') == WEB_INF_LIB {
			self.refresh_jars(&entries);
		}
		entries
			.into_iter()
			.map(|(name, file, metadata)| -> ResourceRef {
				Arc::new(FileResource::new(&join_path(path, &name), file, &metadata, None))
			})
			.collect()
	}

	fn get_class_loader_resource(&self, path: &str) -> ResourceRef {
		let resource = self.classes_resource(path);
		if resource.exists() {
			return resource;
		}

		for jar in self.lib_jars() {
			if let Some(resource) = jar.entry(path, path) {
				return resource;
			}
		}
		EmptyResource::shared(path)
	}

	fn get_class_loader_resources(&self, path: &str) -> Vec<ResourceRef> {
		let mut out = vec![];
		let resource = self.classes_resource(path);
		if resource.exists() {
			out.push(resource);
		}
		for jar in self.lib_jars() {
			if let Some(resource) = jar.entry(path, path) {
				out.push(resource);
			}
		}
		out
	}

	fn context(&self) -> ContextInfo {
		self.context.clone()
	}
}

#[derive(Debug)]
pub struct FileResource {
	path: String,
	file: PathBuf,
	directory: bool,
	readable: bool,
	last_modified: u64,
	code_base: Option<ResourceUrl>,
}

impl FileResource {
	fn new(path: &str, file: PathBuf, metadata: &Metadata, code_base: Option<ResourceUrl>) -> FileResource {
		FileResource {
			path: path.to_string(),
			directory: metadata.is_dir(),
			readable: std::fs::File::open(&file).is_ok() || metadata.is_dir(),
			last_modified: modified_millis(metadata),
			file,
			code_base,
		}
	}
}

impl WebResource for FileResource {
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
		crate::file_name(&self.path)
	}

	fn path(&self) -> &str {
		&self.path
	}

	fn last_modified(&self) -> u64 {
		self.last_modified
	}

	fn content(&self) -> Result<Vec<u8>, ResourceError> {
		if self.directory {
			return Err(ResourceError::NotReadable(self.path.clone()));
		}
		std::fs::read(&self.file).map_err(|source| ResourceError::Io {
			path: self.path.clone(),
			source,
		})
	}

	fn url(&self) -> Option<ResourceUrl> {
		Some(ResourceUrl::file(&self.file))
	}

	fn code_base(&self) -> Option<ResourceUrl> {
		self.code_base.clone()
	}

	fn certificates(&self) -> Vec<Certificate> {
		vec![]
	}

	fn manifest(&self) -> Option<Arc<Manifest>> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use zip::write::SimpleFileOptions;
	use zip::ZipWriter;

	fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
		let file = std::fs::File::create(path).unwrap();
		let mut writer = ZipWriter::new(file);
		for (name, data) in entries {
			writer.start_file(*name, SimpleFileOptions::default()).unwrap();
			writer.write_all(data).unwrap();
		}
		writer.finish().unwrap();
	}

	fn webapp() -> tempfile::TempDir {
		let dir = tempfile::tempdir().unwrap();
		let classes = dir.path().join("WEB-INF/classes/com/acme");
		std::fs::create_dir_all(&classes).unwrap();
		std::fs::write(classes.join("Foo.class"), b"foo").unwrap();
		std::fs::create_dir_all(dir.path().join("WEB-INF/lib")).unwrap();
		write_jar(
			&dir.path().join("WEB-INF/lib/app.jar"),
			&[
				("META-INF/MANIFEST.MF", &b"Manifest-Version: 1.0\nSealed: true\n"[..]),
				("com/acme/Bar.class", &b"bar"[..]),
				("com/acme/Foo.class", &b"shadowed"[..]),
			],
		);
		std::fs::write(dir.path().join("WEB-INF/lib/readme.txt"), b"not a jar").unwrap();
		dir
	}

	#[test]
	fn classes_before_jars() {
		let dir = webapp();
		let root = DirResourceRoot::new(dir.path(), ContextInfo::default()).unwrap();

		let foo = root.get_class_loader_resource("/com/acme/Foo.class");
		assert!(foo.exists());
		assert_eq!(foo.content().unwrap(), b"foo");
		assert!(foo.manifest().is_none());

		let bar = root.get_class_loader_resource("/com/acme/Bar.class");
		assert_eq!(bar.content().unwrap(), b"bar");
		assert!(bar.url().unwrap().as_str().starts_with("jar:file:"));
		assert!(bar.manifest().unwrap().is_package_sealed("com.acme"));

		assert_eq!(root.get_class_loader_resources("/com/acme/Foo.class").len(), 2);
		assert!(!root.get_class_loader_resource("/com/acme/Missing.class").exists());
	}

	#[test]
	fn lists_in_name_order() {
		let dir = webapp();
		let root = DirResourceRoot::new(dir.path(), ContextInfo::default()).unwrap();
		let names: Vec<String> = root
			.list_resources(WEB_INF_LIB)
			.iter()
			.map(|resource| resource.name().to_string())
			.collect();
		assert_eq!(names, vec!["app.jar", "readme.txt"]);

		let classes = root.get_resources(WEB_INF_CLASSES);
		assert_eq!(classes.len(), 1);
		assert!(classes[0].is_directory());
		assert!(root.get_resources("/nowhere").is_empty());
	}

	#[test]
	fn listing_lib_refreshes_archives() {
		let dir = webapp();
		let root = DirResourceRoot::new(dir.path(), ContextInfo::default()).unwrap();
		assert!(root.get_class_loader_resource("/com/acme/Bar.class").exists());

		write_jar(
			&dir.path().join("WEB-INF/lib/extra.jar"),
			&[("com/acme/Baz.class", &b"baz"[..])],
		);
		std::fs::remove_file(dir.path().join("WEB-INF/lib/app.jar")).unwrap();
		// Lookups keep using the last scan.
		assert!(root.get_class_loader_resource("/com/acme/Bar.class").exists());
		assert!(!root.get_class_loader_resource("/com/acme/Baz.class").exists());

		root.list_resources(WEB_INF_LIB);
		assert!(!root.get_class_loader_resource("/com/acme/Bar.class").exists());
		assert!(root.get_class_loader_resource("/com/acme/Baz.class").exists());
		let cached: Vec<String> = root
			.jars
			.read()
			.iter()
			.flatten()
			.map(|jar| jar.name().to_string())
			.collect();
		assert_eq!(cached, vec!["extra.jar"]);
	}

	#[test]
	fn rejects_missing_base() {
		let dir = tempfile::tempdir().unwrap();
		assert!(DirResourceRoot::new(dir.path().join("missing"), ContextInfo::default()).is_err());
	}
}
