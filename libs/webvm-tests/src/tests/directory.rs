use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use webvm_core::Lifecycle;
use webvm_loader::{LoaderConfig, SharedLoader, WebappClassLoader};
use webvm_resources::{ContextInfo, DirResourceRoot, DirectoryRepository, ResourceUrl};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::class_bytes;

fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) -> eyre::Result<()> {
	let mut writer = ZipWriter::new(File::create(path)?);
	for (name, data) in entries {
		writer.start_file(*name, SimpleFileOptions::default())?;
		writer.write_all(data)?;
	}
	writer.finish()?;
	Ok(())
}

fn touch(path: &Path) -> eyre::Result<()> {
	let later = SystemTime::now() + Duration::from_secs(60);
	File::options().write(true).open(path)?.set_modified(later)?;
	Ok(())
}

struct Exploded {
	dir: tempfile::TempDir,
	loader: WebappClassLoader,
}

impl Exploded {
	fn new() -> eyre::Result<Exploded> {
		let dir = tempfile::tempdir()?;
		let classes = dir.path().join("WEB-INF/classes/com/acme");
		fs::create_dir_all(&classes)?;
		fs::write(classes.join("Foo.class"), class_bytes("com.acme.Foo"))?;
		fs::write(dir.path().join("WEB-INF/classes/logging.properties"), b"level=INFO")?;

		let lib = dir.path().join("WEB-INF/lib");
		fs::create_dir_all(&lib)?;
		write_jar(
			&lib.join("lib.jar"),
			&[("com/acme/Bar.class", class_bytes("com.acme.Bar"))],
		)?;
		fs::write(lib.join("README.txt"), b"not an archive")?;

		let root = DirResourceRoot::new(
			dir.path(),
			ContextInfo {
				name: "/exploded".to_string(),
				host: "localhost".to_string(),
				service: "Catalina".to_string(),
			},
		)?;
		let platform = SharedLoader::platform();
		platform.add_class("java.lang.Object", class_bytes("java.lang.Object"));
		let shared = SharedLoader::new("shared", Some(platform.clone()));
		let loader = WebappClassLoader::new(shared, platform, LoaderConfig::default());
		loader.set_resources(Arc::new(root));
		loader.start()?;
		Ok(Exploded { dir, loader })
	}

	fn path(&self, relative: &str) -> std::path::PathBuf {
		self.dir.path().join(relative)
	}
}

#[test]
fn classes_come_from_directories_and_archives() -> eyre::Result<()> {
	let app = Exploded::new()?;
	let foo = app.loader.load_class("com.acme.Foo", true)?;
	let bar = app.loader.load_class("com.acme.Bar", false)?;

	assert!(foo.is_linked());
	assert_eq!(
		foo.code_source().location,
		Some(ResourceUrl::file(&app.path("WEB-INF/classes")))
	);
	assert_eq!(
		bar.code_source().location,
		Some(ResourceUrl::file(&app.path("WEB-INF/lib/lib.jar")))
	);
	assert_eq!(
		app.loader.urls(),
		vec![
			ResourceUrl::file(&app.path("WEB-INF/classes")),
			ResourceUrl::file(&app.path("WEB-INF/lib/lib.jar")),
		]
	);
	assert!(app.loader.has_logging_config());
	Ok(())
}

#[test]
fn timestamps_on_disk_drive_modification() -> eyre::Result<()> {
	let app = Exploded::new()?;
	app.loader.load_class("com.acme.Foo", false)?;
	assert!(!app.loader.modified());

	touch(&app.path("WEB-INF/classes/com/acme/Foo.class"))?;
	assert!(app.loader.modified());
	Ok(())
}

#[test]
fn replaced_archives_are_detected() -> eyre::Result<()> {
	let app = Exploded::new()?;
	assert!(!app.loader.modified());

	touch(&app.path("WEB-INF/lib/lib.jar"))?;
	assert!(app.loader.modified());
	Ok(())
}

#[test]
fn new_archives_are_detected() -> eyre::Result<()> {
	let app = Exploded::new()?;
	write_jar(
		&app.path("WEB-INF/lib/extra.jar"),
		&[("com/acme/Baz.class", class_bytes("com.acme.Baz"))],
	)?;
	assert!(app.loader.modified());
	Ok(())
}

#[test]
fn external_repositories_are_searched_last() -> eyre::Result<()> {
	let app = Exploded::new()?;
	let external = tempfile::tempdir()?;
	fs::create_dir_all(external.path().join("com/ext"))?;
	fs::write(external.path().join("com/ext/Ext.class"), class_bytes("com.ext.Ext"))?;
	fs::create_dir_all(external.path().join("com/acme"))?;
	fs::write(external.path().join("com/acme/Foo.class"), class_bytes("com.acme.Foo"))?;
	app.loader.add_repository(Arc::new(DirectoryRepository::new(external.path())?));

	let ext = app.loader.load_class("com.ext.Ext", false)?;
	assert_eq!(
		ext.code_source().location,
		Some(ResourceUrl::file(external.path()))
	);
	let foo = app.loader.load_class("com.acme.Foo", false)?;
	assert_eq!(
		foo.code_source().location,
		Some(ResourceUrl::file(&app.path("WEB-INF/classes")))
	);
	assert_eq!(app.loader.urls().last(), Some(&ResourceUrl::file(external.path())));

	// Classes from external repositories are not tracked for changes.
	touch(&external.path().join("com/ext/Ext.class"))?;
	assert!(!app.loader.modified());
	Ok(())
}
