use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use webvm_core::Lifecycle;
use webvm_loader::{
	ClassFileTransformer, ClassLoadError, ClassRef, CodeSource, IllegalClassFormat, LoaderConfig,
	LoaderIdentity, TransformerRef,
};

use crate::{class_bytes, Webapp};

/// Counts what it sees and leaves the bytes alone.
#[derive(Default)]
struct Recorder {
	calls: AtomicUsize,
	located: AtomicUsize,
}

impl ClassFileTransformer for Recorder {
	fn transform(
		&self,
		_: &LoaderIdentity,
		_: &str,
		_: Option<&ClassRef>,
		domain: Option<&CodeSource>,
		_: &[u8],
	) -> Result<Option<Vec<u8>>, IllegalClassFormat> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if domain.is_some_and(|domain| domain.location.is_some()) {
			self.located.fetch_add(1, Ordering::SeqCst);
		}
		Ok(None)
	}
}

/// Replaces the class file of one internal name.
struct Swap {
	internal_name: &'static str,
	replacement: Vec<u8>,
}

impl ClassFileTransformer for Swap {
	fn transform(
		&self,
		_: &LoaderIdentity,
		internal_name: &str,
		_: Option<&ClassRef>,
		_: Option<&CodeSource>,
		_: &[u8],
	) -> Result<Option<Vec<u8>>, IllegalClassFormat> {
		Ok((internal_name == self.internal_name).then(|| self.replacement.clone()))
	}
}

struct Reject;

impl ClassFileTransformer for Reject {
	fn transform(
		&self,
		_: &LoaderIdentity,
		internal_name: &str,
		_: Option<&ClassRef>,
		_: Option<&CodeSource>,
		_: &[u8],
	) -> Result<Option<Vec<u8>>, IllegalClassFormat> {
		Err(IllegalClassFormat(format!("cannot instrument {internal_name}")))
	}
}

#[test]
fn transformers_see_local_definitions() -> eyre::Result<()> {
	let webapp = Webapp::new(LoaderConfig::default());
	webapp.root.put_class("com.acme.Foo", class_bytes("com.acme.Foo"));
	webapp.shared.add_class("com.lib.Util", class_bytes("com.lib.Util"));
	let recorder = Arc::new(Recorder::default());
	assert!(webapp.loader.add_transformer(recorder.clone()));
	assert!(!webapp.loader.add_transformer(recorder.clone()));
	webapp.loader.start()?;

	webapp.loader.load_class("com.acme.Foo", false)?;
	webapp.loader.load_class("com.acme.Foo", false)?;
	webapp.loader.load_class("com.lib.Util", false)?;
	assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
	assert_eq!(recorder.located.load(Ordering::SeqCst), 1);

	let registered: TransformerRef = recorder.clone();
	assert!(webapp.loader.remove_transformer(&registered));
	assert!(webapp.loader.transformers().is_empty());
	Ok(())
}

#[test]
fn transformed_bytes_are_defined() -> eyre::Result<()> {
	let webapp = Webapp::new(LoaderConfig::default());
	webapp.root.put_class("com.acme.Foo", class_bytes("com.acme.Foo"));
	webapp.loader.add_transformer(Arc::new(Swap {
		internal_name: "com/acme/Foo",
		replacement: crate::class_file_extending("com/acme/Foo", "com/acme/Base"),
	}));
	webapp.loader.start()?;

	let foo = webapp.loader.load_class("com.acme.Foo", false)?;
	assert_eq!(foo.super_name(), Some("com.acme.Base"));

	let stream = webapp.loader.get_resource_as_stream("com/acme/Foo.class").unwrap();
	assert_eq!(stream, crate::class_file_extending("com/acme/Foo", "com/acme/Base"));
	Ok(())
}

#[test]
fn failures_are_class_format_errors() -> eyre::Result<()> {
	let webapp = Webapp::new(LoaderConfig::default());
	webapp.root.put_class("com.acme.Foo", class_bytes("com.acme.Foo"));
	webapp.root.put("/WEB-INF/classes/app.properties", b"a=1".to_vec());
	webapp.loader.add_transformer(Arc::new(Reject));
	webapp.loader.start()?;

	match webapp.loader.load_class("com.acme.Foo", false) {
		Err(ClassLoadError::ClassFormat { reason, .. }) => assert_eq!(reason, "cannot instrument com/acme/Foo"),
		other => panic!("unexpected {other:?}"),
	}
	assert!(webapp.loader.get_resource_as_stream("com/acme/Foo.class").is_none());
	// Only class files are transformed.
	assert_eq!(
		webapp.loader.get_resource_as_stream("app.properties"),
		Some(b"a=1".to_vec())
	);
	Ok(())
}

#[test]
fn copies_drop_transformers() -> eyre::Result<()> {
	let webapp = Webapp::new(LoaderConfig::default());
	webapp.root.put_class("com.acme.Foo", class_bytes("com.acme.Foo"));
	webapp.loader.add_transformer(Arc::new(Reject));
	webapp.loader.start()?;

	let copy = webapp.loader.copy_without_transformers();
	copy.start()?;
	assert!(copy.load_class("com.acme.Foo", false).is_ok());
	assert!(webapp.loader.to_string().contains("Class file transformers"));
	assert!(!copy.to_string().contains("Class file transformers"));
	Ok(())
}
