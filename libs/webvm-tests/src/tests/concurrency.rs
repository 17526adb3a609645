use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use webvm_core::Lifecycle;
use webvm_loader::{
	ClassFileTransformer, ClassRef, CodeSource, IllegalClassFormat, LoaderConfig, LoaderIdentity,
	LockingMode,
};
use webvm_resources::MemoryJar;

use crate::{class_bytes, Webapp};

/// Counts the class files handed to definition.
#[derive(Default)]
struct Definitions(AtomicUsize);

impl ClassFileTransformer for Definitions {
	fn transform(
		&self,
		_: &LoaderIdentity,
		_: &str,
		_: Option<&ClassRef>,
		_: Option<&CodeSource>,
		_: &[u8],
	) -> Result<Option<Vec<u8>>, IllegalClassFormat> {
		self.0.fetch_add(1, Ordering::SeqCst);
		// Widen the window for a second definition.
		thread::yield_now();
		Ok(None)
	}
}

fn race(config: LoaderConfig, threads: usize) -> eyre::Result<(Vec<ClassRef>, usize)> {
	let webapp = Webapp::new(config);
	let definitions = Arc::new(Definitions::default());
	webapp.loader.add_transformer(definitions.clone());
	webapp.root.put_class("com.acme.Foo", class_bytes("com.acme.Foo"));
	webapp
		.root
		.add_jar(MemoryJar::new("lib.jar").with_class("com.acme.Bar", class_bytes("com.acme.Bar")));
	webapp.loader.start()?;

	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|idx| {
			let loader = webapp.loader.clone();
			let barrier = barrier.clone();
			thread::spawn(move || {
				barrier.wait();
				let name = if idx % 2 == 0 { "com.acme.Foo" } else { "com.acme.Bar" };
				loader.load_class(name, false)
			})
		})
		.collect();

	let mut classes = vec![];
	for handle in handles {
		classes.push(handle.join().expect("loader thread panicked")?);
	}
	Ok((classes, definitions.0.load(Ordering::SeqCst)))
}

fn assert_single_definition(classes: &[ClassRef]) {
	for class in classes {
		let first = classes
			.iter()
			.find(|other| other.name() == class.name())
			.unwrap();
		assert!(Arc::ptr_eq(first, class), "{} was defined twice", class.name());
	}
}

#[test]
fn parallel_loads_define_once() -> eyre::Result<()> {
	let (classes, definitions) = race(LoaderConfig::default(), 16)?;
	assert_eq!(classes.len(), 16);
	assert_single_definition(&classes);
	assert_eq!(definitions, 2);
	Ok(())
}

#[test]
fn global_lock_defines_once() -> eyre::Result<()> {
	let (classes, definitions) = race(
		LoaderConfig {
			locking: LockingMode::Global,
			..LoaderConfig::default()
		},
		8,
	)?;
	assert_single_definition(&classes);
	assert_eq!(definitions, 2);
	Ok(())
}
