use std::sync::Arc;

use webvm_core::Lifecycle;
use webvm_loader::{LoaderConfig, SharedLoader, WebappClassLoader};
use webvm_resources::MemoryResourceRoot;

#[cfg(test)]
mod tests;

/// A minimal class file: `public class <internal_name> extends <super_name>`.
pub fn class_file_extending(internal_name: &str, super_name: &str) -> Vec<u8> {
	let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 5];
	for (index, name) in [(2u8, internal_name), (4, super_name)] {
		out.push(7);
		out.extend_from_slice(&[0, index]);
		out.push(1);
		out.extend_from_slice(&(name.len() as u16).to_be_bytes());
		out.extend_from_slice(name.as_bytes());
	}
	out.extend_from_slice(&[0x00, 0x21, 0, 1, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0]);
	out
}

pub fn class_file(internal_name: &str) -> Vec<u8> {
	class_file_extending(internal_name, "java/lang/Object")
}

/// The bytes for a binary name, e.g. `com.acme.Foo`.
pub fn class_bytes(binary_name: &str) -> Vec<u8> {
	class_file(&binary_name.replace('.', "/"))
}

/// A loader hierarchy: platform, shared (the container's common loader) and one web
/// application on top.
pub struct Webapp {
	pub platform: Arc<SharedLoader>,
	pub shared: Arc<SharedLoader>,
	pub root: Arc<MemoryResourceRoot>,
	pub loader: Arc<WebappClassLoader>,
}

impl Webapp {
	/// A web application at `/app` with no classes of its own yet. The loader is not
	/// started.
	pub fn new(config: LoaderConfig) -> Webapp {
		webvm_core::init();
		let platform = SharedLoader::platform();
		for name in ["java.lang.Object", "java.lang.String", "java.lang.Thread"] {
			platform.add_class(name, class_bytes(name));
		}
		let shared = SharedLoader::new("shared", Some(platform.clone()));
		let root = Arc::new(MemoryResourceRoot::new("/app"));
		let loader = Arc::new(WebappClassLoader::new(shared.clone(), platform.clone(), config));
		loader.set_resources(root.clone());
		Webapp {
			platform,
			shared,
			root,
			loader,
		}
	}

	pub fn started(config: LoaderConfig) -> eyre::Result<Webapp> {
		let webapp = Webapp::new(config);
		webapp.loader.start()?;
		Ok(webapp)
	}
}
