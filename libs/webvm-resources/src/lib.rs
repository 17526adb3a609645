//! Resource roots a web application class loader reads from.
//!
//! Paths handed to a [`WebResourceRoot`] are web application paths with a leading slash,
//! except for the class loader lookups which take class-path relative names
//! (`/com/acme/Foo.class`) and search `/WEB-INF/classes` followed by every JAR in
//! `/WEB-INF/lib`.

pub use dir::*;
pub use error::*;
pub use jar::*;
pub use memory::*;
pub use repository::*;
pub use resource::*;

mod dir;
mod error;
mod jar;
mod memory;
mod repository;
mod resource;

use std::fs::Metadata;
use std::time::UNIX_EPOCH;

pub const WEB_INF_CLASSES: &str = "/WEB-INF/classes";
pub const WEB_INF_LIB: &str = "/WEB-INF/lib";

/// Joins a directory path and a child path, keeping exactly one slash between them.
pub fn join_path(dir: &str, child: &str) -> String {
	let dir = dir.trim_end_matches('/');
	let child = child.trim_start_matches('/');
	if child.is_empty() {
		return dir.to_string();
	}
	format!("{dir}/{child}")
}

/// Modification time in milliseconds since the epoch, 0 when the platform has none.
pub(crate) fn modified_millis(metadata: &Metadata) -> u64 {
	metadata
		.modified()
		.ok()
		.and_then(|time| time.duration_since(UNIX_EPOCH).ok())
		.map(|duration| duration.as_millis() as u64)
		.unwrap_or(0)
}

/// Last path segment, ignoring a trailing slash.
pub fn file_name(path: &str) -> &str {
	let path = path.trim_end_matches('/');
	match path.rfind('/') {
		Some(idx) => &path[idx + 1..],
		None => path,
	}
}
