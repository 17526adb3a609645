use crate::ClassRef;
use std::sync::{Arc, OnceLock};

/// The memo for one resource path: the modification time seen at first resolution and,
/// for class resources, the class defined from it.
#[derive(Debug)]
pub struct ResourceEntry {
	last_modified: u64,
	loaded_class: OnceLock<ClassRef>,
}

impl ResourceEntry {
	pub fn new(last_modified: u64) -> ResourceEntry {
		ResourceEntry {
			last_modified,
			loaded_class: OnceLock::new(),
		}
	}

	pub fn last_modified(&self) -> u64 {
		self.last_modified
	}

	pub fn loaded_class(&self) -> Option<&ClassRef> {
		self.loaded_class.get()
	}

	/// Stores `class` unless another definition got there first. Returns whichever class
	/// the entry holds afterwards.
	pub fn set_loaded_class(&self, class: ClassRef) -> ClassRef {
		let winner = self.loaded_class.get_or_init(|| class);
		Arc::clone(winner)
	}
}
