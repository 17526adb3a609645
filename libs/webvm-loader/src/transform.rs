use crate::{ClassRef, CodeSource, IllegalClassFormat, LoaderIdentity};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{trace, warn};

/// Rewrites class-file bytes before definition.
pub trait ClassFileTransformer: Send + Sync {
	/// Returns `Ok(None)` to leave the bytes untouched.
	fn transform(
		&self,
		loader: &LoaderIdentity,
		internal_name: &str,
		existing: Option<&ClassRef>,
		domain: Option<&CodeSource>,
		bytes: &[u8],
	) -> Result<Option<Vec<u8>>, IllegalClassFormat>;

	/// Identifies the transformer in diagnostics.
	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}

pub type TransformerRef = Arc<dyn ClassFileTransformer>;

/// Registered transformers in registration order. Writers swap the whole list, so an
/// in-flight resolution keeps iterating the snapshot it started with.
#[derive(Default)]
pub struct TransformerList {
	transformers: RwLock<Arc<Vec<TransformerRef>>>,
}

impl TransformerList {
	pub fn new() -> TransformerList {
		TransformerList::default()
	}

	pub fn add(&self, transformer: TransformerRef) -> bool {
		let mut transformers = self.transformers.write();
		if transformers.iter().any(|existing| Arc::ptr_eq(existing, &transformer)) {
			warn!("Class file transformer already registered, ignoring");
			return false;
		}
		let mut next = Vec::clone(&transformers);
		next.push(transformer);
		*transformers = Arc::new(next);
		true
	}

	pub fn remove(&self, transformer: &TransformerRef) -> bool {
		let mut transformers = self.transformers.write();
		let Some(position) = transformers.iter().position(|existing| Arc::ptr_eq(existing, transformer)) else {
			return false;
		};
		let mut next = Vec::clone(&transformers);
		next.remove(position);
		*transformers = Arc::new(next);
		true
	}

	pub fn snapshot(&self) -> Arc<Vec<TransformerRef>> {
		self.transformers.read().clone()
	}

	pub fn len(&self) -> usize {
		self.transformers.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.transformers.read().is_empty()
	}

	/// Runs every transformer over `bytes`, each seeing the previous one's output.
	pub fn apply(
		&self,
		loader: &LoaderIdentity,
		internal_name: &str,
		domain: Option<&CodeSource>,
		bytes: Vec<u8>,
	) -> Result<Vec<u8>, IllegalClassFormat> {
		let snapshot = self.snapshot();
		let mut bytes = bytes;
		for transformer in snapshot.iter() {
			if let Some(transformed) = transformer.transform(loader, internal_name, None, domain, &bytes)? {
				trace!("Transformed {internal_name}: {} -> {} bytes", bytes.len(), transformed.len());
				bytes = transformed;
			}
		}
		Ok(bytes)
	}
}
