use ahash::{HashMap, HashMapExt};
use num_traits::{NumCast, PrimInt, ToPrimitive};
use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// A keyed arena. Values are never moved or replaced once inserted, so an [`Id`] stays
/// valid until the whole storage is cleared.
pub struct Storage<K: Hash + Eq + Debug, V: StorageValue> {
	lookup: HashMap<K, Id<V>>,
	values: Vec<V>,
}

#[derive(Error)]
pub enum InsertError<V: StorageValue> {
	#[error("key already present at {0:?}")]
	Duplicate(Id<V>),
	#[error("storage index space exhausted")]
	Exhausted,
}

impl<V: StorageValue> Debug for InsertError<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			InsertError::Duplicate(id) => f.debug_tuple("Duplicate").field(id).finish(),
			InsertError::Exhausted => f.write_str("Exhausted"),
		}
	}
}

impl<K: Hash + Eq + Debug, V: StorageValue> Storage<K, V> {
	pub fn new() -> Storage<K, V> {
		Storage {
			lookup: HashMap::new(),
			values: vec![],
		}
	}

	/// Inserts a value under a key that must not be present yet.
	pub fn insert(&mut self, key: K, value: V) -> Result<Id<V>, InsertError<V>> {
		if let Some(existing) = self.lookup.get(&key) {
			return Err(InsertError::Duplicate(*existing));
		}

		let idx = Id::from_index(self.values.len() + 1).ok_or(InsertError::Exhausted)?;
		self.lookup.insert(key, idx);
		self.values.push(value);
		Ok(idx)
	}

	pub fn contains_id(&self, id: Id<V>) -> bool {
		id.index().is_some_and(|idx| idx >= 1 && idx <= self.values.len())
	}

	pub fn get_id<Q: ?Sized>(&self, key: &Q) -> Option<Id<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq,
	{
		self.lookup.get(key).copied()
	}

	pub fn get_keyed<Q: ?Sized>(&self, key: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq,
	{
		let id = self.get_id(key)?;
		self.get(id)
	}

	pub fn get(&self, id: Id<V>) -> Option<&V> {
		self.values.get(id.index()?.checked_sub(1)?)
	}

	pub fn iter(&self) -> &[V] {
		self.values.as_slice()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn clear(&mut self) {
		self.lookup.clear();
		self.values.clear();
	}
}

impl<K: Hash + Eq + Debug, V: StorageValue> Default for Storage<K, V> {
	fn default() -> Self {
		Storage::new()
	}
}

/// One-based index into a [`Storage`]. Zero never names a value.
pub struct Id<V: StorageValue>(V::Idx);

impl<V: StorageValue> Id<V> {
	pub fn from_index(idx: usize) -> Option<Id<V>> {
		<V::Idx as NumCast>::from(idx).map(Id)
	}

	fn index(&self) -> Option<usize> {
		self.0.to_usize()
	}
}

impl<V: StorageValue> Clone for Id<V> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<V: StorageValue> Debug for Id<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "Id<{}>", self.0)
	}
}

impl<V: StorageValue> Copy for Id<V> {}

impl<V: StorageValue> PartialEq for Id<V> {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq(&other.0)
	}
}

impl<V: StorageValue> Eq for Id<V> {}

impl<V: StorageValue> Hash for Id<V> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.hash(state)
	}
}

pub trait StorageValue {
	type Idx: PrimInt + Hash + Display + Debug;
}

impl<V: StorageValue> StorageValue for Arc<V> {
	type Idx = V::Idx;
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Module;

	impl StorageValue for Module {
		type Idx = u16;
	}

	#[test]
	fn insert_and_lookup() {
		let mut storage: Storage<String, Module> = Storage::new();
		let a = storage.insert("a".to_string(), Module).unwrap();
		let b = storage.insert("b".to_string(), Module).unwrap();

		assert_ne!(a, b);
		assert_eq!(storage.get_id("a"), Some(a));
		assert!(storage.get(b).is_some());
		assert!(Id::<Module>::from_index(0).is_some_and(|id| storage.get(id).is_none()));
		assert_eq!(storage.len(), 2);
	}

	#[test]
	fn duplicate_keys_are_rejected() {
		let mut storage: Storage<String, Module> = Storage::new();
		let first = storage.insert("a".to_string(), Module).unwrap();

		match storage.insert("a".to_string(), Module) {
			Err(InsertError::Duplicate(existing)) => assert_eq!(existing, first),
			_ => panic!("duplicate insert accepted"),
		}
		assert_eq!(storage.len(), 1);
	}

	#[test]
	fn clear_invalidates_ids() {
		let mut storage: Storage<String, Module> = Storage::new();
		let id = storage.insert("a".to_string(), Module).unwrap();
		storage.clear();

		assert!(!storage.contains_id(id));
		assert!(storage.is_empty());
	}
}
