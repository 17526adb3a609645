use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};
use webvm_core::{
	internal_to_binary_name, package_name, ClassAccessFlags, Id, InsertError, Storage,
	StorageValue,
};
use webvm_reader::{ClassHeader, ReaderError};
use webvm_resources::{Certificate, ResourceUrl};

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a class loader, shared by every class it defines. Loaders form a tree
/// through their parents.
pub struct LoaderIdentity {
	id: u64,
	name: String,
	parent: Option<LoaderRef>,
}

pub type LoaderRef = Arc<LoaderIdentity>;

impl LoaderIdentity {
	pub fn new(name: impl Into<String>, parent: Option<LoaderRef>) -> LoaderRef {
		Arc::new(LoaderIdentity {
			id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
			name: name.into(),
			parent,
		})
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn parent(&self) -> Option<&LoaderRef> {
		self.parent.as_ref()
	}

	/// True if `other` is this loader or has it somewhere up its parent chain.
	pub fn is_same_or_ancestor_of(&self, other: &LoaderIdentity) -> bool {
		let mut current = Some(other);
		while let Some(loader) = current {
			if loader.id == self.id {
				return true;
			}
			current = loader.parent.as_deref();
		}
		false
	}
}

impl PartialEq for LoaderIdentity {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for LoaderIdentity {}

impl Debug for LoaderIdentity {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{}", self.name, self.id)
	}
}

impl Display for LoaderIdentity {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}@{}", self.name, self.id)
	}
}

/// Where a class came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeSource {
	pub location: Option<ResourceUrl>,
	pub certificates: Vec<Certificate>,
}

/// A defined class. Immutable apart from the link flag; identity is the `Arc`.
#[derive(Debug)]
pub struct Class {
	id: Id<ClassRef>,
	name: String,
	loader: LoaderRef,
	super_name: Option<String>,
	interfaces: Vec<String>,
	access_flags: ClassAccessFlags,
	version: (u16, u16),
	code_source: CodeSource,
	linked: AtomicBool,
}

pub type ClassRef = Arc<Class>;

impl StorageValue for Class {
	type Idx = u32;
}

impl Class {
	pub fn id(&self) -> Id<ClassRef> {
		self.id
	}

	/// Binary name, e.g. `com.acme.Foo$Inner`.
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn loader(&self) -> &LoaderRef {
		&self.loader
	}

	pub fn package_name(&self) -> Option<&str> {
		package_name(&self.name)
	}

	pub fn super_name(&self) -> Option<&str> {
		self.super_name.as_deref()
	}

	pub fn interfaces(&self) -> &[String] {
		&self.interfaces
	}

	pub fn access_flags(&self) -> ClassAccessFlags {
		self.access_flags
	}

	pub fn is_interface(&self) -> bool {
		self.access_flags.contains(ClassAccessFlags::INTERFACE)
	}

	/// `(major, minor)` class file version.
	pub fn version(&self) -> (u16, u16) {
		self.version
	}

	pub fn code_source(&self) -> &CodeSource {
		&self.code_source
	}

	pub fn is_linked(&self) -> bool {
		self.linked.load(Ordering::Acquire)
	}

	/// Marks the class linked. Returns `false` if it already was.
	pub fn link(&self) -> bool {
		!self.linked.swap(true, Ordering::AcqRel)
	}

	pub fn defined_by(&self, loader: &LoaderIdentity) -> bool {
		*self.loader == *loader
	}

	/// Defined by `loader` or by one of its descendants.
	pub fn loaded_by_or_child_of(&self, loader: &LoaderIdentity) -> bool {
		loader.is_same_or_ancestor_of(&self.loader)
	}
}

impl Display for Class {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		if self.is_interface() {
			write!(f, "interface {}", self.name)
		} else {
			write!(f, "class {}", self.name)
		}
	}
}

#[derive(Error, Debug)]
pub enum DefineError {
	#[error("bad class file")]
	Format(#[from] ReaderError),
	#[error("wrong name: expected {expected}, class file declares {found}")]
	WrongName { expected: String, found: String },
	#[error("prohibited package name {package}")]
	Prohibited { package: String },
	#[error("duplicate class definition for {}", .0.name())]
	Duplicate(ClassRef),
	#[error("too many classes for one loader")]
	Exhausted,
}

/// Every class one loader has defined, keyed by binary name. A name can only ever be
/// defined once per arena.
pub struct ClassArena {
	loader: LoaderRef,
	classes: Storage<String, ClassRef>,
	trusted: bool,
}

impl ClassArena {
	pub fn new(loader: LoaderRef) -> ClassArena {
		ClassArena {
			loader,
			classes: Storage::new(),
			trusted: false,
		}
	}

	/// An arena for the platform loader, which may define `java.*` classes.
	pub fn trusted(loader: LoaderRef) -> ClassArena {
		ClassArena {
			loader,
			classes: Storage::new(),
			trusted: true,
		}
	}

	pub fn loader(&self) -> &LoaderRef {
		&self.loader
	}

	pub fn find(&self, name: &str) -> Option<ClassRef> {
		self.classes.get_keyed(name).cloned()
	}

	pub fn get(&self, id: Id<ClassRef>) -> Option<&ClassRef> {
		self.classes.get(id)
	}

	pub fn define(&mut self, name: &str, data: &[u8], code_source: CodeSource) -> Result<ClassRef, DefineError> {
		if let Some(existing) = self.find(name) {
			return Err(DefineError::Duplicate(existing));
		}
		if !self.trusted && name.starts_with("java.") {
			return Err(DefineError::Prohibited {
				package: package_name(name).unwrap_or(name).to_string(),
			});
		}

		let header = ClassHeader::read(data)?;
		let declared = internal_to_binary_name(header.this_name());
		if declared != name {
			return Err(DefineError::WrongName {
				expected: name.to_string(),
				found: declared,
			});
		}
		trace!("Defining {name} version {}.{}", header.major_version, header.minor_version);

		let id = Id::from_index(self.classes.len() + 1).ok_or(DefineError::Exhausted)?;
		let class = Arc::new(Class {
			id,
			name: name.to_string(),
			loader: self.loader.clone(),
			super_name: header.super_name().map(internal_to_binary_name),
			interfaces: header.interface_names().map(internal_to_binary_name).collect(),
			access_flags: header.access_flags,
			version: (header.major_version, header.minor_version),
			code_source,
			linked: AtomicBool::new(false),
		});

		match self.classes.insert(name.to_string(), class.clone()) {
			Ok(_) => {
				debug!("Defined {class} in {}", self.loader);
				Ok(class)
			}
			Err(InsertError::Duplicate(id)) => match self.classes.get(id) {
				Some(existing) => Err(DefineError::Duplicate(existing.clone())),
				None => Err(DefineError::Exhausted),
			},
			Err(InsertError::Exhausted) => Err(DefineError::Exhausted),
		}
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ClassRef> {
		self.classes.iter().iter()
	}

	pub fn clear(&mut self) {
		self.classes.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::class_file;

	#[test]
	fn ancestry() {
		let root = LoaderIdentity::new("root", None);
		let child = LoaderIdentity::new("child", Some(root.clone()));
		let other = LoaderIdentity::new("other", None);

		assert!(root.is_same_or_ancestor_of(&child));
		assert!(child.is_same_or_ancestor_of(&child));
		assert!(!child.is_same_or_ancestor_of(&root));
		assert!(!other.is_same_or_ancestor_of(&child));
	}

	#[test]
	fn define_once() {
		let loader = LoaderIdentity::new("test", None);
		let mut arena = ClassArena::new(loader.clone());
		let class = arena
			.define("com.acme.Foo", &class_file("com/acme/Foo"), CodeSource::default())
			.unwrap();

		assert_eq!(class.name(), "com.acme.Foo");
		assert_eq!(class.super_name(), Some("java.lang.Object"));
		assert_eq!(class.package_name(), Some("com.acme"));
		assert!(class.defined_by(&loader));
		assert_eq!(arena.get(class.id()).map(|c| c.name()), Some("com.acme.Foo"));

		match arena.define("com.acme.Foo", &class_file("com/acme/Foo"), CodeSource::default()) {
			Err(DefineError::Duplicate(existing)) => assert!(Arc::ptr_eq(&existing, &class)),
			other => panic!("unexpected {other:?}"),
		}
		assert_eq!(arena.len(), 1);
	}

	#[test]
	fn rejects_bad_input() {
		let mut arena = ClassArena::new(LoaderIdentity::new("test", None));
		assert!(matches!(
			arena.define("com.acme.Foo", &class_file("com/acme/Bar"), CodeSource::default()),
			Err(DefineError::WrongName { .. })
		));
		assert!(matches!(
			arena.define("com.acme.Foo", b"garbage", CodeSource::default()),
			Err(DefineError::Format(_))
		));
		assert!(matches!(
			arena.define("java.lang.String", &class_file("java/lang/String"), CodeSource::default()),
			Err(DefineError::Prohibited { .. })
		));
		assert!(arena.is_empty());

		let mut trusted = ClassArena::trusted(LoaderIdentity::new("platform", None));
		assert!(trusted
			.define("java.lang.String", &class_file("java/lang/String"), CodeSource::default())
			.is_ok());
	}

	#[test]
	fn link_is_reported_once() {
		let mut arena = ClassArena::new(LoaderIdentity::new("test", None));
		let class = arena.define("A", &class_file("A"), CodeSource::default()).unwrap();
		assert!(!class.is_linked());
		assert!(class.link());
		assert!(!class.link());
		assert!(class.is_linked());
	}
}
