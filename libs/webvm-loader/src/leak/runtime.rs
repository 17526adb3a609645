use crate::{ClassRef, LoaderIdentity, LoaderRef};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
	#[error("access denied: {0}")]
	AccessDenied(String),
	#[error("not supported: {0}")]
	Unsupported(String),
	#[error("{0}")]
	Failed(String),
}

/// What the hosting runtime lets the leak sweep see and touch. Every capability is
/// optional; a runtime that cannot provide one returns `None` and the matching sweep is
/// reported as unavailable.
pub trait HostRuntime: Send + Sync {
	fn threads(&self) -> Option<&dyn ThreadIntrospection> {
		None
	}

	fn drivers(&self) -> Option<&dyn DriverRegistry> {
		None
	}

	fn rmi(&self) -> Option<&dyn RmiObjectTable> {
		None
	}

	fn serialization(&self) -> Option<&dyn SerializationCache> {
		None
	}

	fn auxiliary(&self) -> Option<&dyn AuxiliaryCaches> {
		None
	}

	/// True while the whole process is going down rather than a single application.
	fn is_shutting_down(&self) -> bool {
		false
	}
}

/// A runtime that offers nothing.
pub struct NoHostRuntime;

impl HostRuntime for NoHostRuntime {}

pub trait ThreadIntrospection: Send + Sync {
	fn threads(&self) -> Result<Vec<ThreadRef>, CapabilityError>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ThreadKind {
	Plain,
	Timer,
	PoolWorker,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ThreadLocalKind {
	Normal,
	Inheritable,
}

pub trait HostedThread: Send + Sync {
	fn id(&self) -> u64;
	fn name(&self) -> String;
	fn group_name(&self) -> Option<String>;
	fn kind(&self) -> ThreadKind;

	fn context_loader(&self) -> Option<LoaderRef>;
	fn set_context_loader(&self, loader: Option<LoaderRef>) -> Result<(), CapabilityError>;

	fn is_alive(&self) -> bool;
	/// True when called from the thread itself.
	fn is_current(&self) -> bool;
	fn is_interrupted(&self) -> bool;
	fn interrupt(&self) -> Result<(), CapabilityError>;

	/// Innermost frame first, formatted `class.method(location)`.
	fn stack_trace(&self) -> Vec<String>;

	/// Cancels a timer thread, dropping its queued tasks.
	fn cancel_timer(&self) -> Result<(), CapabilityError>;

	/// The pool this thread works for, if it can be discovered.
	fn executor(&self) -> Option<Arc<dyn HostedExecutor>>;

	fn force_stop(&self) -> Result<(), CapabilityError>;

	fn thread_locals(&self, kind: ThreadLocalKind) -> Option<Arc<dyn ThreadLocalTable>>;
}

pub type ThreadRef = Arc<dyn HostedThread>;

pub trait HostedExecutor: Send + Sync {
	/// Stops accepting work, interrupts the workers and returns how many queued tasks were
	/// dropped.
	fn shutdown_now(&self) -> Result<usize, CapabilityError>;
}

pub trait ThreadLocalTable: Send + Sync {
	/// Removes entries whose key has been collected. Returns how many were removed.
	fn expunge_stale_entries(&self) -> Result<usize, CapabilityError>;

	fn entries(&self) -> Result<Vec<ThreadLocalEntry>, CapabilityError>;
}

#[derive(Clone, Debug)]
pub struct ThreadLocalEntry {
	pub key: HostValue,
	pub value: Option<HostValue>,
}

/// An object owned by the host runtime, described well enough to tell which loader it
/// came from.
#[derive(Clone, Debug)]
pub enum HostValue {
	/// An instance of a class the platform provides.
	Platform { class: String, display: String },
	/// An instance of a loaded class.
	Instance { class: ClassRef, display: String },
	/// A class object.
	Class(ClassRef),
	/// A class loader.
	Loader(LoaderRef),
	Collection(Vec<HostValue>),
}

impl HostValue {
	pub fn platform(class: impl Into<String>, display: impl Into<String>) -> HostValue {
		HostValue::Platform {
			class: class.into(),
			display: display.into(),
		}
	}

	pub fn instance(class: ClassRef, display: impl Into<String>) -> HostValue {
		HostValue::Instance {
			class,
			display: display.into(),
		}
	}

	/// True if the value is `loader` or one of its descendants, or its class was defined by
	/// one of them. Collections match when any element does.
	pub fn loaded_by_or_child_of(&self, loader: &LoaderIdentity) -> bool {
		match self {
			HostValue::Platform { .. } => false,
			HostValue::Instance { class, .. } | HostValue::Class(class) => class.loaded_by_or_child_of(loader),
			HostValue::Loader(other) => loader.is_same_or_ancestor_of(other),
			HostValue::Collection(values) => values.iter().any(|value| value.loaded_by_or_child_of(loader)),
		}
	}

	pub fn class_name(&self) -> &str {
		match self {
			HostValue::Platform { class, .. } => class,
			HostValue::Instance { class, .. } => class.name(),
			HostValue::Class(_) => "java.lang.Class",
			HostValue::Loader(_) => "ClassLoader",
			HostValue::Collection(_) => "java.util.Collection",
		}
	}
}

impl Display for HostValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			HostValue::Platform { display, .. } | HostValue::Instance { display, .. } => f.write_str(display),
			HostValue::Class(class) => write!(f, "{class}"),
			HostValue::Loader(loader) => write!(f, "{loader}"),
			HostValue::Collection(values) => {
				f.write_str("[")?;
				for (idx, value) in values.iter().enumerate() {
					if idx > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{value}")?;
				}
				f.write_str("]")
			}
		}
	}
}

#[derive(Clone, Debug)]
pub struct RegisteredDriver {
	pub name: String,
	pub class: ClassRef,
}

pub trait DriverRegistry: Send + Sync {
	fn drivers(&self) -> Result<Vec<RegisteredDriver>, CapabilityError>;
	fn deregister(&self, name: &str) -> Result<(), CapabilityError>;
}

/// An exported remote object.
#[derive(Clone, Debug)]
pub struct RmiTarget {
	pub stub: HostValue,
	pub context_loader: Option<LoaderRef>,
}

pub trait RmiObjectTable: Send + Sync {
	/// Removes the object table targets matching `predicate` and returns them.
	fn remove_object_targets(
		&self,
		predicate: &mut dyn FnMut(&RmiTarget) -> bool,
	) -> Result<Vec<RmiTarget>, CapabilityError>;

	/// Removes the implementation table targets matching `predicate` and returns how many
	/// were removed.
	fn remove_impl_targets(&self, predicate: &mut dyn FnMut(&RmiTarget) -> bool) -> Result<usize, CapabilityError>;
}

/// The serialization descriptor caches, keyed by class.
pub trait SerializationCache: Send + Sync {
	fn remove_where(&self, predicate: &mut dyn FnMut(&ClassRef) -> bool) -> Result<usize, CapabilityError>;
}

/// Process wide registries that hold on to a loader.
pub trait AuxiliaryCaches: Send + Sync {
	/// Drops logging factories created for `loader`.
	fn release_log_factory(&self, loader: &LoaderIdentity) -> Result<usize, CapabilityError>;

	/// Drops URL stream handlers registered by `loader`.
	fn release_url_stream_handlers(&self, loader: &LoaderIdentity) -> Result<usize, CapabilityError>;

	/// Clears the bean introspection cache.
	fn flush_introspector(&self) -> Result<(), CapabilityError>;
}
