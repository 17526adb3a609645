use std::error::Error;
use thiserror::Error;
use webvm_core::LifecycleState;

#[derive(Error, Debug)]
pub enum ClassLoadError {
	#[error("class {name} not found")]
	NotFound {
		name: String,
		#[source]
		cause: Option<NotFoundCause>,
	},
	#[error("security violation loading {name}: {violation}")]
	Security {
		name: String,
		violation: SecurityViolation,
	},
	#[error("illegal class format in {name}: {reason}")]
	ClassFormat { name: String, reason: String },
	#[error("linkage error for {name}: {reason}")]
	Linkage { name: String, reason: String },
	#[error("unexpected fault while loading {name}")]
	Fault {
		name: String,
		#[source]
		source: Box<dyn Error + Send + Sync>,
	},
}

impl ClassLoadError {
	pub fn not_found(name: impl Into<String>) -> ClassLoadError {
		ClassLoadError::NotFound {
			name: name.into(),
			cause: None,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, ClassLoadError::NotFound { .. })
	}

	pub fn name(&self) -> &str {
		match self {
			ClassLoadError::NotFound { name, .. }
			| ClassLoadError::Security { name, .. }
			| ClassLoadError::ClassFormat { name, .. }
			| ClassLoadError::Linkage { name, .. }
			| ClassLoadError::Fault { name, .. } => name,
		}
	}

	pub fn not_found_cause(&self) -> Option<&NotFoundCause> {
		match self {
			ClassLoadError::NotFound { cause, .. } => cause.as_ref(),
			_ => None,
		}
	}

	/// The loader was not available, or stopped while the lookup ran.
	pub fn is_illegal_state(&self) -> bool {
		matches!(self.not_found_cause(), Some(NotFoundCause::IllegalState(_)))
	}
}

/// Why a lookup that would otherwise have been attempted reported "not found".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundCause {
	#[error(transparent)]
	IllegalState(#[from] IllegalStateError),
	#[error("access to package {package} is restricted")]
	AccessDenied { package: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal access: this web application instance has been stopped already, could not load [{resource}] (state {state})")]
pub struct IllegalStateError {
	pub resource: String,
	pub state: LifecycleState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityViolation {
	#[error("package {package} is sealed")]
	Sealing { package: String },
	#[error("prohibited package name {package}")]
	ProhibitedPackage { package: String },
}

/// Reported by a [`crate::ClassFileTransformer`] that cannot make sense of its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct IllegalClassFormat(pub String);
