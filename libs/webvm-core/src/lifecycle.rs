use std::fmt::{Display, Formatter};
use thiserror::Error;

/// The states a lifecycle-managed component moves through.
///
/// `STARTING`, `STARTED` and `STOPPING_PREP` are *available*: a component may serve
/// requests while in them. Leak mitigation runs during `STOPPING_PREP`, which is why that
/// window is still available.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LifecycleState {
	New,
	Initializing,
	Initialized,
	StartingPrep,
	Starting,
	Started,
	StoppingPrep,
	Stopping,
	Stopped,
	Destroying,
	Destroyed,
	Failed,
}

impl LifecycleState {
	pub fn is_available(&self) -> bool {
		matches!(
			self,
			LifecycleState::Starting | LifecycleState::Started | LifecycleState::StoppingPrep
		)
	}

	pub fn name(&self) -> &'static str {
		match self {
			LifecycleState::New => "NEW",
			LifecycleState::Initializing => "INITIALIZING",
			LifecycleState::Initialized => "INITIALIZED",
			LifecycleState::StartingPrep => "STARTING_PREP",
			LifecycleState::Starting => "STARTING",
			LifecycleState::Started => "STARTED",
			LifecycleState::StoppingPrep => "STOPPING_PREP",
			LifecycleState::Stopping => "STOPPING",
			LifecycleState::Stopped => "STOPPED",
			LifecycleState::Destroying => "DESTROYING",
			LifecycleState::Destroyed => "DESTROYED",
			LifecycleState::Failed => "FAILED",
		}
	}
}

impl Display for LifecycleState {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Error, Debug)]
pub enum LifecycleError {
	#[error("cannot {operation} a component in state {state}")]
	InvalidTransition {
		operation: &'static str,
		state: LifecycleState,
	},
	#[error("failed to {operation} {component}: {reason}")]
	Failed {
		operation: &'static str,
		component: String,
		reason: String,
	},
}

impl LifecycleError {
	pub fn invalid(operation: &'static str, state: LifecycleState) -> LifecycleError {
		LifecycleError::InvalidTransition { operation, state }
	}
}

/// The container-facing lifecycle contract.
///
/// `init -> start -> stop -> destroy`. Implementations must leave a detectable state
/// (usually [`LifecycleState::Failed`]) when a transition fails halfway.
pub trait Lifecycle {
	fn init(&self) -> Result<(), LifecycleError>;
	fn start(&self) -> Result<(), LifecycleError>;
	fn stop(&self) -> Result<(), LifecycleError>;
	fn destroy(&self) -> Result<(), LifecycleError>;
	fn state(&self) -> LifecycleState;

	fn state_name(&self) -> &'static str {
		self.state().name()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn availability_window() {
		let available: Vec<_> = [
			LifecycleState::New,
			LifecycleState::Initializing,
			LifecycleState::Initialized,
			LifecycleState::StartingPrep,
			LifecycleState::Starting,
			LifecycleState::Started,
			LifecycleState::StoppingPrep,
			LifecycleState::Stopping,
			LifecycleState::Stopped,
			LifecycleState::Destroying,
			LifecycleState::Destroyed,
			LifecycleState::Failed,
		]
		.into_iter()
		.filter(LifecycleState::is_available)
		.collect();

		assert_eq!(
			available,
			vec![
				LifecycleState::Starting,
				LifecycleState::Started,
				LifecycleState::StoppingPrep
			]
		);
	}

	#[test]
	fn display_uses_container_names() {
		assert_eq!(LifecycleState::StoppingPrep.to_string(), "STOPPING_PREP");
		assert_eq!(
			LifecycleError::invalid("start", LifecycleState::Destroyed).to_string(),
			"cannot start a component in state DESTROYED"
		);
	}
}
