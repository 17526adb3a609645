//! The best-effort sweep run while a web application class loader stops, clearing
//! references the host runtime keeps to the loader's classes.
//!
//! Everything goes through a [`HostRuntime`], a set of optional capabilities. A missing
//! capability makes its sweep unavailable, a failing one makes it fail; neither stops the
//! remaining sweeps. [`ManagedRuntime`] is the in-process implementation.

pub use config::*;
pub use hosted::*;
pub use report::*;
pub use runtime::*;
pub use sweeper::*;

mod auxiliary;
mod config;
mod hosted;
mod jdbc;
mod report;
mod rmi;
mod runtime;
mod serialization;
mod sweeper;
mod thread_locals;
mod threads;
