//! The per web application class loader: tiered delegation, memoized definition,
//! modification tracking, lifecycle gating and the shutdown leak sweep.

pub use class::*;
pub use config::*;
pub use delegation::*;
pub use entry::*;
pub use error::*;
pub use loader::*;
pub use locks::*;
pub use package::*;
pub use parent::*;
pub use transform::*;
pub use webapp_loader::*;

mod class;
mod config;
mod delegation;
mod entry;
mod error;
pub mod leak;
mod loader;
mod locks;
mod package;
mod parent;
#[cfg(test)]
mod testing;
mod transform;
mod webapp_loader;
