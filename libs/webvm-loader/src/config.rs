//! Loader configuration.
//!
//! Values are layered: built-in defaults, then a TOML file, then `WEBVM_` environment
//! variables (`__` separates nested keys, so `WEBVM_LEAK__STOP_THREADS=true` sets
//! `leak.stop_threads`).
//!
//! ```toml
//! delegate = false
//! locking = "parallel"
//! restricted_packages = ["com.acme.internal"]
//! background_delay_ms = 10000
//!
//! [[delegation]]
//! prefix = "com.shared."
//! exceptions = ["com.shared.local."]
//!
//! [leak]
//! stop_threads = true
//! thread_stop_max_polls = 50
//! ```

use crate::leak::LeakPreventionConfig;
use crate::{DelegationFilter, DelegationRule};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error(transparent)]
	Figment(#[from] figment::Error),
	#[error("configuration file {0} does not exist")]
	Missing(PathBuf),
}

/// How definitions of different class names are serialized.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockingMode {
	/// One lock per class name.
	#[default]
	Parallel,
	/// One lock for the whole loader.
	Global,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
	/// Search the parent before the local repositories for every name.
	pub delegate: bool,
	/// Whether the owning [`crate::WebappLoader`] reloads when [`crate::WebappClassLoader::modified`] reports a change.
	pub reloadable: bool,
	pub locking: LockingMode,
	pub enforce_sealing: bool,
	/// Packages a web application may not load classes from, as prefixes.
	pub restricted_packages: Vec<String>,
	/// Replaces the built-in container delegation rules when set.
	pub delegation: Option<Vec<DelegationRule>>,
	pub background_delay_ms: u64,
	pub leak: LeakPreventionConfig,
}

impl Default for LoaderConfig {
	fn default() -> Self {
		LoaderConfig {
			delegate: false,
			reloadable: false,
			locking: LockingMode::Parallel,
			enforce_sealing: true,
			restricted_packages: vec![],
			delegation: None,
			background_delay_ms: 10_000,
			leak: LeakPreventionConfig::default(),
		}
	}
}

impl LoaderConfig {
	/// Defaults overlaid with the environment.
	pub fn from_env() -> Result<LoaderConfig, ConfigError> {
		Ok(Figment::new()
			.merge(Serialized::defaults(LoaderConfig::default()))
			.merge(Env::prefixed("WEBVM_").split("__"))
			.extract()?)
	}

	/// Defaults overlaid with a TOML document. The environment is not consulted.
	pub fn from_toml_str(toml: &str) -> Result<LoaderConfig, ConfigError> {
		Ok(Figment::new()
			.merge(Serialized::defaults(LoaderConfig::default()))
			.merge(Toml::string(toml))
			.extract()?)
	}

	pub fn load_from(path: impl AsRef<Path>) -> Result<LoaderConfig, ConfigError> {
		let path = path.as_ref();
		if !path.is_file() {
			return Err(ConfigError::Missing(path.to_path_buf()));
		}
		Ok(Figment::new()
			.merge(Serialized::defaults(LoaderConfig::default()))
			.merge(Toml::file(path))
			.merge(Env::prefixed("WEBVM_").split("__"))
			.extract()?)
	}

	pub fn filter(&self) -> DelegationFilter {
		match &self.delegation {
			Some(rules) => DelegationFilter::new(rules.clone()),
			None => DelegationFilter::container_default(),
		}
	}

	/// The restricted prefix covering `package`, if any. `com.acme` covers `com.acme`
	/// and `com.acme.impl` but not `com.acmex`.
	pub fn restricted_prefix(&self, package: &str) -> Option<&str> {
		self.restricted_packages.iter().map(String::as_str).find(|prefix| {
			let prefix = prefix.trim_end_matches('.');
			!prefix.is_empty()
				&& package.starts_with(prefix)
				&& matches!(package.as_bytes().get(prefix.len()), None | Some(b'.'))
		})
	}
}
