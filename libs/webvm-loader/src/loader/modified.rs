use crate::WebappClassLoader;
use tracing::{debug, info, trace};
use webvm_resources::{ResourceRef, WEB_INF_LIB};

/// An archive in `/WEB-INF/lib` the loader tracks for changes.
pub(crate) fn is_tracked_jar(jar: &ResourceRef) -> bool {
	jar.name().ends_with(".jar") && jar.is_file() && jar.can_read()
}

impl WebappClassLoader {
	/// Whether any resource this loader has handed out, or the set of archives in
	/// `/WEB-INF/lib`, changed since it was recorded. Does not modify any state, so
	/// repeated calls without an intervening change agree.
	pub fn modified(&self) -> bool {
		trace!("modified()");
		let Some(resources) = self.resources() else {
			return false;
		};

		let entries: Vec<_> = self
			.resource_entries
			.read()
			.iter()
			.map(|(path, entry)| (path.clone(), entry.last_modified()))
			.collect();
		for (path, cached) in entries {
			let last_modified = resources.get_class_loader_resource(&path).last_modified();
			if last_modified != cached {
				debug!(
					"Resource '{path}' was modified; date is now: {last_modified}, was: {cached}"
				);
				return true;
			}
		}

		let recorded = self.jar_modification_times.read().clone();
		let mut jar_count = 0;
		for jar in resources.list_resources(WEB_INF_LIB) {
			if !is_tracked_jar(&jar) {
				continue;
			}
			jar_count += 1;
			match recorded.get(jar.name()) {
				None => {
					info!("Additional JARs have been added: '{}'", jar.name());
					return true;
				}
				Some(&time) if time != jar.last_modified() => {
					info!("Additional JARs have been modified: '{}'", jar.name());
					return true;
				}
				Some(_) => {}
			}
		}

		if jar_count < recorded.len() {
			info!("Additional JARs have been removed");
			return true;
		}

		false
	}
}
