use crate::leak::{CapabilityError, Findings, HostRuntime, SweepContext, ThreadLocalEntry, ThreadLocalKind};

/// Reports thread-local entries of live threads that pin this loader. Nothing is removed; the values
/// belong to threads the application does not own.
pub(crate) fn sweep(
	ctx: &SweepContext,
	runtime: &dyn HostRuntime,
	findings: &mut Findings,
) -> Result<Option<usize>, CapabilityError> {
	let Some(introspection) = runtime.threads() else {
		return Ok(None);
	};

	let mut leaks = 0;
	for thread in introspection.threads()? {
		if !thread.is_alive() {
			continue;
		}
		for kind in [ThreadLocalKind::Normal, ThreadLocalKind::Inheritable] {
			let Some(table) = thread.thread_locals(kind) else {
				continue;
			};
			table.expunge_stale_entries()?;
			for entry in table.entries()? {
				if check_entry(ctx, &entry, findings) {
					leaks += 1;
				}
			}
		}
	}
	Ok(Some(leaks))
}

/// Returns true for an entry whose value this loader (or a child) loaded.
fn check_entry(ctx: &SweepContext, entry: &ThreadLocalEntry, findings: &mut Findings) -> bool {
	let key_loaded = entry.key.loaded_by_or_child_of(ctx.loader);
	let value_loaded = entry
		.value
		.as_ref()
		.is_some_and(|value| value.loaded_by_or_child_of(ctx.loader));
	if !key_loaded && !value_loaded {
		return false;
	}

	let key = format!("[{}] (value [{}])", entry.key.class_name(), entry.key);
	match &entry.value {
		Some(value) if value_loaded => {
			findings.error(format!(
				"The web application [{}] created a ThreadLocal with key of type {key} and a value of type [{}] (value [{value}]) but failed to remove it when the web application was stopped. Threads are going to be renewed over time to try and avoid a probable memory leak.",
				ctx.context_name,
				value.class_name()
			));
			true
		}
		None => {
			findings.debug(format!(
				"The web application [{}] created a ThreadLocal with key of type {key}. The ThreadLocal has been correctly set to null and the key will be removed by GC.",
				ctx.context_name
			));
			false
		}
		Some(value) => {
			findings.debug(format!(
				"The web application [{}] created a ThreadLocal with key of type {key} and a value of type [{}] (value [{value}]). Since keys are only weakly held by the ThreadLocal Map this is not a memory leak.",
				ctx.context_name,
				value.class_name()
			));
			false
		}
	}
}
