use crate::leak::{CapabilityError, Findings, HostRuntime, SweepContext};
use crate::ClassRef;

/// Drops cached serialization descriptors of classes from this loader or its children.
pub(crate) fn sweep(
	ctx: &SweepContext,
	runtime: &dyn HostRuntime,
	findings: &mut Findings,
) -> Result<Option<usize>, CapabilityError> {
	let Some(cache) = runtime.serialization() else {
		return Ok(None);
	};

	let removed = cache.remove_where(&mut |class: &ClassRef| class.loaded_by_or_child_of(ctx.loader))?;
	if removed > 0 {
		findings.debug(format!("Cleared {removed} serialization descriptors"));
	}
	Ok(Some(removed))
}
