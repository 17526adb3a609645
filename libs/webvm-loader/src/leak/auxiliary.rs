use crate::leak::{CapabilityError, Findings, HostRuntime, SweepContext};

pub(crate) fn sweep(
	ctx: &SweepContext,
	runtime: &dyn HostRuntime,
	findings: &mut Findings,
) -> Result<Option<usize>, CapabilityError> {
	let Some(caches) = runtime.auxiliary() else {
		return Ok(None);
	};

	let mut released = 0;
	if ctx.config.log_factory_release {
		released += caches.release_log_factory(ctx.loader)?;
	}
	released += caches.release_url_stream_handlers(ctx.loader)?;
	caches.flush_introspector()?;

	if released > 0 {
		findings.debug(format!("Released {released} auxiliary registrations"));
	}
	Ok(Some(released))
}
