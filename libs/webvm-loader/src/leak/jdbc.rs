use crate::leak::{CapabilityError, Findings, HostRuntime, SweepContext};

/// Deregisters JDBC drivers whose class this loader defined.
pub(crate) fn sweep(
	ctx: &SweepContext,
	runtime: &dyn HostRuntime,
	findings: &mut Findings,
) -> Result<Option<usize>, CapabilityError> {
	let Some(registry) = runtime.drivers() else {
		return Ok(None);
	};

	let mut cleared = 0;
	for driver in registry.drivers()? {
		if !driver.class.defined_by(ctx.loader) {
			continue;
		}
		registry.deregister(&driver.name)?;
		findings.warn(format!(
			"The web application [{}] registered the JDBC driver [{}] but failed to unregister it when the web application was stopped. To prevent a memory leak, the JDBC Driver has been forcibly unregistered.",
			ctx.context_name, driver.name
		));
		cleared += 1;
	}
	Ok(Some(cleared))
}
