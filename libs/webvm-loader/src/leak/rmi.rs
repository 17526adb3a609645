use crate::leak::{CapabilityError, Findings, HostRuntime, RmiTarget, SweepContext};

/// Removes exported remote objects whose context loader is this loader, from both the
/// object table and the implementation table.
pub(crate) fn sweep(
	ctx: &SweepContext,
	runtime: &dyn HostRuntime,
	findings: &mut Findings,
) -> Result<Option<usize>, CapabilityError> {
	let Some(table) = runtime.rmi() else {
		return Ok(None);
	};

	let mut owned = |target: &RmiTarget| target.context_loader.as_deref() == Some(&**ctx.loader);

	let removed = table.remove_object_targets(&mut owned)?;
	for target in &removed {
		findings.error(format!(
			"Found RMI Target with stub class [{}] and value [{}]. This RMI Target has been forcibly removed to prevent a memory leak.",
			target.stub.class_name(),
			target.stub
		));
	}

	let impls = table.remove_impl_targets(&mut owned)?;
	if impls > 0 {
		findings.debug(format!("Removed {impls} RMI implementation table entries"));
	}
	Ok(Some(removed.len() + impls))
}
