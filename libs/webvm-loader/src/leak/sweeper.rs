use crate::leak::{
	auxiliary, jdbc, rmi, serialization, thread_locals, threads, CapabilityError, Findings,
	HostRuntime, LeakPreventionConfig, LeakReport, SweepKind, SweepOutcome,
};
use crate::LoaderRef;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// What every sweep needs to know about the loader being stopped.
pub struct SweepContext<'a> {
	pub loader: &'a LoaderRef,
	pub parent: Option<&'a LoaderRef>,
	pub context_name: &'a str,
	pub config: &'a LeakPreventionConfig,
}

impl SweepContext<'_> {
	fn enabled(&self, sweep: SweepKind) -> bool {
		match sweep {
			SweepKind::Jdbc => self.config.clear_jdbc,
			SweepKind::Threads => self.config.check_threads,
			SweepKind::ThreadLocals => self.config.thread_locals,
			SweepKind::RmiTargets => self.config.rmi_targets,
			SweepKind::SerializationCache => self.config.object_stream_class_caches,
			SweepKind::Auxiliary => self.config.auxiliary,
		}
	}
}

type SweepFn = fn(&SweepContext, &dyn HostRuntime, &mut Findings) -> Result<Option<usize>, CapabilityError>;

fn sweep_fn(sweep: SweepKind) -> SweepFn {
	match sweep {
		SweepKind::Jdbc => jdbc::sweep,
		SweepKind::Threads => threads::sweep,
		SweepKind::ThreadLocals => thread_locals::sweep,
		SweepKind::RmiTargets => rmi::sweep,
		SweepKind::SerializationCache => serialization::sweep,
		SweepKind::Auxiliary => auxiliary::sweep,
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}

/// Runs the enabled sweeps in order. Each one is isolated: an error or a panic is logged,
/// recorded as [`SweepOutcome::Failed`] and the next sweep still runs.
pub struct LeakSweeper<'a> {
	ctx: SweepContext<'a>,
	runtime: &'a dyn HostRuntime,
}

impl<'a> LeakSweeper<'a> {
	pub fn new(ctx: SweepContext<'a>, runtime: &'a dyn HostRuntime) -> LeakSweeper<'a> {
		LeakSweeper { ctx, runtime }
	}

	pub fn run(&self) -> LeakReport {
		let context = self.ctx.context_name;
		if self.ctx.config.skip_memory_leak_checks_on_jvm_shutdown && self.runtime.is_shutting_down() {
			info!(context = %context, "Host is shutting down, skipping memory leak checks");
			return LeakReport::skipped();
		}

		let mut report = LeakReport::default();
		for sweep in SweepKind::ALL {
			let outcome = if self.ctx.enabled(sweep) {
				self.run_one(sweep, &mut report)
			} else {
				SweepOutcome::Disabled
			};
			debug!(context = %context, "Leak sweep {sweep}: {outcome:?}");
			report.outcomes.push((sweep, outcome));
		}
		report
	}

	fn run_one(&self, sweep: SweepKind, report: &mut LeakReport) -> SweepOutcome {
		let context = self.ctx.context_name;
		let run = sweep_fn(sweep);
		let result = catch_unwind(AssertUnwindSafe(|| {
			let mut findings = Findings::new(sweep, context, &mut report.findings);
			run(&self.ctx, self.runtime, &mut findings)
		}));

		match result {
			Ok(Ok(Some(actions))) => SweepOutcome::Completed { actions },
			Ok(Ok(None)) => SweepOutcome::Unavailable,
			Ok(Err(err)) => {
				warn!(context = %context, "Leak sweep {sweep} failed: {err}");
				SweepOutcome::Failed(err.to_string())
			}
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				error!(context = %context, "Leak sweep {sweep} panicked: {message}");
				SweepOutcome::Failed(message)
			}
		}
	}
}
