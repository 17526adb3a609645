use crate::leak::{CapabilityError, Findings, HostRuntime, SweepContext, ThreadKind, ThreadRef};
use std::thread;

/// Thread groups owned by the runtime itself. Their threads are never reported.
const PLATFORM_THREAD_GROUPS: [&str; 2] = ["system", "RMI Runtime"];

const KEEP_ALIVE_TIMER: &str = "Keep-Alive-Timer";

const REQUEST_FRAME: &str = "org.apache.catalina.connector.CoyoteAdapter.";

/// A request processing thread has a container adapter frame on its stack.
fn is_request_thread(stack: &[String]) -> bool {
	stack.iter().rev().any(|frame| frame.starts_with(REQUEST_FRAME))
}

fn format_stack(stack: &[String]) -> String {
	let mut out = String::new();
	for frame in stack {
		out.push_str("\n ");
		out.push_str(frame);
	}
	out
}

/// Reports (and optionally stops) threads still using this loader as their context loader.
pub(crate) fn sweep(
	ctx: &SweepContext,
	runtime: &dyn HostRuntime,
	findings: &mut Findings,
) -> Result<Option<usize>, CapabilityError> {
	let Some(introspection) = runtime.threads() else {
		return Ok(None);
	};

	let mut handled = 0;
	let mut to_stop: Vec<ThreadRef> = vec![];
	for thread in introspection.threads()? {
		let owned = thread
			.context_loader()
			.is_some_and(|loader| *loader == **ctx.loader);
		if !owned || thread.is_current() {
			continue;
		}

		let name = thread.name();
		if thread
			.group_name()
			.is_some_and(|group| PLATFORM_THREAD_GROUPS.contains(&group.as_str()))
		{
			if ctx.config.http_client_keep_alive_thread && name == KEEP_ALIVE_TIMER {
				thread.set_context_loader(ctx.parent.cloned())?;
				findings.debug(format!(
					"Retargeted the HTTP client keep-alive thread [{name}] to the parent loader"
				));
				handled += 1;
			}
			continue;
		}

		if !thread.is_alive() {
			continue;
		}

		if thread.kind() == ThreadKind::Timer && ctx.config.stop_timer_threads {
			match thread.cancel_timer() {
				Ok(()) => findings.warn(format!(
					"The web application [{}] appears to have started a TimerThread named [{name}] via the java.util.Timer API but has failed to stop it. To prevent a memory leak, the timer (and hence the associated thread) has been forcibly canceled.",
					ctx.context_name
				)),
				Err(err) => findings.warn(format!(
					"Failed to stop the timer thread [{name}] of the web application [{}]: {err}",
					ctx.context_name
				)),
			}
			handled += 1;
			continue;
		}

		let stack = thread.stack_trace();
		if is_request_thread(&stack) {
			findings.warn(format!(
				"The web application [{}] is still processing a request that has yet to finish. This is very likely to create a memory leak. Stack trace of request processing thread [{name}]:{}",
				ctx.context_name,
				format_stack(&stack)
			));
		} else {
			findings.warn(format!(
				"The web application [{}] appears to have started a thread named [{name}] but has failed to stop it. This is very likely to create a memory leak. Stack trace of thread:{}",
				ctx.context_name,
				format_stack(&stack)
			));
		}
		handled += 1;

		if !ctx.config.stop_threads {
			continue;
		}

		let mut using_executor = false;
		if let Some(executor) = thread.executor() {
			match executor.shutdown_now() {
				Ok(dropped) => {
					findings.debug(format!("Shut down the executor of [{name}], {dropped} queued tasks dropped"));
					using_executor = true;
				}
				Err(err) => findings.warn(format!(
					"Failed to shut down the executor of thread [{name}] of the web application [{}]: {err}",
					ctx.context_name
				)),
			}
		}

		if !using_executor && !thread.is_interrupted() {
			if let Err(err) = thread.interrupt() {
				findings.warn(format!(
					"Failed to interrupt thread [{name}] of the web application [{}]: {err}",
					ctx.context_name
				));
				continue;
			}
		}
		to_stop.push(thread);
	}

	// Polls are shared by all threads: the total wait is bounded, not the wait per thread.
	let mut polls = 0;
	for thread in &to_stop {
		while thread.is_alive() && polls < ctx.config.thread_stop_max_polls {
			thread::sleep(ctx.config.poll_interval());
			polls += 1;
		}
		if thread.is_alive() {
			match thread.force_stop() {
				Ok(()) => findings.warn(format!("Thread [{}] was forcibly stopped", thread.name())),
				Err(err) => findings.error(format!(
					"Failed to stop thread [{}] of the web application [{}]: {err}",
					thread.name(),
					ctx.context_name
				)),
			}
		}
	}

	Ok(Some(handled))
}
