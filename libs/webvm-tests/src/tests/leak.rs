use std::sync::Arc;
use std::time::Duration;

use webvm_core::{Lifecycle, LifecycleState};
use webvm_loader::leak::{
	Capability, DriverRegistry, HostRuntime, HostValue, HostedThread, LeakPreventionConfig,
	LeakReport, ManagedRuntime, Severity, SweepKind, SweepOutcome, ThreadKind, ThreadLocalKind,
	ThreadSpec,
};
use webvm_loader::{DelegateLoader, LoaderConfig};

use crate::{class_bytes, Webapp};

fn webapp(leak: LeakPreventionConfig, runtime: Arc<dyn HostRuntime>) -> eyre::Result<Webapp> {
	let webapp = Webapp::new(LoaderConfig {
		leak,
		..LoaderConfig::default()
	});
	webapp.root.put_class("com.acme.Driver", class_bytes("com.acme.Driver"));
	webapp.root.put_class("com.acme.Session", class_bytes("com.acme.Session"));
	webapp.shared.add_class("com.lib.Pool", class_bytes("com.lib.Pool"));
	webapp.loader.set_host_runtime(runtime);
	webapp.loader.start()?;
	Ok(webapp)
}

fn stop(webapp: &Webapp) -> eyre::Result<LeakReport> {
	webapp.loader.stop()?;
	assert_eq!(webapp.loader.state(), LifecycleState::Stopped);
	webapp
		.loader
		.last_leak_report()
		.ok_or_else(|| eyre::eyre!("no leak report"))
}

#[test]
fn sweeps_clear_what_the_application_left_behind() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(LeakPreventionConfig::default(), runtime.clone())?;
	let identity = webapp.loader.identity().clone();
	let driver = webapp.loader.load_class("com.acme.Driver", false)?;
	let session = webapp.loader.load_class("com.acme.Session", false)?;
	let pool = webapp.loader.load_class("com.lib.Pool", false)?;

	runtime.register_driver("acme", driver);
	runtime.register_driver("pool", pool);
	let worker = runtime.spawn(
		ThreadSpec::new("acme-worker")
			.context_loader(identity.clone())
			.stack(["com.acme.Worker.run(Worker.java:10)"]),
		|control| control.wait_for_stop(),
	)?;
	let main = runtime.attach_current(ThreadSpec::new("main"));
	main.locals(ThreadLocalKind::Normal).set(
		HostValue::platform("java.lang.ThreadLocal", "session"),
		Some(HostValue::instance(session.clone(), "session#1")),
	);
	runtime.export_object(HostValue::platform("com.sun.Stub", "stub"), Some(identity.clone()));
	runtime.export_impl(HostValue::platform("com.sun.Stub", "stub"), Some(identity.clone()));
	runtime.cache_descriptor(session);
	runtime.register_log_factory(identity.clone());
	runtime.register_url_handler("acme", identity);

	let report = stop(&webapp)?;
	assert!(!report.skipped);
	for sweep in SweepKind::ALL {
		assert!(
			matches!(report.outcome(sweep), Some(SweepOutcome::Completed { .. })),
			"{sweep}: {:?}",
			report.outcome(sweep)
		);
	}
	assert_eq!(runtime.registered_drivers(), vec!["pool".to_string()]);
	assert_eq!(report.count(SweepKind::Jdbc, Severity::Warn), 1);
	assert_eq!(report.count(SweepKind::Threads, Severity::Warn), 1);
	assert_eq!(report.count(SweepKind::ThreadLocals, Severity::Error), 1);
	assert_eq!(report.count(SweepKind::RmiTargets, Severity::Error), 1);
	assert!(report.has_errors());
	assert_eq!(runtime.rmi_target_counts(), (0, 0));
	assert_eq!(runtime.descriptor_count(), 0);
	assert_eq!(runtime.auxiliary_counts(), (0, 0, 0));

	// Threads are only reported by default.
	assert!(worker.is_alive());
	assert!(!worker.is_interrupted());
	worker.interrupt()?;
	assert!(worker.join());
	Ok(())
}

#[test]
fn finished_threads_are_not_swept() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(LeakPreventionConfig::default(), runtime.clone())?;
	let session = webapp.loader.load_class("com.acme.Session", false)?;

	let finished = runtime.spawn(ThreadSpec::new("finished"), |_| {})?;
	finished.locals(ThreadLocalKind::Normal).set(
		HostValue::platform("java.lang.ThreadLocal", "session"),
		Some(HostValue::instance(session, "session#1")),
	);
	assert!(finished.join());
	assert!(!finished.is_alive());

	let report = stop(&webapp)?;
	assert_eq!(
		report.outcome(SweepKind::ThreadLocals),
		Some(&SweepOutcome::Completed { actions: 0 })
	);
	assert_eq!(report.count(SweepKind::ThreadLocals, Severity::Error), 0);
	assert!(runtime.managed_threads().is_empty());
	Ok(())
}

#[test]
fn threads_can_be_stopped() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(
		LeakPreventionConfig {
			stop_threads: true,
			stop_timer_threads: true,
			thread_stop_poll_interval_ms: 5,
			..LeakPreventionConfig::default()
		},
		runtime.clone(),
	)?;
	let identity = webapp.loader.identity().clone();

	let worker = runtime.spawn(
		ThreadSpec::new("acme-worker").context_loader(identity.clone()),
		|control| control.wait_for_stop(),
	)?;
	let timer = runtime.spawn(
		ThreadSpec::new("Timer-0")
			.context_loader(identity.clone())
			.kind(ThreadKind::Timer),
		|control| while !control.wait(Duration::from_millis(5)) {},
	)?;
	let pool = runtime.executor(ThreadSpec::new("acme-pool").context_loader(identity), 2)?;

	let report = stop(&webapp)?;
	assert!(matches!(
		report.outcome(SweepKind::Threads),
		Some(SweepOutcome::Completed { actions: 4 })
	));
	assert!(worker.join());
	assert!(worker.is_interrupted());
	assert!(timer.join());
	assert!(timer.is_timer_cancelled());
	assert!(pool.is_shutdown());
	for thread in pool.workers() {
		assert!(thread.join());
	}
	Ok(())
}

#[test]
fn keep_alive_threads_move_to_the_parent() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(LeakPreventionConfig::default(), runtime.clone())?;
	let keep_alive = runtime.spawn(
		ThreadSpec::new("Keep-Alive-Timer")
			.group("system")
			.context_loader(webapp.loader.identity().clone()),
		|control| control.wait_for_stop(),
	)?;

	let report = stop(&webapp)?;
	assert_eq!(report.count(SweepKind::Threads, Severity::Warn), 0);
	assert_eq!(
		keep_alive.context_loader().map(|loader| loader.id()),
		Some(webapp.shared.identity().id())
	);
	keep_alive.interrupt()?;
	assert!(keep_alive.join());
	Ok(())
}

#[test]
fn denied_capabilities_fail_in_isolation() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(LeakPreventionConfig::default(), runtime.clone())?;
	let driver = webapp.loader.load_class("com.acme.Driver", false)?;
	runtime.register_driver("acme", driver);
	runtime.export_object(
		HostValue::platform("com.sun.Stub", "stub"),
		Some(webapp.loader.identity().clone()),
	);
	runtime.deny(Capability::Drivers);
	runtime.withhold(Capability::Serialization);

	let report = stop(&webapp)?;
	assert!(matches!(report.outcome(SweepKind::Jdbc), Some(SweepOutcome::Failed(_))));
	assert_eq!(report.outcome(SweepKind::SerializationCache), Some(&SweepOutcome::Unavailable));
	assert_eq!(
		report.outcome(SweepKind::RmiTargets),
		Some(&SweepOutcome::Completed { actions: 1 })
	);
	assert_eq!(runtime.registered_drivers(), vec!["acme".to_string()]);
	Ok(())
}

struct Exploding;

impl HostRuntime for Exploding {
	fn drivers(&self) -> Option<&dyn DriverRegistry> {
		panic!("driver registry exploded")
	}
}

#[test]
fn panicking_sweeps_do_not_abort_the_stop() -> eyre::Result<()> {
	let webapp = webapp(LeakPreventionConfig::default(), Arc::new(Exploding))?;
	let report = stop(&webapp)?;
	assert_eq!(
		report.outcome(SweepKind::Jdbc),
		Some(&SweepOutcome::Failed("driver registry exploded".to_string()))
	);
	assert_eq!(report.outcome(SweepKind::Threads), Some(&SweepOutcome::Unavailable));
	Ok(())
}

#[test]
fn disabled_sweeps_do_nothing() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(
		LeakPreventionConfig {
			clear_jdbc: false,
			..LeakPreventionConfig::default()
		},
		runtime.clone(),
	)?;
	let driver = webapp.loader.load_class("com.acme.Driver", false)?;
	runtime.register_driver("acme", driver);

	let report = stop(&webapp)?;
	assert_eq!(report.outcome(SweepKind::Jdbc), Some(&SweepOutcome::Disabled));
	assert_eq!(runtime.registered_drivers(), vec!["acme".to_string()]);
	Ok(())
}

#[test]
fn host_shutdown_skips_the_sweep() -> eyre::Result<()> {
	let runtime = Arc::new(ManagedRuntime::new());
	let webapp = webapp(
		LeakPreventionConfig {
			skip_memory_leak_checks_on_jvm_shutdown: true,
			..LeakPreventionConfig::default()
		},
		runtime.clone(),
	)?;
	runtime.set_shutting_down(true);

	let report = stop(&webapp)?;
	assert!(report.skipped);
	assert!(report.outcomes.is_empty());
	Ok(())
}
