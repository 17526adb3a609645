use crate::leak::{
	AuxiliaryCaches, CapabilityError, DriverRegistry, HostRuntime, HostValue, HostedExecutor,
	HostedThread, RegisteredDriver, RmiObjectTable, RmiTarget, SerializationCache,
	ThreadIntrospection, ThreadKind, ThreadLocalEntry, ThreadLocalKind, ThreadLocalTable, ThreadRef,
};
use crate::{ClassRef, LoaderIdentity, LoaderRef};
use ahash::HashSet;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use crossbeam::sync::{Parker, Unparker};
use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const WORKER_POLL: Duration = Duration::from_millis(25);

/// A capability of [`ManagedRuntime`] that can be denied or withheld.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
	Threads,
	ThreadLocals,
	Drivers,
	Rmi,
	Serialization,
	Auxiliary,
}

#[derive(Default)]
struct Restrictions {
	denied: Mutex<HashSet<Capability>>,
	withheld: Mutex<HashSet<Capability>>,
}

impl Restrictions {
	fn check(&self, capability: Capability) -> Result<(), CapabilityError> {
		if self.denied.lock().contains(&capability) {
			return Err(CapabilityError::AccessDenied(format!("{capability:?}")));
		}
		Ok(())
	}

	fn offers(&self, capability: Capability) -> bool {
		!self.withheld.lock().contains(&capability)
	}
}

/// How to start a managed thread.
#[derive(Clone, Debug)]
pub struct ThreadSpec {
	pub name: String,
	pub group: Option<String>,
	pub context_loader: Option<LoaderRef>,
	pub kind: ThreadKind,
	pub stack: Vec<String>,
}

impl ThreadSpec {
	pub fn new(name: impl Into<String>) -> ThreadSpec {
		ThreadSpec {
			name: name.into(),
			group: Some("main".to_string()),
			context_loader: None,
			kind: ThreadKind::Plain,
			stack: vec![],
		}
	}

	pub fn group(mut self, group: impl Into<String>) -> ThreadSpec {
		self.group = Some(group.into());
		self
	}

	pub fn context_loader(mut self, loader: LoaderRef) -> ThreadSpec {
		self.context_loader = Some(loader);
		self
	}

	pub fn kind(mut self, kind: ThreadKind) -> ThreadSpec {
		self.kind = kind;
		self
	}

	pub fn stack<S: Into<String>>(mut self, frames: impl IntoIterator<Item = S>) -> ThreadSpec {
		self.stack = frames.into_iter().map(Into::into).collect();
		self
	}
}

struct ThreadState {
	alive: AtomicBool,
	interrupted: AtomicBool,
	cancelled: AtomicBool,
	unparker: Unparker,
}

impl ThreadState {
	fn wake(&self) {
		self.unparker.unpark();
	}
}

struct AliveGuard(Arc<ThreadState>);

impl Drop for AliveGuard {
	fn drop(&mut self) {
		self.0.alive.store(false, Ordering::Release);
	}
}

/// Handed to the body of a managed thread so it can notice interrupts and timer
/// cancellation.
pub struct ThreadControl {
	state: Arc<ThreadState>,
	parker: Parker,
}

impl ThreadControl {
	pub fn is_interrupted(&self) -> bool {
		self.state.interrupted.load(Ordering::Acquire)
	}

	pub fn is_cancelled(&self) -> bool {
		self.state.cancelled.load(Ordering::Acquire)
	}

	pub fn should_stop(&self) -> bool {
		self.is_interrupted() || self.is_cancelled()
	}

	/// Parks for up to `timeout`, waking early on interrupt or cancellation. Returns
	/// [`ThreadControl::should_stop`].
	pub fn wait(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		while !self.should_stop() {
			let now = Instant::now();
			if now >= deadline {
				break;
			}
			self.parker.park_timeout(deadline - now);
		}
		self.should_stop()
	}

	/// Parks until interrupted or cancelled.
	pub fn wait_for_stop(&self) {
		while !self.should_stop() {
			self.parker.park();
		}
	}
}

/// A thread-local map of one managed thread.
pub struct ManagedThreadLocals {
	slots: Mutex<Vec<(Option<HostValue>, Option<HostValue>)>>,
	restrictions: Arc<Restrictions>,
}

impl ManagedThreadLocals {
	fn new(restrictions: Arc<Restrictions>) -> ManagedThreadLocals {
		ManagedThreadLocals {
			slots: Mutex::new(vec![]),
			restrictions,
		}
	}

	pub fn set(&self, key: HostValue, value: Option<HostValue>) {
		self.slots.lock().push((Some(key), value));
	}

	/// An entry whose key has already been collected.
	pub fn set_stale(&self, value: HostValue) {
		self.slots.lock().push((None, Some(value)));
	}

	pub fn len(&self) -> usize {
		self.slots.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.lock().is_empty()
	}
}

impl ThreadLocalTable for ManagedThreadLocals {
	fn expunge_stale_entries(&self) -> Result<usize, CapabilityError> {
		self.restrictions.check(Capability::ThreadLocals)?;
		let mut slots = self.slots.lock();
		let before = slots.len();
		slots.retain(|(key, _)| key.is_some());
		Ok(before - slots.len())
	}

	fn entries(&self) -> Result<Vec<ThreadLocalEntry>, CapabilityError> {
		self.restrictions.check(Capability::ThreadLocals)?;
		Ok(self
			.slots
			.lock()
			.iter()
			.filter_map(|(key, value)| {
				key.clone().map(|key| ThreadLocalEntry {
					key,
					value: value.clone(),
				})
			})
			.collect())
	}
}

pub struct ManagedThread {
	id: u64,
	name: String,
	group: Option<String>,
	kind: ThreadKind,
	context_loader: RwLock<Option<LoaderRef>>,
	state: Arc<ThreadState>,
	thread_id: ThreadId,
	handle: Mutex<Option<JoinHandle<()>>>,
	stack: RwLock<Vec<String>>,
	locals: Arc<ManagedThreadLocals>,
	inheritable_locals: Arc<ManagedThreadLocals>,
	executor: RwLock<Option<Weak<ManagedExecutor>>>,
}

impl ManagedThread {
	pub fn locals(&self, kind: ThreadLocalKind) -> &Arc<ManagedThreadLocals> {
		match kind {
			ThreadLocalKind::Normal => &self.locals,
			ThreadLocalKind::Inheritable => &self.inheritable_locals,
		}
	}

	pub fn set_stack<S: Into<String>>(&self, frames: impl IntoIterator<Item = S>) {
		*self.stack.write() = frames.into_iter().map(Into::into).collect();
	}

	pub fn is_timer_cancelled(&self) -> bool {
		self.state.cancelled.load(Ordering::Acquire)
	}

	/// Waits for the thread to finish. Returns false if it panicked or was attached rather
	/// than spawned.
	pub fn join(&self) -> bool {
		match self.handle.lock().take() {
			Some(handle) => handle.join().is_ok(),
			None => false,
		}
	}
}

impl HostedThread for ManagedThread {
	fn id(&self) -> u64 {
		self.id
	}

	fn name(&self) -> String {
		self.name.clone()
	}

	fn group_name(&self) -> Option<String> {
		self.group.clone()
	}

	fn kind(&self) -> ThreadKind {
		self.kind
	}

	fn context_loader(&self) -> Option<LoaderRef> {
		self.context_loader.read().clone()
	}

	fn set_context_loader(&self, loader: Option<LoaderRef>) -> Result<(), CapabilityError> {
		*self.context_loader.write() = loader;
		Ok(())
	}

	fn is_alive(&self) -> bool {
		self.state.alive.load(Ordering::Acquire)
	}

	fn is_current(&self) -> bool {
		thread::current().id() == self.thread_id
	}

	fn is_interrupted(&self) -> bool {
		self.state.interrupted.load(Ordering::Acquire)
	}

	fn interrupt(&self) -> Result<(), CapabilityError> {
		trace!("Interrupting {}", self.name);
		self.state.interrupted.store(true, Ordering::Release);
		self.state.wake();
		Ok(())
	}

	fn stack_trace(&self) -> Vec<String> {
		self.stack.read().clone()
	}

	fn cancel_timer(&self) -> Result<(), CapabilityError> {
		if self.kind != ThreadKind::Timer {
			return Err(CapabilityError::Unsupported(format!("{} is not a timer thread", self.name)));
		}
		self.state.cancelled.store(true, Ordering::Release);
		self.state.wake();
		Ok(())
	}

	fn executor(&self) -> Option<Arc<dyn HostedExecutor>> {
		let executor = self.executor.read().as_ref()?.upgrade()?;
		Some(executor)
	}

	fn force_stop(&self) -> Result<(), CapabilityError> {
		Err(CapabilityError::Unsupported(
			"threads cannot be stopped forcibly in-process".to_string(),
		))
	}

	fn thread_locals(&self, kind: ThreadLocalKind) -> Option<Arc<dyn ThreadLocalTable>> {
		Some(self.locals(kind).clone())
	}
}

type Task = Box<dyn FnOnce() + Send>;

/// A fixed pool of managed worker threads.
pub struct ManagedExecutor {
	name: String,
	sender: Mutex<Option<Sender<Task>>>,
	queue: Receiver<Task>,
	workers: Vec<Arc<ManagedThread>>,
}

impl ManagedExecutor {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn workers(&self) -> &[Arc<ManagedThread>] {
		&self.workers
	}

	/// Queues a task. Returns false once the pool has been shut down.
	pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
		match &*self.sender.lock() {
			Some(sender) => sender.send(Box::new(task)).is_ok(),
			None => false,
		}
	}

	pub fn is_shutdown(&self) -> bool {
		self.sender.lock().is_none()
	}
}

impl HostedExecutor for ManagedExecutor {
	fn shutdown_now(&self) -> Result<usize, CapabilityError> {
		drop(self.sender.lock().take());
		let mut dropped = 0;
		while self.queue.try_recv().is_ok() {
			dropped += 1;
		}
		for worker in &self.workers {
			worker.interrupt()?;
		}
		debug!("Executor {} shut down, {dropped} tasks dropped", self.name);
		Ok(dropped)
	}
}

fn worker_loop(control: ThreadControl, tasks: Receiver<Task>) {
	while !control.should_stop() {
		match tasks.recv_timeout(WORKER_POLL) {
			Ok(task) => task(),
			Err(RecvTimeoutError::Timeout) => {}
			Err(RecvTimeoutError::Disconnected) => break,
		}
	}
}

/// An in-process [`HostRuntime`]: it knows about the threads it started and the registries
/// it holds, and can refuse or withhold any capability.
pub struct ManagedRuntime {
	restrictions: Arc<Restrictions>,
	next_thread_id: AtomicU64,
	threads: RwLock<Vec<Arc<ManagedThread>>>,
	drivers: Mutex<Vec<RegisteredDriver>>,
	rmi_objects: Mutex<Vec<RmiTarget>>,
	rmi_impls: Mutex<Vec<RmiTarget>>,
	descriptors: Mutex<Vec<ClassRef>>,
	log_factories: Mutex<Vec<LoaderRef>>,
	url_handlers: Mutex<Vec<(String, LoaderRef)>>,
	bean_info: Mutex<Vec<ClassRef>>,
	shutting_down: AtomicBool,
}

impl Default for ManagedRuntime {
	fn default() -> Self {
		ManagedRuntime::new()
	}
}

impl ManagedRuntime {
	pub fn new() -> ManagedRuntime {
		ManagedRuntime {
			restrictions: Arc::new(Restrictions::default()),
			next_thread_id: AtomicU64::new(1),
			threads: RwLock::new(vec![]),
			drivers: Mutex::new(vec![]),
			rmi_objects: Mutex::new(vec![]),
			rmi_impls: Mutex::new(vec![]),
			descriptors: Mutex::new(vec![]),
			log_factories: Mutex::new(vec![]),
			url_handlers: Mutex::new(vec![]),
			bean_info: Mutex::new(vec![]),
			shutting_down: AtomicBool::new(false),
		}
	}

	/// Makes every use of `capability` fail with [`CapabilityError::AccessDenied`].
	pub fn deny(&self, capability: Capability) {
		self.restrictions.denied.lock().insert(capability);
	}

	/// Stops offering `capability` at all.
	pub fn withhold(&self, capability: Capability) {
		self.restrictions.withheld.lock().insert(capability);
	}

	pub fn allow(&self, capability: Capability) {
		self.restrictions.denied.lock().remove(&capability);
		self.restrictions.withheld.lock().remove(&capability);
	}

	pub fn set_shutting_down(&self, shutting_down: bool) {
		self.shutting_down.store(shutting_down, Ordering::Release);
	}

	fn new_thread(&self, spec: ThreadSpec, thread_id: ThreadId, unparker: Unparker) -> Arc<ManagedThread> {
		Arc::new(ManagedThread {
			id: self.next_thread_id.fetch_add(1, Ordering::Relaxed),
			name: spec.name,
			group: spec.group,
			kind: spec.kind,
			context_loader: RwLock::new(spec.context_loader),
			state: Arc::new(ThreadState {
				alive: AtomicBool::new(true),
				interrupted: AtomicBool::new(false),
				cancelled: AtomicBool::new(false),
				unparker,
			}),
			thread_id,
			handle: Mutex::new(None),
			stack: RwLock::new(spec.stack),
			locals: Arc::new(ManagedThreadLocals::new(self.restrictions.clone())),
			inheritable_locals: Arc::new(ManagedThreadLocals::new(self.restrictions.clone())),
			executor: RwLock::new(None),
		})
	}

	/// Starts `body` on a new OS thread. The thread counts as alive until `body` returns
	/// or panics.
	pub fn spawn(
		&self,
		spec: ThreadSpec,
		body: impl FnOnce(ThreadControl) + Send + 'static,
	) -> io::Result<Arc<ManagedThread>> {
		let parker = Parker::new();
		let unparker = parker.unparker().clone();
		let (ready_tx, ready_rx) = unbounded::<Arc<ThreadState>>();

		let handle = thread::Builder::new().name(spec.name.clone()).spawn(move || {
			let Ok(state) = ready_rx.recv() else {
				return;
			};
			let _alive = AliveGuard(state.clone());
			body(ThreadControl { state, parker });
		})?;

		let thread = self.new_thread(spec, handle.thread().id(), unparker);
		*thread.handle.lock() = Some(handle);
		// The body waits for its state, which needs the id of the spawned thread.
		let _ = ready_tx.send(thread.state.clone());

		debug!("Started managed thread {}", thread.name);
		self.register(thread.clone());
		Ok(thread)
	}

	/// Registers the calling thread. It stays alive for the life of the runtime.
	pub fn attach_current(&self, spec: ThreadSpec) -> Arc<ManagedThread> {
		let unparker = Parker::new().unparker().clone();
		let thread = self.new_thread(spec, thread::current().id(), unparker);
		self.register(thread.clone());
		thread
	}

	fn register(&self, thread: Arc<ManagedThread>) {
		let mut threads = self.threads.write();
		threads.retain(|existing| existing.is_alive());
		threads.push(thread);
	}

	/// Forgets threads that have finished.
	fn prune(&self) {
		self.threads.write().retain(|thread| {
			let alive = thread.is_alive();
			if !alive {
				trace!("Forgetting finished thread {}", thread.name);
			}
			alive
		});
	}

	/// Starts a pool of `workers` threads named after `spec`.
	pub fn executor(&self, spec: ThreadSpec, workers: usize) -> io::Result<Arc<ManagedExecutor>> {
		let (sender, queue) = unbounded::<Task>();
		let mut threads = Vec::with_capacity(workers);
		for idx in 0..workers {
			let tasks = queue.clone();
			let worker = ThreadSpec {
				name: format!("{}-{}", spec.name, idx + 1),
				kind: ThreadKind::PoolWorker,
				..spec.clone()
			};
			threads.push(self.spawn(worker, move |control| worker_loop(control, tasks))?);
		}

		let executor = Arc::new(ManagedExecutor {
			name: spec.name,
			sender: Mutex::new(Some(sender)),
			queue,
			workers: threads,
		});
		for worker in &executor.workers {
			*worker.executor.write() = Some(Arc::downgrade(&executor));
		}
		Ok(executor)
	}

	/// The threads that are still alive.
	pub fn managed_threads(&self) -> Vec<Arc<ManagedThread>> {
		self.prune();
		self.threads.read().clone()
	}

	pub fn register_driver(&self, name: impl Into<String>, class: ClassRef) {
		self.drivers.lock().push(RegisteredDriver {
			name: name.into(),
			class,
		});
	}

	pub fn registered_drivers(&self) -> Vec<String> {
		self.drivers.lock().iter().map(|driver| driver.name.clone()).collect()
	}

	pub fn export_object(&self, stub: HostValue, context_loader: Option<LoaderRef>) {
		self.rmi_objects.lock().push(RmiTarget { stub, context_loader });
	}

	pub fn export_impl(&self, stub: HostValue, context_loader: Option<LoaderRef>) {
		self.rmi_impls.lock().push(RmiTarget { stub, context_loader });
	}

	/// `(object table, implementation table)` sizes.
	pub fn rmi_target_counts(&self) -> (usize, usize) {
		(self.rmi_objects.lock().len(), self.rmi_impls.lock().len())
	}

	pub fn cache_descriptor(&self, class: ClassRef) {
		self.descriptors.lock().push(class);
	}

	pub fn descriptor_count(&self) -> usize {
		self.descriptors.lock().len()
	}

	pub fn register_log_factory(&self, loader: LoaderRef) {
		self.log_factories.lock().push(loader);
	}

	pub fn register_url_handler(&self, protocol: impl Into<String>, loader: LoaderRef) {
		self.url_handlers.lock().push((protocol.into(), loader));
	}

	pub fn cache_bean_info(&self, class: ClassRef) {
		self.bean_info.lock().push(class);
	}

	/// `(log factories, url handlers, bean infos)` still registered.
	pub fn auxiliary_counts(&self) -> (usize, usize, usize) {
		(
			self.log_factories.lock().len(),
			self.url_handlers.lock().len(),
			self.bean_info.lock().len(),
		)
	}
}

impl HostRuntime for ManagedRuntime {
	fn threads(&self) -> Option<&dyn ThreadIntrospection> {
		if self.restrictions.offers(Capability::Threads) {
			Some(self)
		} else {
			None
		}
	}

	fn drivers(&self) -> Option<&dyn DriverRegistry> {
		if self.restrictions.offers(Capability::Drivers) {
			Some(self)
		} else {
			None
		}
	}

	fn rmi(&self) -> Option<&dyn RmiObjectTable> {
		if self.restrictions.offers(Capability::Rmi) {
			Some(self)
		} else {
			None
		}
	}

	fn serialization(&self) -> Option<&dyn SerializationCache> {
		if self.restrictions.offers(Capability::Serialization) {
			Some(self)
		} else {
			None
		}
	}

	fn auxiliary(&self) -> Option<&dyn AuxiliaryCaches> {
		if self.restrictions.offers(Capability::Auxiliary) {
			Some(self)
		} else {
			None
		}
	}

	fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::Acquire)
	}
}

impl ThreadIntrospection for ManagedRuntime {
	fn threads(&self) -> Result<Vec<ThreadRef>, CapabilityError> {
		self.restrictions.check(Capability::Threads)?;
		self.prune();
		Ok(self
			.threads
			.read()
			.iter()
			.map(|thread| thread.clone() as ThreadRef)
			.collect())
	}
}

impl DriverRegistry for ManagedRuntime {
	fn drivers(&self) -> Result<Vec<RegisteredDriver>, CapabilityError> {
		self.restrictions.check(Capability::Drivers)?;
		Ok(self.drivers.lock().clone())
	}

	fn deregister(&self, name: &str) -> Result<(), CapabilityError> {
		self.restrictions.check(Capability::Drivers)?;
		let mut drivers = self.drivers.lock();
		let before = drivers.len();
		drivers.retain(|driver| driver.name != name);
		if drivers.len() == before {
			return Err(CapabilityError::Failed(format!("driver {name} is not registered")));
		}
		Ok(())
	}
}

impl RmiObjectTable for ManagedRuntime {
	fn remove_object_targets(
		&self,
		predicate: &mut dyn FnMut(&RmiTarget) -> bool,
	) -> Result<Vec<RmiTarget>, CapabilityError> {
		self.restrictions.check(Capability::Rmi)?;
		let mut removed = vec![];
		self.rmi_objects.lock().retain(|target| {
			if predicate(target) {
				removed.push(target.clone());
				false
			} else {
				true
			}
		});
		Ok(removed)
	}

	fn remove_impl_targets(&self, predicate: &mut dyn FnMut(&RmiTarget) -> bool) -> Result<usize, CapabilityError> {
		self.restrictions.check(Capability::Rmi)?;
		let mut table = self.rmi_impls.lock();
		let before = table.len();
		table.retain(|target| !predicate(target));
		Ok(before - table.len())
	}
}

impl SerializationCache for ManagedRuntime {
	fn remove_where(&self, predicate: &mut dyn FnMut(&ClassRef) -> bool) -> Result<usize, CapabilityError> {
		self.restrictions.check(Capability::Serialization)?;
		let mut descriptors = self.descriptors.lock();
		let before = descriptors.len();
		descriptors.retain(|class| !predicate(class));
		Ok(before - descriptors.len())
	}
}

impl AuxiliaryCaches for ManagedRuntime {
	fn release_log_factory(&self, loader: &LoaderIdentity) -> Result<usize, CapabilityError> {
		self.restrictions.check(Capability::Auxiliary)?;
		let mut factories = self.log_factories.lock();
		let before = factories.len();
		factories.retain(|factory| **factory != *loader);
		Ok(before - factories.len())
	}

	fn release_url_stream_handlers(&self, loader: &LoaderIdentity) -> Result<usize, CapabilityError> {
		self.restrictions.check(Capability::Auxiliary)?;
		let mut handlers = self.url_handlers.lock();
		let before = handlers.len();
		handlers.retain(|(_, owner)| **owner != *loader);
		Ok(before - handlers.len())
	}

	fn flush_introspector(&self) -> Result<(), CapabilityError> {
		self.restrictions.check(Capability::Auxiliary)?;
		self.bean_info.lock().clear();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spawned_threads_report_liveness() {
		let runtime = ManagedRuntime::new();
		let loader = LoaderIdentity::new("webapp", None);
		let thread = runtime
			.spawn(
				ThreadSpec::new("worker").context_loader(loader.clone()),
				|control| control.wait_for_stop(),
			)
			.unwrap();

		assert!(thread.is_alive());
		assert!(!thread.is_current());
		assert_eq!(thread.context_loader().as_deref(), Some(&*loader));
		thread.interrupt().unwrap();
		assert!(thread.join());
		assert!(!thread.is_alive());
		assert!(thread.is_interrupted());
	}

	#[test]
	fn attached_thread_is_current() {
		let runtime = ManagedRuntime::new();
		let thread = runtime.attach_current(ThreadSpec::new("main"));
		assert!(thread.is_current());
		assert!(thread.is_alive());
		assert!(!thread.join());
	}

	#[test]
	fn timers_cancel() {
		let runtime = ManagedRuntime::new();
		let timer = runtime
			.spawn(ThreadSpec::new("Timer-0").kind(ThreadKind::Timer), |control| {
				while !control.wait(Duration::from_millis(5)) {}
			})
			.unwrap();
		let plain = runtime.attach_current(ThreadSpec::new("plain"));

		timer.cancel_timer().unwrap();
		assert!(timer.join());
		assert!(timer.is_timer_cancelled());
		assert!(matches!(plain.cancel_timer(), Err(CapabilityError::Unsupported(_))));
	}

	#[test]
	fn executor_shutdown_stops_workers() {
		let runtime = ManagedRuntime::new();
		let executor = runtime.executor(ThreadSpec::new("pool"), 2).unwrap();
		let (done_tx, done_rx) = unbounded();
		assert!(executor.submit(move || done_tx.send(()).unwrap()));
		done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

		let worker = executor.workers()[0].clone();
		assert_eq!(worker.kind(), ThreadKind::PoolWorker);
		assert_eq!(worker.name(), "pool-1");
		assert!(worker.executor().is_some());

		executor.shutdown_now().unwrap();
		assert!(executor.is_shutdown());
		assert!(!executor.submit(|| {}));
		for worker in executor.workers() {
			assert!(worker.join());
			assert!(!worker.is_alive());
		}
	}

	#[test]
	fn thread_locals_expunge() {
		let runtime = ManagedRuntime::new();
		let thread = runtime.attach_current(ThreadSpec::new("main"));
		let locals = thread.locals(ThreadLocalKind::Normal);
		locals.set(HostValue::platform("java.lang.ThreadLocal", "key"), None);
		locals.set_stale(HostValue::platform("java.lang.String", "value"));

		assert_eq!(locals.expunge_stale_entries().unwrap(), 1);
		assert_eq!(locals.entries().unwrap().len(), 1);

		runtime.deny(Capability::ThreadLocals);
		assert!(matches!(locals.entries(), Err(CapabilityError::AccessDenied(_))));
	}

	#[test]
	fn capabilities_can_be_denied_or_withheld() {
		let runtime = ManagedRuntime::new();
		assert!(HostRuntime::drivers(&runtime).is_some());

		runtime.deny(Capability::Drivers);
		let registry = HostRuntime::drivers(&runtime).unwrap();
		assert!(matches!(registry.drivers(), Err(CapabilityError::AccessDenied(_))));

		runtime.withhold(Capability::Drivers);
		assert!(HostRuntime::drivers(&runtime).is_none());

		runtime.allow(Capability::Drivers);
		assert!(HostRuntime::drivers(&runtime).unwrap().drivers().unwrap().is_empty());
	}
}
