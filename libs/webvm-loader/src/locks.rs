use crate::LockingMode;
use ahash::{HashMap, HashMapExt};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;

/// Per class name locks serializing definition. A thread may re-enter its own lock, so a
/// transformer or a nested resolution on the same thread cannot deadlock.
pub struct NameLocks {
	mode: LockingMode,
	global: Arc<ReentrantMutex<()>>,
	locks: Mutex<HashMap<String, Arc<ReentrantMutex<()>>>>,
}

impl NameLocks {
	pub fn new(mode: LockingMode) -> NameLocks {
		NameLocks {
			mode,
			global: Arc::new(ReentrantMutex::new(())),
			locks: Mutex::new(HashMap::new()),
		}
	}

	fn lock_for(&self, name: &str) -> Arc<ReentrantMutex<()>> {
		match self.mode {
			LockingMode::Global => self.global.clone(),
			LockingMode::Parallel => {
				let mut locks = self.locks.lock();
				if let Some(lock) = locks.get(name) {
					return lock.clone();
				}
				let lock = Arc::new(ReentrantMutex::new(()));
				locks.insert(name.to_string(), lock.clone());
				lock
			}
		}
	}

	/// Runs `f` while holding the lock for `name`.
	pub fn with_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
		let lock = self.lock_for(name);
		let _guard = lock.lock();
		f()
	}

	pub fn len(&self) -> usize {
		self.locks.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.locks.lock().is_empty()
	}

	/// Drops every per-name lock. Threads still holding one keep it alive until they
	/// release it.
	pub fn clear(&self) {
		self.locks.lock().clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::thread;

	#[test]
	fn reentrant() {
		let locks = NameLocks::new(LockingMode::Parallel);
		let value = locks.with_lock("a.B", || locks.with_lock("a.B", || 7));
		assert_eq!(value, 7);
		assert_eq!(locks.len(), 1);
		locks.clear();
		assert!(locks.is_empty());
	}

	#[test]
	fn serializes_same_name() {
		let locks = Arc::new(NameLocks::new(LockingMode::Parallel));
		let inside = Arc::new(AtomicUsize::new(0));
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let locks = locks.clone();
				let inside = inside.clone();
				thread::spawn(move || {
					locks.with_lock("a.B", || {
						assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
						thread::yield_now();
						inside.fetch_sub(1, Ordering::SeqCst);
					})
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}
	}

	#[test]
	fn global_mode_shares_one_lock() {
		let locks = NameLocks::new(LockingMode::Global);
		locks.with_lock("a", || locks.with_lock("b", || ()));
		assert!(locks.is_empty());
	}
}
