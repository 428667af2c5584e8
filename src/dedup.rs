//! In-flight request deduplication keyed by scope/audience.
//!
//! [`RequestDeduplicator`] maps a request key to the retrieval currently running for it. The
//! first caller registers a pending slot synchronously and runs its factory; callers arriving
//! before the slot settles wait on the same slot and receive a clone of its outcome. The slot is
//! unlinked as soon as it settles, so the map never acts as a token cache.
//!
//! Futures are lazy: if the caller running a factory is dropped before it settles, a caller
//! still waiting on that slot runs its own factory instead of waiting forever. A slot abandoned by
//! all of its callers is unlinked on the spot.

// self
use crate::{
	_prelude::*,
	obs::{self, DedupEvent},
};

struct PendingRequest<T> {
	outcome: AsyncOnceCell<T>,
}

/// Registry of in-flight retrievals; at most one factory runs per key at a time.
pub struct RequestDeduplicator<T> {
	pending: Mutex<HashMap<String, Arc<PendingRequest<T>>>>,
}
impl<T> RequestDeduplicator<T>
where
	T: Clone,
{
	/// Joins the retrieval registered under `key`, or registers one that runs `factory`.
	///
	/// Registration happens before the first suspension point, so two callers can never both
	/// start a retrieval for the same key unless the key was [`invalidate`](Self::invalidate)d in
	/// between. The entry is removed once the outcome is available, whether it is a success or a
	/// failure, or as soon as every caller waiting on it has been dropped.
	pub async fn get_or_create<F, Fut>(&self, key: &str, factory: F) -> T
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		let mut slot = SlotGuard { registry: self, key, pending: None };
		let pending = slot.pending.insert(self.register(key));
		let outcome = pending.outcome.get_or_init(factory).await.clone();

		drop(slot);

		outcome
	}

	/// Unlinks the entry for `key` without cancelling it.
	///
	/// Callers already waiting on the entry still receive its outcome; later callers start a fresh
	/// retrieval. Returns `true` if an entry was removed.
	pub fn invalidate(&self, key: &str) -> bool {
		let removed = self.pending.lock().remove(key).is_some();

		if removed {
			obs::record_dedup_event(DedupEvent::Evicted, key);
		}

		removed
	}

	/// Returns `true` if a retrieval is registered under `key`.
	pub fn contains(&self, key: &str) -> bool {
		self.pending.lock().contains_key(key)
	}

	/// Number of registered retrievals.
	pub fn len(&self) -> usize {
		self.pending.lock().len()
	}

	/// Returns `true` if nothing is in flight.
	pub fn is_empty(&self) -> bool {
		self.pending.lock().is_empty()
	}

	/// Unlinks every entry; in-flight retrievals still resolve for their current waiters.
	pub fn clear(&self) {
		self.pending.lock().clear();
	}

	fn register(&self, key: &str) -> Arc<PendingRequest<T>> {
		let mut pending = self.pending.lock();

		if let Some(existing) = pending.get(key) {
			obs::record_dedup_event(DedupEvent::Joined, key);

			return existing.clone();
		}

		let created = Arc::new(PendingRequest { outcome: AsyncOnceCell::new() });

		pending.insert(key.to_owned(), created.clone());

		created
	}

	// Only the entry this caller waited on may be removed; a replacement registered after an
	// invalidation stays linked. An unsettled entry is removed only once no caller holds it.
	// References are cloned and dropped under the map lock, so the count is exact.
	fn release(&self, key: &str, slot: Arc<PendingRequest<T>>) {
		let mut pending = self.pending.lock();

		if !pending.get(key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
			return;
		}

		let settled = slot.outcome.is_initialized();

		drop(slot);

		let unclaimed = pending.get(key).is_some_and(|current| Arc::strong_count(current) == 1);

		if settled || unclaimed {
			pending.remove(key);
		}
	}
}
impl<T> Default for RequestDeduplicator<T> {
	fn default() -> Self {
		Self { pending: Mutex::new(HashMap::new()) }
	}
}
impl<T> Debug for RequestDeduplicator<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDeduplicator").field("pending", &self.pending.lock().len()).finish()
	}
}

// Releases the caller's slot on settle, and on drop when the caller is abandoned mid-flight.
struct SlotGuard<'a, T>
where
	T: Clone,
{
	registry: &'a RequestDeduplicator<T>,
	key: &'a str,
	pending: Option<Arc<PendingRequest<T>>>,
}
impl<T> Drop for SlotGuard<'_, T>
where
	T: Clone,
{
	fn drop(&mut self) {
		if let Some(pending) = self.pending.take() {
			self.registry.release(self.key, pending);
		}
	}
}
