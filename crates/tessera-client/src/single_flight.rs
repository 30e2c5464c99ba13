//! One call per key, many waiters.
//!
//! The first caller for a key becomes the owner: its producer future is wrapped
//! in a [`Shared`] future and a weak handle to it is parked in the pending map.
//! Later callers for the same key upgrade that handle and await the same
//! output instead of calling their own producer.
//!
//! The pending slot is cleared by the shared future itself, before it yields
//! its output, so once any caller has observed a result the next caller starts
//! a fresh call. Only a weak handle is kept in the map: if every caller drops
//! its future, the in-flight call is dropped with them and the next caller
//! starts over. Such dead slots are pruned whenever a new call starts.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use tessera_core::{ApiResult, UnknownError};
use tracing::{trace, warn};

type Call<T, E> = BoxFuture<'static, ApiResult<T, E>>;

struct Slot<T, E> {
    generation: u64,
    call: WeakShared<Call<T, E>>,
}

struct Slots<K, T, E> {
    next_generation: u64,
    pending: HashMap<K, Slot<T, E>>,
}

pub struct SingleFlight<K, T, E> {
    slots: Arc<Mutex<Slots<K, T, E>>>,
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }

    /// Runs `produce` unless a call for `key` is already in flight, in which
    /// case the in-flight result is awaited instead. A panicking producer
    /// settles every caller with an `Unknown` failure.
    pub async fn run_exclusive<F, Fut>(&self, key: K, produce: F) -> ApiResult<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T, E>> + Send + 'static,
    {
        self.join_or_start(key, produce).await
    }

    /// Number of calls currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let mut slots = lock(&self.slots);
        slots.pending.retain(|_, slot| slot.call.upgrade().is_some());
        slots.pending.len()
    }

    fn join_or_start<F, Fut>(&self, key: K, produce: F) -> Shared<Call<T, E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T, E>> + Send + 'static,
    {
        let mut slots = lock(&self.slots);
        if let Some(call) = slots.pending.get(&key).and_then(|slot| slot.call.upgrade()) {
            trace!(event = "single_flight_join");
            return call;
        }
        // Abandoned calls never clear their own slot.
        slots.pending.retain(|_, slot| slot.call.upgrade().is_some());

        slots.next_generation += 1;
        let generation = slots.next_generation;
        let registry = Arc::clone(&self.slots);
        let owned_key = key.clone();
        let call = async move {
            let result = match AssertUnwindSafe(async move { produce().await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!(event = "single_flight_producer_panicked");
                    ApiResult::unknown_failure(UnknownError::new("in-flight call panicked"))
                }
            };
            let mut slots = lock(&registry);
            if slots
                .pending
                .get(&owned_key)
                .is_some_and(|slot| slot.generation == generation)
            {
                slots.pending.remove(&owned_key);
            }
            drop(slots);
            result
        }
        .boxed()
        .shared();

        if let Some(weak) = call.downgrade() {
            slots.pending.insert(
                key,
                Slot {
                    generation,
                    call: weak,
                },
            );
        }
        trace!(event = "single_flight_start", generation);
        call
    }
}

fn lock<K, T, E>(slots: &Mutex<Slots<K, T, E>>) -> MutexGuard<'_, Slots<K, T, E>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}
