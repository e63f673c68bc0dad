//! Bounded connection pool.
//!
//! Connections are created lazily by a fallible factory and handed out as
//! [`Pooled`] guards. Dropping a guard returns the connection to the idle
//! list; [`Pooled::discard`] throws a broken one away so the slot can be
//! refilled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

type Factory<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

struct PoolState<T> {
    idle: Vec<T>,
}

/// A bounded pool for reusable connection-like objects.
pub struct Pool<T, E> {
    max: usize,
    factory: Factory<T, E>,
    state: Mutex<PoolState<T>>,
    available: Condvar,
    in_flight: AtomicUsize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AcquireError<E> {
    #[error("timed out waiting for a pooled connection")]
    Timeout,
    #[error("failed to open connection: {0}")]
    Open(E),
}

/// A pooled value that returns to the pool on drop.
pub struct Pooled<T, E> {
    pool: Arc<Pool<T, E>>,
    value: Option<T>,
}

impl<T, E> Pool<T, E> {
    pub fn new<F>(max: usize, factory: F) -> Arc<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Arc::new(Self {
            max: max.max(1),
            factory: Box::new(factory),
            state: Mutex::new(PoolState { idle: Vec::new() }),
            available: Condvar::new(),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Take an idle value, create a new one if under capacity, or wait.
    ///
    /// `None` waits without deadline.
    pub fn acquire(
        self: &Arc<Self>,
        timeout: Option<Duration>,
    ) -> Result<Pooled<T, E>, AcquireError<E>> {
        let deadline = timeout.map(|limit| Instant::now() + limit);
        let mut state = self.lock();
        loop {
            if let Some(item) = state.idle.pop() {
                return Ok(self.wrap(item));
            }

            if self.in_flight.load(Ordering::SeqCst) < self.max {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                drop(state);
                return match (self.factory)() {
                    Ok(item) => Ok(self.wrap(item)),
                    Err(err) => {
                        self.discard_slot();
                        Err(AcquireError::Open(err))
                    }
                };
            }

            state = match deadline {
                None => self
                    .available
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(limit) => {
                    let now = Instant::now();
                    if now >= limit {
                        return Err(AcquireError::Timeout);
                    }
                    let (guard, _) = self
                        .available
                        .wait_timeout(state, limit - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard
                }
            };
        }
    }

    /// Number of values created and not discarded (idle or checked out).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    fn wrap(self: &Arc<Self>, item: T) -> Pooled<T, E> {
        Pooled {
            pool: Arc::clone(self),
            value: Some(item),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, item: T) {
        self.lock().idle.push(item);
        self.available.notify_one();
    }

    fn discard_slot(&self) {
        // Under the lock, so a waiter between its capacity check and `wait`
        // cannot miss the wakeup.
        let _state = self.lock();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.available.notify_one();
    }
}

impl<T, E> Pooled<T, E> {
    /// Drop the value instead of returning it to the pool.
    pub fn discard(mut self) {
        if self.value.take().is_some() {
            self.pool.discard_slot();
        }
    }
}

impl<T, E> std::ops::Deref for Pooled<T, E> {
    type Target = T;

    fn deref(&self) -> &T {
        // `value` is only taken by `discard` and `drop`, both of which consume the guard.
        match self.value.as_ref() {
            Some(value) => value,
            None => unreachable!("pooled value accessed after release"),
        }
    }
}

impl<T, E> std::ops::DerefMut for Pooled<T, E> {
    fn deref_mut(&mut self) -> &mut T {
        match self.value.as_mut() {
            Some(value) => value,
            None => unreachable!("pooled value accessed after release"),
        }
    }
}

impl<T, E> Drop for Pooled<T, E> {
    fn drop(&mut self) {
        if let Some(item) = self.value.take() {
            self.pool.release(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_pool(max: usize) -> Arc<Pool<usize, String>> {
        let created = AtomicUsize::new(0);
        Pool::new(max, move || Ok(created.fetch_add(1, Ordering::SeqCst)))
    }

    #[test]
    fn pool_reuses_connections() {
        let pool = counting_pool(2);
        let first = pool.acquire(None).expect("first");
        let second = pool.acquire(None).expect("second");
        assert_eq!(pool.in_flight(), 2);
        drop(first);
        assert_eq!(pool.idle_count(), 1);
        drop(second);
        assert_eq!(pool.idle_count(), 2);

        let again = pool.acquire(None).expect("again");
        assert!(*again < 2, "idle connection should be reused");
        assert_eq!(pool.in_flight(), 2);
    }

    #[test]
    fn pool_timeout() {
        let pool = counting_pool(1);
        let _guard = pool.acquire(None).expect("guard");
        let result = pool.acquire(Some(Duration::from_millis(10)));
        assert!(matches!(result, Err(AcquireError::Timeout)));
    }

    #[test]
    fn factory_error_frees_the_slot() {
        let pool: Arc<Pool<usize, String>> = Pool::new(1, || Err("disk gone".to_string()));
        let err = pool.acquire(Some(Duration::from_millis(10))).err();
        assert_eq!(err, Some(AcquireError::Open("disk gone".to_string())));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn pool_discard_allows_recreate() {
        let pool = counting_pool(1);
        let guard = pool.acquire(None).expect("guard");
        guard.discard();
        assert_eq!(pool.in_flight(), 0);
        let next = pool.acquire(Some(Duration::from_millis(10))).expect("next");
        assert_eq!(*next, 1);
    }

    #[test]
    fn waiter_wakes_when_guard_is_released() {
        let pool = counting_pool(1);
        let guard = pool.acquire(None).expect("guard");
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.acquire(Some(Duration::from_secs(5))).map(|g| *g))
        };
        std::thread::sleep(Duration::from_millis(20));
        drop(guard);
        let value = waiter.join().expect("join").expect("acquire after release");
        assert_eq!(value, 0);
    }

    #[test]
    fn waiters_wake_when_slots_are_discarded() {
        let pool = counting_pool(1);
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let guard = pool
                            .acquire(Some(Duration::from_secs(10)))
                            .expect("slot freed by discard");
                        guard.discard();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("join");
        }
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.idle_count(), 0);
    }
}
