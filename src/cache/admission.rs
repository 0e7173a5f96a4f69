//! Admission control in front of the backing store.
//!
//! Each [`AdmissionController`] caps how many calls of one class may be in flight at once.
//! A caller over the cap is turned away immediately instead of queueing, so the database
//! never sees more than `limit` concurrent requests of that class.

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::warn;

use super::config::AdmissionLimits;

/// Classes of backing-store work that are limited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionClass {
    PostRead,
    PostList,
    UserRead,
}

impl AdmissionClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            AdmissionClass::PostRead => "post_read",
            AdmissionClass::PostList => "post_list",
            AdmissionClass::UserRead => "user_read",
        }
    }
}

impl fmt::Display for AdmissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a call arrives while its class is already at the limit.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("admission limit of {limit} reached for {class}")]
pub struct AdmissionRejected {
    pub class: AdmissionClass,
    pub limit: usize,
}

/// Bounded in-flight counter for one [`AdmissionClass`].
#[derive(Debug)]
pub struct AdmissionController {
    class: AdmissionClass,
    limit: usize,
    in_flight: AtomicUsize,
}

impl AdmissionController {
    pub fn new(class: AdmissionClass, limit: NonZeroUsize) -> Self {
        Self {
            class,
            limit: limit.get(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Calls currently holding a ticket.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims a slot, or rejects without waiting when the class is full.
    ///
    /// The slot is released when the returned ticket is dropped, which covers normal
    /// completion, errors, panics, and cancellation of the owning future.
    pub fn try_acquire(&self) -> Result<AdmissionTicket<'_>, AdmissionRejected> {
        let admitted = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        if admitted > self.limit {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            metrics::counter!("lectern_admission_rejected_total", "class" => self.class.as_str())
                .increment(1);
            warn!(
                target = "lectern::cache::admission",
                class = %self.class,
                limit = self.limit,
                "admission rejected"
            );
            return Err(AdmissionRejected {
                class: self.class,
                limit: self.limit,
            });
        }

        Ok(AdmissionTicket { controller: self })
    }

    /// Runs `operation` while holding a slot.
    ///
    /// `operation` is not invoked at all when the call is rejected.
    pub async fn admit<F, Fut, T>(&self, operation: F) -> Result<T, AdmissionRejected>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _ticket = self.try_acquire()?;
        Ok(operation().await)
    }
}

/// Proof of admission; gives the slot back on drop.
#[derive(Debug)]
pub struct AdmissionTicket<'a> {
    controller: &'a AdmissionController,
}

impl Drop for AdmissionTicket<'_> {
    fn drop(&mut self) {
        self.controller.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One controller per class; limits are never shared between classes.
#[derive(Debug)]
pub struct Admission {
    post_read: AdmissionController,
    post_list: AdmissionController,
    user_read: AdmissionController,
}

impl Admission {
    pub fn new(limits: &AdmissionLimits) -> Self {
        Self {
            post_read: AdmissionController::new(AdmissionClass::PostRead, limits.post_read),
            post_list: AdmissionController::new(AdmissionClass::PostList, limits.post_list),
            user_read: AdmissionController::new(AdmissionClass::UserRead, limits.user_read),
        }
    }

    pub fn controller(&self, class: AdmissionClass) -> &AdmissionController {
        match class {
            AdmissionClass::PostRead => &self.post_read,
            AdmissionClass::PostList => &self.post_list,
            AdmissionClass::UserRead => &self.user_read,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;

    fn controller(limit: usize) -> Arc<AdmissionController> {
        Arc::new(AdmissionController::new(
            AdmissionClass::PostRead,
            NonZeroUsize::new(limit).unwrap(),
        ))
    }

    #[tokio::test]
    async fn rejects_once_limit_is_reached() {
        let gate = controller(2);
        let first = gate.try_acquire().unwrap();
        let _second = gate.try_acquire().unwrap();

        let rejected = gate.try_acquire().unwrap_err();
        assert_eq!(rejected.class, AdmissionClass::PostRead);
        assert_eq!(rejected.limit, 2);
        assert_eq!(gate.in_flight(), 2);

        drop(first);
        assert_eq!(gate.in_flight(), 1);
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn rejected_operation_is_never_started() {
        let gate = controller(1);
        let _held = gate.try_acquire().unwrap();

        let mut started = false;
        let outcome = gate
            .admit(|| {
                started = true;
                async {}
            })
            .await;

        assert!(outcome.is_err());
        assert!(!started);
    }

    #[tokio::test]
    async fn slot_is_released_when_operation_fails() {
        let gate = controller(1);
        let outcome: Result<Result<(), &str>, _> = gate.admit(|| async { Err("boom") }).await;
        assert_eq!(outcome.unwrap(), Err("boom"));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn slot_is_released_when_caller_is_cancelled() {
        let gate = controller(1);
        let entered = Arc::new(Notify::new());

        let task = {
            let gate = Arc::clone(&gate);
            let entered = Arc::clone(&entered);
            tokio::spawn(async move {
                gate.admit(|| async move {
                    entered.notify_one();
                    std::future::pending::<()>().await;
                })
                .await
            })
        };

        entered.notified().await;
        assert_eq!(gate.in_flight(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn classes_are_limited_independently() {
        let limits = AdmissionLimits {
            post_read: NonZeroUsize::new(1).unwrap(),
            post_list: NonZeroUsize::new(1).unwrap(),
            user_read: NonZeroUsize::new(1).unwrap(),
            backend_timeout: Duration::from_secs(1),
        };
        let admission = Admission::new(&limits);

        let _read = admission
            .controller(AdmissionClass::PostRead)
            .try_acquire()
            .unwrap();
        assert!(
            admission
                .controller(AdmissionClass::PostRead)
                .try_acquire()
                .is_err()
        );
        assert!(
            admission
                .controller(AdmissionClass::PostList)
                .try_acquire()
                .is_ok()
        );
    }
}
