//! Memoize-or-join initialisation barrier.
//!
//! The first caller of [`Memo::get_or_init`] starts the initialisation future;
//! every caller that arrives while it is pending joins the same future and
//! observes the same outcome. Nothing runs twice for concurrent first use.
//!
//! With [`FailurePolicy::Retry`] a failed outcome is delivered to everyone who
//! joined it and then forgotten, so a later call starts a fresh attempt. With
//! [`FailurePolicy::Sticky`] the failure is kept until [`Memo::reset`].

use crate::error::ZkResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Mutex, PoisonError};

type SharedInit<T> = Shared<BoxFuture<'static, ZkResult<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Retry,
    Sticky,
}

pub struct Memo<T: Clone + Send + Sync + 'static> {
    slot: Mutex<Option<SharedInit<T>>>,
    policy: FailurePolicy,
}

impl<T: Clone + Send + Sync + 'static> Memo<T> {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            slot: Mutex::new(None),
            policy,
        }
    }

    /// Return the memoized value, running `init` only if no attempt is live.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> ZkResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ZkResult<T>> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert_with(|| init().boxed().shared()).clone()
        };

        let outcome = shared.clone().await;
        if outcome.is_err() && self.policy == FailurePolicy::Retry {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|live| live.ptr_eq(&shared)) {
                *slot = None;
            }
        }
        outcome
    }

    /// The memoized value, if initialisation already succeeded.
    pub fn peek(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .and_then(|shared| shared.peek())
            .and_then(|outcome| outcome.as_ref().ok().cloned())
    }

    /// Drop the memoized value (or pending attempt); the next call re-initialises.
    pub fn reset(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
