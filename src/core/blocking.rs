// src/core/blocking.rs

//! Manages clients that are blocked waiting for data on list keys (`BLPOP`).
//!
//! Waiters are queued per key in FIFO arrival order. A push wakes at most one
//! waiter; the woken client re-attempts its pop under fresh locks and goes
//! back to the front of the queue if another client raced it to the data.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::commands::list::logic::list_pop_logic;
use crate::core::storage::db::{ExecutionContext, PopDirection};
use crate::core::{PeridotError, RespValue};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// The waker is taken out of the shared slot exactly once, either by a
/// notifying push or by waiter cleanup.
type SharedWaker = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// Holds information about a waiting client, including its session ID for cleanup.
#[derive(Clone, Debug)]
struct WaiterInfo {
    session_id: u64,
    waker: SharedWaker,
}

/// One registered blocking wait, held by the blocked task itself.
#[derive(Debug)]
pub struct Waiter {
    shared: SharedWaker,
    rx: oneshot::Receiver<()>,
}

impl Waiter {
    /// Parks until woken or until the deadline passes. Returns `true` when a
    /// wake signal arrived.
    pub async fn wait(&mut self, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, &mut self.rx)
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false),
            None => (&mut self.rx).await.is_ok(),
        }
    }
}

/// Manages all clients currently blocked on list operations.
#[derive(Debug, Default)]
pub struct BlockerManager {
    // Key: the list key being watched. Value: FIFO queue of waiters.
    waiters: DashMap<Bytes, VecDeque<WaiterInfo>>,
}

impl BlockerManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Orchestrates a blocking left-pop (`BLPOP`) across one or more keys.
    /// `timeout` of `None` waits indefinitely.
    pub async fn orchestrate_blocking_pop(
        self: &Arc<Self>,
        ctx: &mut ExecutionContext<'_>,
        keys: &[Bytes],
        timeout: Option<std::time::Duration>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let deadline = timeout.map(|d| Instant::now() + d);
        // After a wake the waiter re-queues at the front so FIFO service order
        // survives a lost race.
        let mut requeue_at_front = false;

        loop {
            // Non-blocking attempt across all keys, in argument order.
            for key in keys {
                let (resp, outcome) = list_pop_logic(ctx, key, PopDirection::Left)?;
                if resp != RespValue::Null {
                    return Ok((
                        RespValue::Array(vec![RespValue::BulkString(key.clone()), resp]),
                        outcome,
                    ));
                }
            }

            // Register BEFORE releasing locks: a push cannot run (and thus
            // cannot notify) until the shard locks are released, so no wakeup
            // can slip between the check above and the registration.
            let mut waiter = self.register(keys, ctx.session_id, requeue_at_front);
            ctx.release_locks();
            debug!(
                "session {}: blocking on list keys {:?}",
                ctx.session_id, keys
            );

            let woken = waiter.wait(deadline).await;
            self.unregister(keys, &waiter);
            if !woken {
                // A push may have consumed this waiter's wake signal right as
                // the timeout fired; one last non-blocking pass keeps that
                // push from being lost.
                ctx.reacquire_locks_for_command().await?;
                for key in keys {
                    let (resp, outcome) = list_pop_logic(ctx, key, PopDirection::Left)?;
                    if resp != RespValue::Null {
                        return Ok((
                            RespValue::Array(vec![RespValue::BulkString(key.clone()), resp]),
                            outcome,
                        ));
                    }
                }
                return Ok((RespValue::NullArray, WriteOutcome::DidNotWrite));
            }

            requeue_at_front = true;
            ctx.reacquire_locks_for_command().await?;
        }
    }

    /// Called by list push commands while the shard lock is held. Wakes the
    /// first live waiter for the key; at most one waiter wakes per push.
    pub fn notify_push(&self, key: &Bytes) {
        let Some(mut queue) = self.waiters.get_mut(key) else {
            return;
        };
        while let Some(info) = queue.pop_front() {
            let waker = info.waker.lock().unwrap().take();
            if let Some(waker) = waker
                && waker.send(()).is_ok()
            {
                return;
            }
            // Stale waiter (timed out or disconnected): drop it and try the next.
        }
    }

    /// Removes all wakers for a session upon client disconnection.
    pub fn remove_waiters_for_session(&self, session_id: u64) {
        self.waiters.iter_mut().for_each(|mut queue| {
            queue.retain(|info| info.session_id != session_id);
        });
        self.waiters.retain(|_, queue| !queue.is_empty());
    }

    fn register(&self, keys: &[Bytes], session_id: u64, at_front: bool) -> Waiter {
        let (tx, rx) = oneshot::channel();
        let shared: SharedWaker = Arc::new(Mutex::new(Some(tx)));
        for key in keys {
            let info = WaiterInfo {
                session_id,
                waker: shared.clone(),
            };
            let mut queue = self.waiters.entry(key.clone()).or_default();
            if at_front {
                queue.push_front(info);
            } else {
                queue.push_back(info);
            }
        }
        Waiter { shared, rx }
    }

    fn unregister(&self, keys: &[Bytes], waiter: &Waiter) {
        for key in keys {
            if let Some(mut queue) = self.waiters.get_mut(key) {
                queue.retain(|info| !Arc::ptr_eq(&info.waker, &waiter.shared));
                if queue.is_empty() {
                    drop(queue);
                    self.waiters.remove(key);
                }
            }
        }
    }
}
