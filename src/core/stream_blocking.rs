// src/core/stream_blocking.rs

//! Manages clients blocked on `XREAD BLOCK`.
//!
//! Unlike list pops, a stream read is not destructive, so an append wakes
//! every waiter on the key; each woken reader re-reads the stream from its
//! frozen start id.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;

type SharedWaker = Arc<Mutex<Option<oneshot::Sender<()>>>>;

#[derive(Clone, Debug)]
struct StreamWaiterInfo {
    session_id: u64,
    waker: SharedWaker,
}

/// One registered stream wait, held by the blocked task itself.
#[derive(Debug)]
pub struct StreamWaiter {
    shared: SharedWaker,
    rx: oneshot::Receiver<()>,
}

impl StreamWaiter {
    /// Parks until an append lands on one of the registered keys or the
    /// deadline passes. Returns `true` when a wake signal arrived.
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

/// Manages all clients currently blocked on stream reads.
#[derive(Debug, Default)]
pub struct StreamBlockerManager {
    waiters: DashMap<Bytes, Vec<StreamWaiterInfo>>,
}

impl StreamBlockerManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers one waiter across all requested stream keys. Must be called
    /// while the shard locks are still held, so an append cannot race the
    /// registration.
    pub fn register(&self, keys: &[Bytes], session_id: u64) -> StreamWaiter {
        let (tx, rx) = oneshot::channel();
        let shared: SharedWaker = Arc::new(Mutex::new(Some(tx)));
        for key in keys {
            self.waiters
                .entry(key.clone())
                .or_default()
                .push(StreamWaiterInfo {
                    session_id,
                    waker: shared.clone(),
                });
        }
        StreamWaiter { shared, rx }
    }

    pub fn unregister(&self, keys: &[Bytes], waiter: &StreamWaiter) {
        for key in keys {
            if let Some(mut list) = self.waiters.get_mut(key) {
                list.retain(|info| !Arc::ptr_eq(&info.waker, &waiter.shared));
                if list.is_empty() {
                    drop(list);
                    self.waiters.remove(key);
                }
            }
        }
    }

    /// Called by `XADD` while the shard lock is held: wakes every waiter on
    /// the key.
    pub fn notify_append(&self, key: &Bytes) {
        if let Some(mut list) = self.waiters.get_mut(key) {
            for info in list.drain(..) {
                if let Some(waker) = info.waker.lock().unwrap().take() {
                    let _ = waker.send(());
                }
            }
        }
    }

    /// Removes all wakers for a session upon client disconnection.
    pub fn remove_waiters_for_session(&self, session_id: u64) {
        self.waiters.iter_mut().for_each(|mut list| {
            list.retain(|info| info.session_id != session_id);
        });
        self.waiters.retain(|_, list| !list.is_empty());
    }
}
