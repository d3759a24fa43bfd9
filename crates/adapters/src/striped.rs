// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Striped connection storage for adapters whose clients are not
//! internally pooled (raw sockets, WebSocket streams).
//!
//! A fixed number of slots, each behind its own async mutex, handed out
//! round-robin. Under `parallels <= slots` workers effectively get a
//! private connection; beyond that they share with minimal contention.
//! A slot holding `None` signals a dead connection the adapter must
//! re-establish on next checkout.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

pub(crate) struct Striped<T> {
    slots: Vec<Mutex<Option<T>>>,
    next: AtomicUsize,
}

impl<T> Striped<T> {
    /// Creates `size` empty slots (`size` is clamped to at least one).
    pub(crate) fn new(size: usize) -> Self {
        Striped {
            slots: (0..size.max(1)).map(|_| Mutex::new(None)).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Returns the next slot in round-robin order.
    pub(crate) fn slot(&self) -> &Mutex<Option<T>> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        &self.slots[index]
    }

    /// Iterates over every slot, e.g. to connect or close them all.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Mutex<Option<T>>> {
        self.slots.iter()
    }

    /// Number of slots.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
