// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use flume::TrySendError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of events an [`EventBus`] holds before evicting the oldest ones.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A generic, thread-safe diagnostic channel.
///
/// The bus owns both ends of a bounded channel. When nobody drains it, the
/// oldest events are evicted to make room, so an unconsumed bus costs at
/// most `capacity` events. Clones of the bus share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone + Send + Sync + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
    capacity: usize,
    dropped: Arc<AtomicUsize>,
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Creates a new EventBus holding up to [`DEFAULT_CAPACITY`] events.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new EventBus holding up to `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = flume::bounded(capacity);
        log::debug!("Diagnostic event bus initialized (capacity {capacity}).");
        Self {
            sender,
            receiver,
            capacity,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publishes an event, evicting the oldest queued event if the bus is full.
    pub fn publish(&self, event: T) {
        // The bus holds a receiver, so the channel never disconnects.
        let Err(TrySendError::Full(event)) = self.sender.try_send(event) else {
            return;
        };

        if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
            log::warn!(
                "Diagnostic event bus is full ({} events), evicting the oldest ones.",
                self.capacity
            );
        }
        let _ = self.receiver.try_recv();
        if self.sender.try_send(event).is_err() {
            // Lost a race with another publisher.
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a clone of the sender end of the channel.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a clone of the receiver end of the channel.
    ///
    /// All receivers compete for the same queue: each event is delivered to
    /// exactly one of them.
    pub fn receiver(&self) -> flume::Receiver<T> {
        self.receiver.clone()
    }

    /// Removes and returns every event queued so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of events waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Maximum number of events the bus holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events evicted or lost because the bus was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
