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

//! Last-value-cached observables.
//!
//! A [`Signal`] is a one-writer, many-reader cell: every emission is delivered
//! synchronously to all current subscribers, and a new subscriber immediately
//! receives the cached value ("replay one"). Subscribers are plain
//! [`flume::Receiver`]s, so a consumer can poll them from a render loop or
//! block on them from a worker thread.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The observable loading flag of a pool.
///
/// `Unknown` until any activity was recorded, then `Loading` while units are
/// outstanding and `Idle` once drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriState {
    /// Nothing has been recorded yet.
    #[default]
    Unknown,
    /// At least one unit is outstanding.
    Loading,
    /// The pool has drained.
    Idle,
}

impl TriState {
    /// Returns `None` for `Unknown`, else whether the state is `Loading`.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            TriState::Unknown => None,
            TriState::Loading => Some(true),
            TriState::Idle => Some(false),
        }
    }

    /// Returns `true` only for `Loading`.
    pub fn is_loading(self) -> bool {
        self == TriState::Loading
    }
}

impl From<bool> for TriState {
    fn from(loading: bool) -> Self {
        if loading {
            TriState::Loading
        } else {
            TriState::Idle
        }
    }
}

/// The signal type exposed per loader and for the aggregate.
pub type LoadingSignal = Signal<TriState>;

struct SignalInner<T> {
    value: T,
    subscribers: Vec<flume::Sender<T>>,
}

/// A cheaply clonable handle to a replay-one broadcast cell.
///
/// Clones share the same value and subscriber list.
pub struct Signal<T: Clone + Send + 'static> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Creates a signal holding `initial` with no subscribers.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                value: initial,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalInner<T>> {
        // Every write is a single assignment, so a poisoned cell is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the last emitted value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Stores `value` and delivers it to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned on the way.
    pub fn emit(&self, value: T) {
        let mut inner = self.lock();
        inner.value = value;
        let SignalInner { value, subscribers } = &mut *inner;
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Registers a new subscriber; the current value is queued on it first.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (tx, rx) = flume::unbounded();
        let mut inner = self.lock();
        // The receiver is alive in this scope, so this send cannot fail.
        let _ = tx.send(inner.value.clone());
        inner.subscribers.push(tx);
        rx
    }

    /// Returns the number of subscribers that were alive at the last emission.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Signal")
            .field("value", &inner.value)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;

    #[test]
    fn new_subscriber_replays_cached_value() {
        let signal = LoadingSignal::default();
        assert_eq!(signal.get(), TriState::Unknown);

        signal.emit(TriState::Loading);
        let rx = signal.subscribe();
        assert_eq!(rx.try_recv(), Ok(TriState::Loading));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn emission_reaches_every_subscriber_in_order() {
        let signal = LoadingSignal::default();
        let a = signal.subscribe();
        let b = signal.subscribe();

        signal.emit(TriState::Loading);
        signal.emit(TriState::Idle);

        let seen_a: Vec<_> = a.try_iter().collect();
        let seen_b: Vec<_> = b.try_iter().collect();
        let expected = vec![TriState::Unknown, TriState::Loading, TriState::Idle];
        assert_eq!(seen_a, expected);
        assert_eq!(seen_b, expected);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let signal = Signal::new(0u32);
        let kept = signal.subscribe();
        let dropped = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 2);

        drop(dropped);
        signal.emit(1);
        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(kept.try_iter().last(), Some(1));
    }

    #[test]
    fn clones_share_state() {
        let signal = Signal::new(TriState::Unknown);
        let clone = signal.clone();
        clone.emit(TriState::Idle);
        assert_eq!(signal.get(), TriState::Idle);
    }

    #[test]
    fn tri_state_bool_conversions() {
        assert_eq!(TriState::from(true), TriState::Loading);
        assert_eq!(TriState::from(false), TriState::Idle);
        assert_eq!(TriState::Unknown.as_bool(), None);
        assert_eq!(TriState::Idle.as_bool(), Some(false));
        assert!(TriState::Loading.is_loading());
        assert!(!TriState::Unknown.is_loading());
    }
}
