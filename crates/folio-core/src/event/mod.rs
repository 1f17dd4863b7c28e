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

//! Diagnostic side channel of the loading services.
//!
//! Counter updates are authoritative only through the aggregator's queries and
//! signals. Everything published here is informational: a host may log it,
//! show it in a debug overlay, or ignore it entirely. The [`EventBus`] is
//! bounded, so ignoring it costs a fixed amount of memory. It is kept generic
//! so that other crates can reuse it for their own event types.

mod bus;
mod loading;

pub use self::bus::{EventBus, DEFAULT_CAPACITY};
pub use self::loading::LoadingEvent;
