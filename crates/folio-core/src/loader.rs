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

//! Identifiers for logical loading pools.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{self, Display};

/// The name of a logical pool of resources ("loader").
///
/// Every unit registered against a loader must complete before the UI region
/// waiting on that loader is considered ready. The set of loaders is fixed when
/// an aggregator is built; identifiers are compared by their string content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderId(Cow<'static, str>);

impl LoaderId {
    /// The primary page pool. Gates the splash screen by default.
    pub const MAIN: LoaderId = LoaderId::from_static("MAIN");
    /// The pool tracking translated text strings.
    pub const TEXTS: LoaderId = LoaderId::from_static("TEXTS");

    /// Creates a loader identifier from a static name, usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a loader identifier from any owned or borrowed name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the loader name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for LoaderId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for LoaderId {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}
