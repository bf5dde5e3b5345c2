// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the time source used by backoff schedules.
//!
//! The backoff schedule decides when to stop based on the time elapsed since
//! the retry chain started. Reading that time through a trait lets tests
//! replace the wall clock with a virtual one.

use std::sync::OnceLock;
use std::time::Instant;

/// A monotonic time source with nanosecond resolution.
///
/// The values returned by `now()` are only meaningful relative to each other.
/// Implementations must never return a value smaller than a previous one.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current time, in nanoseconds since an arbitrary epoch.
    fn now(&self) -> u64;
}

/// The production [Clock], backed by [Instant].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        // u64 nanoseconds cover more than 500 years of process uptime.
        epoch.elapsed().as_nanos() as u64
    }
}
