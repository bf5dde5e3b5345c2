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

//! Exponential backoff bounded by elapsed time.
//!
//! Retry strategies should avoid immediately retrying an RPC, as the service
//! may need time to recover. [Exponential backoff] is a well known algorithm to
//! find an acceptable delay between retries.
//!
//! The schedule in this module never stops based on the number of attempts.
//! It stops once the time elapsed since the schedule was created, as observed
//! through a [Clock], reaches the configured maximum. Tests drive the clock
//! from their sleeper to simulate the passage of time.
//!
//! # Example
//! ```
//! # use google_cloud_bigtable::backoff::*;
//! # use google_cloud_bigtable::clock::SystemClock;
//! # use google_cloud_bigtable::options::RetryOptions;
//! use std::sync::Arc;
//! use std::time::Duration;
//! let options = RetryOptions::builder()
//!     .with_initial_backoff_millis(100_u64)
//!     .with_backoff_multiplier(3.0)
//!     .build()?;
//! let mut schedule = BackoffSchedule::new(&options, Arc::new(SystemClock));
//! assert_eq!(schedule.next_delay(), NextDelay::Delay(Duration::from_millis(100)));
//! assert_eq!(schedule.next_delay(), NextDelay::Delay(Duration::from_millis(300)));
//! # Ok::<(), google_cloud_bigtable::options::Error>(())
//! ```
//!
//! [Exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff

use crate::clock::Clock;
use crate::options::RetryOptions;
use std::sync::Arc;
use std::time::Duration;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// The result of querying a [BackoffSchedule].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextDelay {
    /// Wait this long before the next attempt. Always at least 1ms.
    Delay(Duration),
    /// The schedule ran out of time, no more attempts should be made.
    Stop,
}

impl NextDelay {
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// The backoff schedule for a single retry chain.
///
/// The schedule is created when the chain starts and captures the start time
/// from its [Clock]. Each call to [next_delay][BackoffSchedule::next_delay]
/// returns the current delay and then grows it by the backoff multiplier.
/// The `k`-th delay is `initial_backoff_millis * backoff_multiplier^k`,
/// truncated to whole milliseconds.
#[derive(Debug)]
pub struct BackoffSchedule {
    clock: Arc<dyn Clock>,
    start_nanos: u64,
    current_delay: f64,
    multiplier: f64,
    max_elapsed_nanos: u64,
    jitter: f64,
}

impl BackoffSchedule {
    /// Creates a schedule starting now, as reported by `clock`.
    pub fn new(options: &RetryOptions, clock: Arc<dyn Clock>) -> Self {
        let start_nanos = clock.now();
        Self {
            clock,
            start_nanos,
            current_delay: options.initial_backoff_millis() as f64,
            multiplier: options.backoff_multiplier(),
            max_elapsed_nanos: options
                .max_elapsed_backoff_millis()
                .saturating_mul(NANOS_PER_MILLI),
            jitter: options.jitter(),
        }
    }

    /// Returns the delay before the next attempt, or [NextDelay::Stop] if the
    /// schedule has run out of time.
    pub fn next_delay(&mut self) -> NextDelay {
        self.next_delay_with_rng(&mut rand::rng())
    }

    /// The delay returned by the next call to `next_delay()`, before jitter.
    pub fn current_delay_millis(&self) -> u64 {
        // Float to int casts saturate, so a long schedule tops out at u64::MAX.
        self.current_delay as u64
    }

    /// The time elapsed since the schedule was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos())
    }

    fn elapsed_nanos(&self) -> u64 {
        self.clock.now().saturating_sub(self.start_nanos)
    }

    fn next_delay_with_rng(&mut self, rng: &mut impl rand::Rng) -> NextDelay {
        if self.elapsed_nanos() >= self.max_elapsed_nanos {
            return NextDelay::Stop;
        }
        let delay = self.with_jitter(self.current_delay_millis(), rng);
        self.current_delay *= self.multiplier;
        NextDelay::Delay(Duration::from_millis(delay))
    }

    fn with_jitter(&self, delay_millis: u64, rng: &mut impl rand::Rng) -> u64 {
        if self.jitter == 0.0 {
            return delay_millis;
        }
        let factor = rng.random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        std::cmp::max(1, (delay_millis as f64 * factor) as u64)
    }
}
