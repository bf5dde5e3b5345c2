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

//! A clock and sleeper pair where sleeping advances the clock.
//!
//! Retry chains using these never wait on the wall clock, yet their backoff
//! schedules observe the full simulated elapsed time.

use crate::Result;
use crate::clock::Clock;
use crate::error::Error;
use crate::sleeper::Sleeper;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A [Clock] that only moves when told to.
#[derive(Debug, Default)]
pub struct VirtualClock {
    nanos: AtomicU64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(delta))
            });
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// A [Sleeper] that returns immediately after advancing a [VirtualClock].
#[derive(Debug)]
pub struct VirtualSleeper {
    clock: Arc<VirtualClock>,
    sleeps: Mutex<Vec<Duration>>,
    cancel: CancellationToken,
}

impl VirtualSleeper {
    pub fn new(clock: Arc<VirtualClock>) -> Self {
        Self::with_cancellation(clock, CancellationToken::new())
    }

    /// Creates a sleeper that fails with [Error::cancelled] once `cancel` is
    /// cancelled. A cancelled sleep does not advance the clock.
    pub fn with_cancellation(clock: Arc<VirtualClock>, cancel: CancellationToken) -> Self {
        Self {
            clock,
            sleeps: Mutex::new(Vec::new()),
            cancel,
        }
    }

    pub fn clock(&self) -> Arc<VirtualClock> {
        self.clock.clone()
    }

    /// The delays of all completed sleeps, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("never poisoned").clone()
    }

    /// The sum of all completed sleeps.
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Sleeper for VirtualSleeper {
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, Result<()>> {
        let result = if self.cancel.is_cancelled() {
            Err(Error::cancelled("virtual sleep cancelled"))
        } else {
            self.sleeps.lock().expect("never poisoned").push(delay);
            self.clock.advance(delay);
            Ok(())
        };
        Box::pin(futures::future::ready(result))
    }
}
