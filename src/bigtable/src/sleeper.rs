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

//! Defines how the retry core waits between attempts.
//!
//! The wait between attempts is the only suspension point in a retry chain.
//! It is also where cancellation of the surrounding activity is observed.

use crate::Result;
use crate::error::Error;
use futures::future::BoxFuture;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Suspends the current retry chain.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    /// Waits for at least `delay`.
    ///
    /// Returns an error created with [Error::cancelled] if the surrounding
    /// activity is cancelled before the delay elapses.
    ///
    /// The returned future does not borrow the sleeper.
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, Result<()>>;
}

/// The production [Sleeper], backed by [tokio::time::sleep].
///
/// # Example
/// ```
/// # use google_cloud_bigtable::sleeper::*;
/// use tokio_util::sync::CancellationToken;
/// use std::time::Duration;
/// # tokio_test::block_on(async {
/// let token = CancellationToken::new();
/// let sleeper = TokioSleeper::with_cancellation(token.clone());
/// token.cancel();
/// let err = sleeper.sleep(Duration::from_secs(3600)).await.unwrap_err();
/// assert!(err.is_cancelled());
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct TokioSleeper {
    cancel: CancellationToken,
}

impl TokioSleeper {
    /// Creates a sleeper that is never cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sleeper that stops waiting once `cancel` is cancelled.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, Result<()>> {
        let cancel = self.cancel.clone();
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::cancelled("interrupted while waiting for the next attempt")),
                _ = tokio::time::sleep(delay) => Ok(()),
            }
        })
    }
}
