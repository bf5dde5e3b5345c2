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

//! Resubmits failed RPCs under an exponential backoff schedule.
//!
//! A retry chain starts with one attempt of a [RetryableRpc]. Every failed
//! attempt is handed to [Fallback::on_failure], which either returns the
//! failure to the caller, or waits for the next delay in the
//! [BackoffSchedule] and submits the RPC again. Each attempt follows the
//! same sequence:
//!
//! 1. classify the failure,
//! 2. query the backoff schedule,
//! 3. sleep,
//! 4. submit the RPC.
//!
//! Most applications should use [Fallback::call], which runs the whole chain
//! and returns its single terminal outcome.
//!
//! # Example
//! ```
//! # use google_cloud_bigtable::Result;
//! # use google_cloud_bigtable::error::{Error, rpc::{Code, Status}};
//! # use google_cloud_bigtable::options::RetryOptions;
//! # use google_cloud_bigtable::retry_fallback::RetryFallback;
//! # use google_cloud_bigtable::retryable_rpc::RetryableRpc;
//! #[derive(Debug)]
//! struct MutateRow;
//! impl RetryableRpc for MutateRow {
//!     type Request = String;
//!     type Response = ();
//!     async fn submit(&self, _request: &String) -> Result<()> {
//!         Err(Error::service(Status::default().set_code(Code::PermissionDenied)))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let rpc = MutateRow;
//! let request = "row-key".to_string();
//! let mut fallback = RetryFallback::create(RetryOptions::default(), request.clone(), MutateRow);
//! let mut result = rpc.submit(&request).await;
//! while let Err(e) = result {
//!     if e.status().is_some_and(|s| s.code == Code::PermissionDenied) {
//!         println!("not retried: {e}");
//!         break;
//!     }
//!     result = fallback.on_failure(e).await;
//! }
//! # });
//! ```

use crate::Result;
use crate::backoff::{BackoffSchedule, NextDelay};
use crate::classifier::{FailureClassifier, FailureKind};
use crate::clock::{Clock, SystemClock};
use crate::error::Error;
use crate::options::RetryOptions;
use crate::retryable_rpc::RetryableRpc;
use crate::sleeper::{Sleeper, TokioSleeper};
use std::sync::Arc;

/// Creates [Fallback] instances.
#[derive(Clone, Copy, Debug)]
pub struct RetryFallback;

impl RetryFallback {
    /// Creates a fallback for one retry chain, using the system clock and a
    /// [TokioSleeper] that is never cancelled.
    ///
    /// The backoff schedule starts when this function is called.
    pub fn create<R: RetryableRpc>(
        options: RetryOptions,
        request: R::Request,
        rpc: R,
    ) -> Fallback<R> {
        Self::builder(options, request, rpc).build()
    }

    /// Returns a builder to inject the [Clock] and [Sleeper].
    ///
    /// # Example
    /// ```
    /// # use google_cloud_bigtable::Result;
    /// # use google_cloud_bigtable::options::RetryOptions;
    /// # use google_cloud_bigtable::retry_fallback::RetryFallback;
    /// # use google_cloud_bigtable::retryable_rpc::RetryableRpc;
    /// # use google_cloud_bigtable::sleeper::TokioSleeper;
    /// use std::sync::Arc;
    /// use tokio_util::sync::CancellationToken;
    /// # #[derive(Debug)]
    /// # struct ReadRow;
    /// # impl RetryableRpc for ReadRow {
    /// #     type Request = String;
    /// #     type Response = String;
    /// #     async fn submit(&self, request: &String) -> Result<String> { Ok(request.clone()) }
    /// # }
    /// let token = CancellationToken::new();
    /// let fallback = RetryFallback::builder(RetryOptions::default(), "row-key".to_string(), ReadRow)
    ///     .with_sleeper(Arc::new(TokioSleeper::with_cancellation(token.clone())))
    ///     .build();
    /// ```
    pub fn builder<R: RetryableRpc>(
        options: RetryOptions,
        request: R::Request,
        rpc: R,
    ) -> FallbackBuilder<R> {
        FallbackBuilder {
            options,
            request,
            rpc,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper::new()),
        }
    }
}

/// Configures the time sources of a [Fallback].
pub struct FallbackBuilder<R: RetryableRpc> {
    options: RetryOptions,
    request: R::Request,
    rpc: R,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl<R: RetryableRpc> FallbackBuilder<R> {
    /// Sets the clock observed by the backoff schedule.
    pub fn with_clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.clock = v;
        self
    }

    /// Sets the sleeper used between attempts.
    pub fn with_sleeper(mut self, v: Arc<dyn Sleeper>) -> Self {
        self.sleeper = v;
        self
    }

    /// Creates the [Fallback], starting its backoff schedule.
    pub fn build(self) -> Fallback<R> {
        Fallback {
            classifier: FailureClassifier::new(&self.options),
            schedule: BackoffSchedule::new(&self.options, self.clock),
            sleeper: self.sleeper,
            request: self.request,
            rpc: self.rpc,
            attempts: 0,
        }
    }
}

impl<R: RetryableRpc> std::fmt::Debug for FallbackBuilder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackBuilder")
            .field("options", &self.options)
            .field("rpc", &self.rpc)
            .field("clock", &self.clock)
            .field("sleeper", &self.sleeper)
            .finish_non_exhaustive()
    }
}

/// The state of one retry chain.
///
/// A `Fallback` owns the request, the RPC, and the backoff schedule of a
/// single chain. Every retry re-enters the same `Fallback`, so the chain
/// never nests continuations. Taking `&mut self` guarantees at most one
/// attempt is in flight.
pub struct Fallback<R: RetryableRpc> {
    request: R::Request,
    rpc: R,
    schedule: BackoffSchedule,
    classifier: FailureClassifier,
    sleeper: Arc<dyn Sleeper>,
    attempts: u32,
}

impl<R: RetryableRpc> Fallback<R> {
    /// Handles the failure of the previous attempt.
    ///
    /// Returns `error` unchanged if it is not retryable. Returns an error
    /// created with [Error::exhausted] if the backoff schedule ran out of
    /// time, and the error from the [Sleeper] if the wait is cancelled.
    /// Otherwise waits for the next delay and returns the result of a new
    /// attempt. If that attempt fails the caller may call `on_failure()`
    /// again.
    pub async fn on_failure(&mut self, error: Error) -> Result<R::Response> {
        match self.next_attempt(error).await {
            Step::Attempt(result) => result,
            Step::Terminal(e) => Err(e),
        }
    }

    /// Runs the whole chain: the initial attempt and every retry.
    ///
    /// The returned value is the first successful response, or the terminal
    /// error of the chain.
    pub async fn call(mut self) -> Result<R::Response> {
        let mut result = self.rpc.submit(&self.request).await;
        loop {
            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            result = match self.next_attempt(error).await {
                Step::Attempt(r) => r,
                Step::Terminal(e) => return Err(e),
            };
        }
    }

    /// The number of retries submitted so far, not counting the initial
    /// attempt.
    pub fn retry_count(&self) -> u32 {
        self.attempts
    }

    /// The backoff schedule of this chain.
    pub fn backoff(&self) -> &BackoffSchedule {
        &self.schedule
    }

    async fn next_attempt(&mut self, error: Error) -> Step<R::Response> {
        let kind = self.classifier.classify(&error);
        if kind.is_terminal() {
            return Step::Terminal(error);
        }
        let delay = match self.schedule.next_delay() {
            NextDelay::Delay(d) => d,
            NextDelay::Stop => {
                tracing::warn!(
                    retries = self.attempts,
                    elapsed_ms = self.schedule.elapsed().as_millis() as u64,
                    "giving up after retryable error: {error}"
                );
                return Step::Terminal(Error::exhausted(error));
            }
        };
        self.attempts += 1;
        let code = error.status().map(|s| s.code).unwrap_or_default();
        tracing::debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            code = %code,
            "retrying rpc"
        );
        if let Err(e) = self.sleeper.sleep(delay).await {
            tracing::warn!(attempt = self.attempts, "retry wait interrupted: {e}");
            return Step::Terminal(e);
        }
        Step::Attempt(self.rpc.submit(&self.request).await)
    }
}

impl<R: RetryableRpc> std::fmt::Debug for Fallback<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fallback")
            .field("rpc", &self.rpc)
            .field("schedule", &self.schedule)
            .field("classifier", &self.classifier)
            .field("sleeper", &self.sleeper)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

enum Step<T> {
    /// The chain ended, do not re-enter with this error.
    Terminal(Error),
    /// The result of a new attempt.
    Attempt(Result<T>),
}
