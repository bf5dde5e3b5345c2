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

//! Retry configuration for Bigtable RPCs.
//!
//! [RetryOptions] controls whether failed RPCs are retried, which status codes
//! are considered transient, and the exponential backoff schedule used between
//! attempts. The options are immutable once built and may be shared freely
//! between RPC chains.
//!
//! # Example
//! ```
//! # use google_cloud_bigtable::options::*;
//! let options = RetryOptions::builder()
//!     .with_initial_backoff_millis(10)
//!     .with_backoff_multiplier(1.5)
//!     .with_max_elapsed_backoff_millis(30_000)
//!     .build()?;
//! assert_eq!(options.initial_backoff_millis(), 10);
//! # Ok::<(), Error>(())
//! ```

use serde::{Deserialize, Serialize};

/// Retries are enabled unless the application turns them off.
pub const DEFAULT_ENABLE_RETRIES: bool = true;

/// `DEADLINE_EXCEEDED` is retried by default.
pub const DEFAULT_RETRY_ON_DEADLINE_EXCEEDED: bool = true;

/// The first delay in the backoff schedule.
pub const DEFAULT_INITIAL_BACKOFF_MILLIS: u64 = 5;

/// The growth factor of the backoff schedule.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// The total time budget for a retry chain.
pub const DEFAULT_MAX_ELAPSED_BACKOFF_MILLIS: u64 = 60 * 1000;

/// The number of rows buffered by streaming scanners.
pub const DEFAULT_STREAMING_BUFFER_SIZE: usize = 60;

/// How long a streaming scanner waits for the rest of a partial row.
pub const DEFAULT_READ_PARTIAL_ROW_TIMEOUT_MS: u64 = 60 * 1000;

/// Backoff delays are deterministic by default.
pub const DEFAULT_JITTER: f64 = 0.0;

/// The error type for [RetryOptions] creation.
#[derive(thiserror::Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("the initial backoff ({0}ms) should be at least 1ms")]
    InvalidInitialBackoff(u64),
    #[error("the backoff multiplier ({0}) should be a finite value > 1.0")]
    InvalidMultiplier(f64),
    #[error(
        "the maximum elapsed backoff ({maximum}ms) should be zero or greater than or equal to the initial backoff ({initial}ms)"
    )]
    EmptyRange { maximum: u64, initial: u64 },
    #[error("the jitter ({0}) should be in the [0.0, 1.0) range")]
    InvalidJitter(f64),
}

/// Immutable retry configuration.
///
/// The `streaming_buffer_size` and `read_partial_row_timeout_ms` fields are
/// carried for the streaming scanners. The retry core ignores them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryOptionsBuilder", into = "RetryOptionsBuilder")]
pub struct RetryOptions {
    enable_retries: bool,
    retry_on_deadline_exceeded: bool,
    initial_backoff_millis: u64,
    backoff_multiplier: f64,
    max_elapsed_backoff_millis: u64,
    streaming_buffer_size: usize,
    read_partial_row_timeout_ms: u64,
    jitter: f64,
}

impl RetryOptions {
    /// Creates validated options from the positional fields.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_bigtable::options::*;
    /// let options = RetryOptions::new(
    ///     true,
    ///     false,
    ///     DEFAULT_INITIAL_BACKOFF_MILLIS,
    ///     DEFAULT_BACKOFF_MULTIPLIER,
    ///     DEFAULT_MAX_ELAPSED_BACKOFF_MILLIS,
    ///     DEFAULT_STREAMING_BUFFER_SIZE,
    ///     DEFAULT_READ_PARTIAL_ROW_TIMEOUT_MS,
    /// )?;
    /// assert!(!options.retry_on_deadline_exceeded());
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new(
        enable_retries: bool,
        retry_on_deadline_exceeded: bool,
        initial_backoff_millis: u64,
        backoff_multiplier: f64,
        max_elapsed_backoff_millis: u64,
        streaming_buffer_size: usize,
        read_partial_row_timeout_ms: u64,
    ) -> Result<Self, Error> {
        RetryOptionsBuilder::new()
            .with_enable_retries(enable_retries)
            .with_retry_on_deadline_exceeded(retry_on_deadline_exceeded)
            .with_initial_backoff_millis(initial_backoff_millis)
            .with_backoff_multiplier(backoff_multiplier)
            .with_max_elapsed_backoff_millis(max_elapsed_backoff_millis)
            .with_streaming_buffer_size(streaming_buffer_size)
            .with_read_partial_row_timeout_ms(read_partial_row_timeout_ms)
            .build()
    }

    /// Returns a builder initialized with the default values.
    pub fn builder() -> RetryOptionsBuilder {
        RetryOptionsBuilder::new()
    }

    /// If false, every failure is terminal.
    pub fn enable_retries(&self) -> bool {
        self.enable_retries
    }

    /// If true, `DEADLINE_EXCEEDED` is a retryable status code.
    pub fn retry_on_deadline_exceeded(&self) -> bool {
        self.retry_on_deadline_exceeded
    }

    /// The first delay in the backoff schedule.
    pub fn initial_backoff_millis(&self) -> u64 {
        self.initial_backoff_millis
    }

    /// The multiplicative growth of the delay after each attempt.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// The elapsed time after which the backoff schedule stops.
    pub fn max_elapsed_backoff_millis(&self) -> u64 {
        self.max_elapsed_backoff_millis
    }

    pub fn streaming_buffer_size(&self) -> usize {
        self.streaming_buffer_size
    }

    pub fn read_partial_row_timeout_ms(&self) -> u64 {
        self.read_partial_row_timeout_ms
    }

    /// The randomization factor applied to each delay, `0.0` disables jitter.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            enable_retries: DEFAULT_ENABLE_RETRIES,
            retry_on_deadline_exceeded: DEFAULT_RETRY_ON_DEADLINE_EXCEEDED,
            initial_backoff_millis: DEFAULT_INITIAL_BACKOFF_MILLIS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_elapsed_backoff_millis: DEFAULT_MAX_ELAPSED_BACKOFF_MILLIS,
            streaming_buffer_size: DEFAULT_STREAMING_BUFFER_SIZE,
            read_partial_row_timeout_ms: DEFAULT_READ_PARTIAL_ROW_TIMEOUT_MS,
            jitter: DEFAULT_JITTER,
        }
    }
}

/// A builder for [RetryOptions].
///
/// This is also the serialized form of the options, so applications can keep
/// the retry configuration in their own configuration files. Missing fields
/// take the default values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryOptionsBuilder {
    enable_retries: bool,
    retry_on_deadline_exceeded: bool,
    initial_backoff_millis: u64,
    backoff_multiplier: f64,
    max_elapsed_backoff_millis: u64,
    streaming_buffer_size: usize,
    read_partial_row_timeout_ms: u64,
    jitter: f64,
}

impl RetryOptionsBuilder {
    /// Creates a builder with the default parameters.
    pub fn new() -> Self {
        let defaults = RetryOptions::default();
        Self::from(defaults)
    }

    pub fn with_enable_retries(mut self, v: bool) -> Self {
        self.enable_retries = v;
        self
    }

    pub fn with_retry_on_deadline_exceeded(mut self, v: bool) -> Self {
        self.retry_on_deadline_exceeded = v;
        self
    }

    pub fn with_initial_backoff_millis(mut self, v: u64) -> Self {
        self.initial_backoff_millis = v;
        self
    }

    pub fn with_backoff_multiplier<V: Into<f64>>(mut self, v: V) -> Self {
        self.backoff_multiplier = v.into();
        self
    }

    pub fn with_max_elapsed_backoff_millis(mut self, v: u64) -> Self {
        self.max_elapsed_backoff_millis = v;
        self
    }

    pub fn with_streaming_buffer_size(mut self, v: usize) -> Self {
        self.streaming_buffer_size = v;
        self
    }

    pub fn with_read_partial_row_timeout_ms(mut self, v: u64) -> Self {
        self.read_partial_row_timeout_ms = v;
        self
    }

    /// Randomizes each delay by up to `v` of its value, in both directions.
    pub fn with_jitter<V: Into<f64>>(mut self, v: V) -> Self {
        self.jitter = v.into();
        self
    }

    /// Creates validated [RetryOptions].
    ///
    /// # Example
    /// ```
    /// # use google_cloud_bigtable::options::*;
    /// let err = RetryOptions::builder().with_backoff_multiplier(0.5).build();
    /// assert!(matches!(err, Err(Error::InvalidMultiplier(_))));
    /// ```
    pub fn build(self) -> Result<RetryOptions, Error> {
        if self.initial_backoff_millis == 0 {
            return Err(Error::InvalidInitialBackoff(self.initial_backoff_millis));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return Err(Error::InvalidMultiplier(self.backoff_multiplier));
        }
        if self.max_elapsed_backoff_millis != 0
            && self.max_elapsed_backoff_millis < self.initial_backoff_millis
        {
            return Err(Error::EmptyRange {
                maximum: self.max_elapsed_backoff_millis,
                initial: self.initial_backoff_millis,
            });
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(Error::InvalidJitter(self.jitter));
        }
        Ok(RetryOptions {
            enable_retries: self.enable_retries,
            retry_on_deadline_exceeded: self.retry_on_deadline_exceeded,
            initial_backoff_millis: self.initial_backoff_millis,
            backoff_multiplier: self.backoff_multiplier,
            max_elapsed_backoff_millis: self.max_elapsed_backoff_millis,
            streaming_buffer_size: self.streaming_buffer_size,
            read_partial_row_timeout_ms: self.read_partial_row_timeout_ms,
            jitter: self.jitter,
        })
    }
}

impl Default for RetryOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::convert::From<RetryOptions> for RetryOptionsBuilder {
    fn from(value: RetryOptions) -> Self {
        Self {
            enable_retries: value.enable_retries,
            retry_on_deadline_exceeded: value.retry_on_deadline_exceeded,
            initial_backoff_millis: value.initial_backoff_millis,
            backoff_multiplier: value.backoff_multiplier,
            max_elapsed_backoff_millis: value.max_elapsed_backoff_millis,
            streaming_buffer_size: value.streaming_buffer_size,
            read_partial_row_timeout_ms: value.read_partial_row_timeout_ms,
            jitter: value.jitter,
        }
    }
}

impl std::convert::TryFrom<RetryOptionsBuilder> for RetryOptions {
    type Error = Error;
    fn try_from(value: RetryOptionsBuilder) -> Result<Self, Self::Error> {
        value.build()
    }
}
