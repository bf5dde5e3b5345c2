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

//! Decides which RPC failures are worth another attempt.

use crate::error::Error;
use crate::error::rpc::Code;
use crate::options::RetryOptions;
use std::collections::HashSet;

/// The status codes retried regardless of configuration.
const ALWAYS_RETRYABLE: [Code; 3] = [Code::Unavailable, Code::Aborted, Code::Internal];

/// The outcome of classifying a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt may be retried, if the backoff schedule allows it.
    Retryable,
    /// The error is returned to the caller as-is.
    NonRetryable,
    /// The error already reports an exhausted retry chain.
    Exhausted,
    /// The error already reports a cancelled retry chain.
    Cancelled,
}

impl FailureKind {
    /// Returns true if no further attempts should be made.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retryable)
    }
}

/// Maps RPC failures to a [FailureKind].
///
/// The set of retryable codes is computed once, from the [RetryOptions].
///
/// # Example
/// ```
/// # use google_cloud_bigtable::classifier::*;
/// # use google_cloud_bigtable::error::{Error, rpc::{Code, Status}};
/// # use google_cloud_bigtable::options::RetryOptions;
/// let options = RetryOptions::builder()
///     .with_retry_on_deadline_exceeded(false)
///     .build()?;
/// let classifier = FailureClassifier::new(&options);
/// let error = Error::service(Status::default().set_code(Code::DeadlineExceeded));
/// assert_eq!(classifier.classify(&error), FailureKind::NonRetryable);
/// # Ok::<(), google_cloud_bigtable::options::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct FailureClassifier {
    enabled: bool,
    retryable: HashSet<Code>,
}

impl FailureClassifier {
    pub fn new(options: &RetryOptions) -> Self {
        let mut retryable = HashSet::from(ALWAYS_RETRYABLE);
        if options.retry_on_deadline_exceeded() {
            retryable.insert(Code::DeadlineExceeded);
        }
        Self {
            enabled: options.enable_retries(),
            retryable,
        }
    }

    /// Classifies the failure of a single attempt.
    pub fn classify(&self, error: &Error) -> FailureKind {
        if error.is_exhausted() {
            return FailureKind::Exhausted;
        }
        if error.is_cancelled() {
            return FailureKind::Cancelled;
        }
        if !self.enabled {
            return FailureKind::NonRetryable;
        }
        match error.status() {
            Some(status) if self.retryable.contains(&status.code) => FailureKind::Retryable,
            _ => FailureKind::NonRetryable,
        }
    }

    /// Returns true if `code` is in the retryable set.
    ///
    /// This ignores whether retries are enabled.
    pub fn is_retryable_code(&self, code: Code) -> bool {
        self.retryable.contains(&code)
    }
}
