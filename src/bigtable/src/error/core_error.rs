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

use super::rpc::Status;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The error returned by the retry core.
///
/// A failed RPC chain ends in exactly one of these errors. The service may
/// have returned a non-retryable status, the backoff schedule may have given
/// up on a retryable status, the activity waiting between attempts may have
/// been cancelled, or the RPC may have failed for reasons unrelated to the
/// transport.
///
/// # Example
/// ```
/// use google_cloud_bigtable::error::Error;
/// match example_function() {
///     Err(e) if e.is_exhausted() => { println!("gave up retrying: {e}"); },
///     Err(e) if matches!(e.status(), Some(_)) => {
///         println!("service error {e}, debug using {:?}", e.status().unwrap());
///     },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # use google_cloud_bigtable::error::rpc::{Code, Status};
///     # Err(Error::service(Status::default().set_code(Code::NotFound).set_message("NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error with the status returned by the service.
    ///
    /// # Example
    /// ```
    /// use google_cloud_bigtable::error::Error;
    /// use google_cloud_bigtable::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(Box::new(status)),
            source: None,
        }
    }

    /// Creates an error representing an exhausted backoff schedule.
    ///
    /// The `source` should be the last retryable error seen in the chain.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use google_cloud_bigtable::error::Error;
    /// let error = Error::exhausted("too many retry attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The RPC kept failing with retryable errors until the backoff schedule
    /// ran out of time.
    ///
    /// This is always a client-side generated error, but it is the result of
    /// one or more errors received from the service. The last of them is
    /// available via [source()][std::error::Error::source], and can be
    /// downcast to [Error] to query its [status][Error::status].
    ///
    /// # Troubleshooting
    ///
    /// The most common cause of this problem is a transient problem that lasts
    /// longer than the configured `max_elapsed_backoff_millis`. If your
    /// application can tolerate longer recovery times then extend it.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled wait between attempts.
    ///
    /// # Example
    /// ```
    /// use google_cloud_bigtable::error::Error;
    /// let error = Error::cancelled("shutting down");
    /// assert!(error.is_cancelled());
    /// ```
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: Some(source.into()),
        }
    }

    /// The activity containing the RPC chain was cancelled while waiting to
    /// make another attempt.
    ///
    /// No further attempts are made after this error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error unrelated to the RPC transport.
    ///
    /// These errors have no [Status] and are never retried.
    ///
    /// # Example
    /// ```
    /// use google_cloud_bigtable::error::Error;
    /// let error = Error::other("thrown");
    /// assert!(error.status().is_none());
    /// ```
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }

    /// The [Status] payload associated with this error.
    ///
    /// # Examples
    /// ```
    /// use google_cloud_bigtable::error::{Error, rpc::{Code, Status}};
    /// let error = Error::service(Status::default().set_code(Code::NotFound));
    /// if let Some(status) = error.status() {
    ///     if status.code == Code::NotFound {
    ///         println!("cannot find the table");
    ///     }
    /// }
    /// ```
    ///
    /// Only errors created from a service response have a status. Exhausted,
    /// cancelled, and other errors return `None`, even if their source has a
    /// status.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s.as_ref()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Service(s), _) => {
                write!(
                    f,
                    "the service reports an error with code {} described as: {}",
                    s.code, s.message
                )
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "rpc retries exhausted, last error: {e}")
            }
            (ErrorKind::Cancelled, Some(e)) => {
                write!(f, "the retry loop was cancelled: {e}")
            }
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

#[derive(Debug)]
enum ErrorKind {
    Service(Box<Status>),
    Exhausted,
    Cancelled,
    Other,
}
