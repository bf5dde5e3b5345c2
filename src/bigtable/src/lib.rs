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

//! Google Cloud Client Libraries for Rust - Bigtable
//!
//! This crate contains the retry core used by the Bigtable client. The HBase
//! compatible connection facade hands every unary RPC to this core, which
//! resubmits the RPC on transient failures using an exponential backoff
//! schedule, and surfaces permanent failures (or an exhausted schedule) to
//! the application.
//!
//! # Example
//! ```
//! # use google_cloud_bigtable::*;
//! # use google_cloud_bigtable::retry_fallback::RetryFallback;
//! # use google_cloud_bigtable::retryable_rpc::RetryableRpc;
//! # use google_cloud_bigtable::options::RetryOptions;
//! #[derive(Debug)]
//! struct ReadRow;
//! impl RetryableRpc for ReadRow {
//!     type Request = String;
//!     type Response = String;
//!     async fn submit(&self, request: &String) -> Result<String> {
//!         Ok(format!("row for {request}"))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let fallback = RetryFallback::create(RetryOptions::default(), "row-key".to_string(), ReadRow);
//! let response = fallback.call().await?;
//! assert_eq!(response, "row for row-key");
//! # Ok::<(), error::Error>(()) });
//! ```

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by the retry core.
pub mod error;

pub mod backoff;
pub mod classifier;
pub mod clock;
pub mod options;
pub mod retry_fallback;
pub mod retryable_rpc;
pub mod sleeper;

/// Virtual time sources used in tests.
#[cfg(any(test, feature = "_internal-testing"))]
#[doc(hidden)]
pub mod virtual_time;
