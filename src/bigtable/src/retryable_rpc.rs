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

//! The contract between the retry core and the RPC transport.

use crate::Result;
use std::sync::Arc;

/// Issues a single attempt of a unary RPC.
///
/// The retry core calls `submit()` once per attempt, always with the same
/// request. Implementations map transport failures to
/// [Error::service][crate::error::Error::service] so the status code can be
/// classified. Any other error is never retried.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::Result;
/// # use google_cloud_bigtable::retryable_rpc::RetryableRpc;
/// # use google_cloud_bigtable::error::{Error, rpc::{Code, Status}};
/// #[derive(Debug)]
/// struct CheckAndMutateRow;
/// impl RetryableRpc for CheckAndMutateRow {
///     type Request = String;
///     type Response = bool;
///     async fn submit(&self, request: &String) -> Result<bool> {
///         if request.is_empty() {
///             return Err(Error::service(Status::default().set_code(Code::InvalidArgument)));
///         }
///         Ok(true)
///     }
/// }
/// ```
pub trait RetryableRpc: Send + Sync + std::fmt::Debug {
    /// The request payload, reused by every attempt.
    type Request: Send + Sync;
    /// The response of a successful attempt.
    type Response: Send;

    /// Starts one attempt.
    fn submit(
        &self,
        request: &Self::Request,
    ) -> impl Future<Output = Result<Self::Response>> + Send;
}

impl<T: RetryableRpc> RetryableRpc for Arc<T> {
    type Request = T::Request;
    type Response = T::Response;

    fn submit(
        &self,
        request: &Self::Request,
    ) -> impl Future<Output = Result<Self::Response>> + Send {
        T::submit(self, request)
    }
}
