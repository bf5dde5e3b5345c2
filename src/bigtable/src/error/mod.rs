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

mod core_error;
pub use core_error::*;

/// The status model returned by Bigtable RPCs.
///
/// The retry core only looks at the [Code][rpc::Code] in a [Status][rpc::Status]
/// to decide if a failed attempt should be retried.
///
/// # Examples
///
/// ```
/// # use google_cloud_bigtable::error;
/// use error::Error;
/// use error::rpc::{Code, Status};
/// fn handle_error(e: Error) {
///     if let Some(status) = e.status() {
///         if status.code == Code::NotFound {
///             println!("the table is gone: {status:?}");
///         }
///     }
/// }
/// ```
pub mod rpc;
