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

#[cfg(test)]
mod tests {
    use google_cloud_bigtable::Result;
    use google_cloud_bigtable::backoff::{BackoffSchedule, NextDelay};
    use google_cloud_bigtable::error::Error;
    use google_cloud_bigtable::error::rpc::{Code, Status};
    use google_cloud_bigtable::options::RetryOptions;
    use google_cloud_bigtable::retry_fallback::{Fallback, RetryFallback};
    use google_cloud_bigtable::retryable_rpc::RetryableRpc;
    use google_cloud_bigtable::sleeper::{Sleeper, TokioSleeper};
    use google_cloud_bigtable::virtual_time::{VirtualClock, VirtualSleeper};
    use std::error::Error as _;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use test_case::test_case;
    use tokio_util::sync::CancellationToken;

    /// Fails with the same status until `successes_after` attempts.
    #[derive(Debug)]
    struct FlakyRpc {
        code: Code,
        successes_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl FlakyRpc {
        fn always(code: Code) -> Arc<Self> {
            Arc::new(Self {
                code,
                successes_after: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn succeeds_after(code: Code, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                code,
                successes_after: Some(failures),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RetryableRpc for FlakyRpc {
        type Request = String;
        type Response = String;
        async fn submit(&self, request: &String) -> Result<String> {
            let previous = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.successes_after {
                Some(n) if previous >= n => Ok(format!("{request}: success")),
                _ => Err(status_error(self.code)),
            }
        }
    }

    fn status_error(code: Code) -> Error {
        Error::service(Status::default().set_code(code).set_message("test-only"))
    }

    fn last_code(error: &Error) -> Option<Code> {
        error
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .and_then(|e| e.status())
            .map(|s| s.code)
    }

    fn test_options(retry_on_deadline_exceeded: bool) -> RetryOptions {
        RetryOptions::new(
            true,
            retry_on_deadline_exceeded,
            5,
            2.0,
            60_000,
            60,
            60_000,
        )
        .expect("should succeed with the hard-coded test values")
    }

    fn virtual_fallback(
        options: RetryOptions,
        rpc: Arc<FlakyRpc>,
    ) -> (Fallback<Arc<FlakyRpc>>, Arc<VirtualSleeper>) {
        let clock = Arc::new(VirtualClock::new());
        let sleeper = Arc::new(VirtualSleeper::new(clock.clone()));
        let fallback = RetryFallback::builder(options, "row-key".to_string(), rpc)
            .with_clock(clock)
            .with_sleeper(sleeper.clone())
            .build();
        (fallback, sleeper)
    }

    /// Feeds failures into the fallback, the way a caller chaining futures
    /// would, until the chain reaches a terminal outcome.
    async fn drive(
        fallback: &mut Fallback<Arc<FlakyRpc>>,
        first: Error,
        limit: usize,
    ) -> (Result<String>, usize) {
        let mut calls = 0;
        let mut error = first;
        loop {
            if error.is_exhausted() || error.is_cancelled() || calls == limit {
                return (Err(error), calls);
            }
            calls += 1;
            match fallback.on_failure(error).await {
                Ok(response) => return (Ok(response), calls),
                Err(e) => error = e,
            }
        }
    }

    #[tokio::test]
    async fn runtime_error() {
        let rpc = FlakyRpc::always(Code::Internal);
        let (mut fallback, sleeper) = virtual_fallback(test_options(true), rpc.clone());
        let err = fallback
            .on_failure(Error::other("thrown"))
            .await
            .expect_err("runtime errors are not retried");
        assert!(!err.is_exhausted(), "{err:?}");
        assert!(err.status().is_none(), "{err:?}");
        assert!(err.to_string().contains("thrown"), "{err}");
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(rpc.calls(), 0);
    }

    #[test_case(Code::Internal)]
    #[test_case(Code::Unavailable)]
    #[test_case(Code::Aborted)]
    #[test_case(Code::DeadlineExceeded)]
    #[tokio::test]
    async fn retryable_exhaustion(code: Code) {
        let rpc = FlakyRpc::always(code);
        let (mut fallback, sleeper) = virtual_fallback(test_options(true), rpc.clone());
        let (result, calls) = drive(&mut fallback, status_error(code), 50).await;
        let err = result.expect_err("the rpc never succeeds");
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(last_code(&err), Some(code), "{err:?}");
        assert!(calls < 50, "{calls}");
        assert!(sleeper.total() >= Duration::from_millis(60_000));
        assert_eq!(rpc.calls(), sleeper.sleeps().len());
    }

    #[tokio::test]
    async fn non_retryable_status() {
        let rpc = FlakyRpc::always(Code::PermissionDenied);
        let (mut fallback, sleeper) = virtual_fallback(test_options(true), rpc.clone());
        let err = fallback
            .on_failure(status_error(Code::PermissionDenied))
            .await
            .expect_err("non-retryable errors are terminal");
        assert!(!err.is_exhausted(), "{err:?}");
        assert_eq!(
            err.status().map(|s| s.code),
            Some(Code::PermissionDenied),
            "{err:?}"
        );
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(rpc.calls(), 0);
    }

    #[tokio::test]
    async fn deadline_exceeded_not_retried() {
        let rpc = FlakyRpc::always(Code::DeadlineExceeded);
        let (fallback, sleeper) = virtual_fallback(test_options(false), rpc.clone());
        let err = fallback.call().await.expect_err("the rpc never succeeds");
        assert!(!err.is_exhausted(), "{err:?}");
        assert_eq!(
            err.status().map(|s| s.code),
            Some(Code::DeadlineExceeded),
            "{err:?}"
        );
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(rpc.calls(), 1);
    }

    #[tokio::test]
    async fn deadline_exceeded_retried() {
        let rpc = FlakyRpc::always(Code::DeadlineExceeded);
        let (fallback, sleeper) = virtual_fallback(test_options(true), rpc.clone());
        let err = fallback.call().await.expect_err("the rpc never succeeds");
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(last_code(&err), Some(Code::DeadlineExceeded), "{err:?}");
        assert!(!sleeper.sleeps().is_empty());
        assert_eq!(rpc.calls(), sleeper.sleeps().len() + 1);
    }

    #[tokio::test]
    async fn first_attempt_succeeds() -> anyhow::Result<()> {
        let rpc = FlakyRpc::succeeds_after(Code::Unavailable, 0);
        let (fallback, sleeper) = virtual_fallback(test_options(true), rpc.clone());
        let got = fallback.call().await?;
        assert_eq!(got, "row-key: success");
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(rpc.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn succeeds_after_retries() -> anyhow::Result<()> {
        let rpc = FlakyRpc::succeeds_after(Code::Unavailable, 3);
        let (fallback, sleeper) = virtual_fallback(test_options(true), rpc.clone());
        let got = fallback.call().await?;
        assert_eq!(got, "row-key: success");
        assert_eq!(
            sleeper.sleeps(),
            [5, 10, 20].map(Duration::from_millis).to_vec()
        );
        assert_eq!(rpc.calls(), 4);
        Ok(())
    }

    #[test_case(5, 2.0, 60_000)]
    #[test_case(5, 1.5, 60_000)]
    #[test_case(100, 3.0, 10_000)]
    #[test_case(1, 1.1, 500)]
    #[tokio::test]
    async fn bounded_attempts(initial: u64, multiplier: f64, max_elapsed: u64) {
        let options = RetryOptions::builder()
            .with_initial_backoff_millis(initial)
            .with_backoff_multiplier(multiplier)
            .with_max_elapsed_backoff_millis(max_elapsed)
            .build()
            .expect("should succeed with the hard-coded test values");
        let rpc = FlakyRpc::always(Code::Unavailable);
        let (fallback, sleeper) = virtual_fallback(options, rpc.clone());
        let err = fallback.call().await.expect_err("the rpc never succeeds");
        assert!(err.is_exhausted(), "{err:?}");

        let bound = (max_elapsed as f64 / initial as f64)
            .log(multiplier)
            .ceil() as usize
            + 1;
        assert!(rpc.calls() <= bound, "{} > {bound}", rpc.calls());

        // The chain stops on the first sleep that reaches the elapsed limit.
        let sleeps = sleeper.sleeps();
        let total = sleeps.iter().sum::<Duration>();
        assert!(total >= Duration::from_millis(max_elapsed), "{sleeps:?}");
        let before_last = total - sleeps.last().copied().unwrap_or_default();
        assert!(
            before_last < Duration::from_millis(max_elapsed),
            "{sleeps:?}"
        );
        // The delays never decrease.
        assert!(sleeps.windows(2).all(|w| w[0] <= w[1]), "{sleeps:?}");
    }

    #[tokio::test]
    async fn clock_virtualization() {
        let options = test_options(true);
        let clock = Arc::new(VirtualClock::new());
        let sleeper = VirtualSleeper::new(clock.clone());
        let mut schedule = BackoffSchedule::new(&options, clock.clone());
        let mut elapsed = Duration::ZERO;
        let limit = Duration::from_millis(options.max_elapsed_backoff_millis());
        loop {
            match schedule.next_delay() {
                NextDelay::Stop => {
                    assert!(elapsed >= limit, "{elapsed:?}");
                    break;
                }
                NextDelay::Delay(d) => {
                    assert!(elapsed < limit, "{elapsed:?}");
                    sleeper
                        .sleep(d)
                        .await
                        .expect("virtual sleeps are never cancelled");
                    elapsed += d;
                }
            }
        }
        assert_eq!(sleeper.total(), elapsed);
    }

    #[test_case(Code::Internal)]
    #[test_case(Code::Unavailable)]
    #[test_case(Code::Aborted)]
    #[test_case(Code::DeadlineExceeded)]
    #[tokio::test]
    async fn disabled_retries(code: Code) {
        let options = RetryOptions::new(false, true, 5, 2.0, 60_000, 60, 60_000)
            .expect("should succeed with the hard-coded test values");
        let rpc = FlakyRpc::always(code);
        let (mut fallback, sleeper) = virtual_fallback(options, rpc.clone());
        let err = fallback
            .on_failure(status_error(code))
            .await
            .expect_err("nothing is retried");
        assert!(!err.is_exhausted(), "{err:?}");
        assert_eq!(err.status().map(|s| s.code), Some(code), "{err:?}");
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(rpc.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_virtual_sleep() {
        let rpc = FlakyRpc::always(Code::Unavailable);
        let clock = Arc::new(VirtualClock::new());
        let token = CancellationToken::new();
        let sleeper = Arc::new(VirtualSleeper::with_cancellation(
            clock.clone(),
            token.clone(),
        ));
        let fallback = RetryFallback::builder(test_options(true), "row-key".to_string(), rpc.clone())
            .with_clock(clock)
            .with_sleeper(sleeper.clone())
            .build();
        token.cancel();
        let err = fallback.call().await.expect_err("the chain is cancelled");
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(rpc.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tokio_sleep() {
        let rpc = FlakyRpc::always(Code::Unavailable);
        let token = CancellationToken::new();
        let options = RetryOptions::builder()
            .with_initial_backoff_millis(10_000)
            .build()
            .expect("should succeed with the hard-coded test values");
        let fallback = RetryFallback::builder(options, "row-key".to_string(), rpc.clone())
            .with_sleeper(Arc::new(TokioSleeper::with_cancellation(token.clone())))
            .build();
        let start = tokio::time::Instant::now();
        let cancel = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        };
        let (result, _) = tokio::join!(fallback.call(), cancel);
        let err = result.expect_err("the chain is cancelled");
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(rpc.calls(), 1);
    }

    #[tokio::test]
    async fn independent_chains() -> anyhow::Result<()> {
        let clock = Arc::new(VirtualClock::new());
        let sleeper = Arc::new(VirtualSleeper::new(clock.clone()));
        let tasks = (0..4)
            .map(|i| {
                let rpc = FlakyRpc::succeeds_after(Code::Unavailable, i);
                let fallback =
                    RetryFallback::builder(test_options(true), format!("row-{i}"), rpc.clone())
                        .with_clock(clock.clone())
                        .with_sleeper(sleeper.clone())
                        .build();
                tokio::spawn(async move { (fallback.call().await, rpc.calls()) })
            })
            .collect::<Vec<_>>();
        for (i, task) in tasks.into_iter().enumerate() {
            let (result, calls) = task.await?;
            assert_eq!(result?, format!("row-{i}: success"));
            assert_eq!(calls, i + 1);
        }
        Ok(())
    }
}
