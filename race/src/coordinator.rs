use std::sync::Arc;

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    deadline::DeadlineContext,
    dispatch::Dispatcher,
    error::{AttemptError, AttemptFailure, Failures, RaceError},
    fetch::Fetch,
    outcome::{Outcome, Response},
    target::{render_all, Target, TargetTemplate},
};

/// Races every configured provider for an identifier and keeps the first
/// successful response.
#[derive(Clone)]
pub struct Racer {
    dispatcher: Dispatcher,
    templates: Vec<TargetTemplate>,
}

impl Racer {
    pub fn new(fetcher: Arc<dyn Fetch + Send + Sync>, templates: Vec<TargetTemplate>) -> Self {
        Self {
            dispatcher: Dispatcher::new(fetcher),
            templates,
        }
    }

    /// Blank identifiers are rejected before any request is made.
    pub async fn race(&self, id: &str, timeout: time::Duration) -> Result<Response, RaceError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(RaceError::InvalidIdentifier(id.to_owned()));
        }

        let targets = render_all(&self.templates, trimmed);
        self.race_targets(targets, timeout).await
    }

    #[tracing::instrument(
        name = "race",
        skip_all,
        fields(race = %Uuid::now_v7(), targets = targets.len(), %timeout)
    )]
    pub async fn race_targets(
        &self,
        targets: Vec<Target>,
        timeout: time::Duration,
    ) -> Result<Response, RaceError> {
        if targets.is_empty() {
            return Err(RaceError::NoTargets);
        }

        let started_at = Instant::now();
        let ctx = DeadlineContext::with_timeout(timeout);
        // every attempt still running is told to stop once we return
        let _cancel = ctx.cancel_on_drop();

        let mut state = RaceState::new(targets.len());
        let mut outcomes = self.dispatcher.dispatch(&ctx, targets.clone());

        loop {
            let outcome = tokio::select! {
                biased;
                _ = ctx.expired() => None,
                outcome = outcomes.recv() => outcome,
            };

            let Some(outcome) = outcome else {
                if ctx.is_expired() {
                    tracing::warn!(
                        target: "race",
                        received = state.received,
                        "deadline exceeded after {:?}",
                        started_at.elapsed()
                    );
                    return Err(RaceError::DeadlineExceeded);
                }

                // live attempts never drop their sender early, so some task died
                let failures = state.lose_unreported(&targets);
                tracing::warn!(
                    target: "race",
                    count = failures.len(),
                    "outcome stream closed before every attempt reported"
                );
                return Err(RaceError::CombinedFailure(failures));
            };

            match outcome {
                Outcome::Success(resp) => {
                    tracing::info!(
                        target: "race",
                        url = %resp.url,
                        failed = state.received,
                        "won in {:?}",
                        started_at.elapsed()
                    );
                    return Ok(resp);
                }
                Outcome::Failure(failure) => {
                    tracing::debug!(target: "race", %failure, "attempt lost");
                    if let Some(failures) = state.record(failure) {
                        tracing::warn!(target: "race", count = failures.len(), "every attempt failed");
                        return Err(RaceError::CombinedFailure(failures));
                    }
                }
            }
        }
    }
}

struct RaceState {
    expected: usize,
    received: usize,
    failures: Failures,
}

impl RaceState {
    fn new(expected: usize) -> Self {
        Self {
            expected,
            received: 0,
            failures: Failures::default(),
        }
    }

    /// Returns every failure once the last outstanding target has failed.
    fn record(&mut self, failure: AttemptFailure) -> Option<Failures> {
        self.received += 1;
        self.failures.push(failure);

        (self.received == self.expected).then(|| std::mem::take(&mut self.failures))
    }

    /// Fails every target that has not reported yet, in dispatch order.
    fn lose_unreported(&mut self, targets: &[Target]) -> Failures {
        let mut reported: Vec<&Target> = self.failures.iter().map(|f| &f.target).collect();
        let mut lost = Vec::new();

        for target in targets {
            match reported.iter().position(|seen| *seen == target) {
                Some(idx) => {
                    reported.swap_remove(idx);
                }
                None => lost.push(AttemptFailure {
                    target: target.clone(),
                    error: AttemptError::Lost,
                }),
            }
        }

        for failure in lost {
            self.received += 1;
            self.failures.push(failure);
        }
        std::mem::take(&mut self.failures)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::future::join_all;

    use super::*;
    use crate::testing::ScriptedFetcher;

    fn secs(secs: i64) -> time::Duration {
        time::Duration::seconds(secs)
    }

    fn racer(fetcher: &Arc<ScriptedFetcher>, templates: &[&str]) -> Racer {
        let templates = templates.iter().copied().map(TargetTemplate::new).collect();
        Racer::new(fetcher.clone(), templates)
    }

    fn refused() -> AttemptError {
        AttemptError::Transport("connection refused".into())
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_short_circuits() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .succeed("http://fast.test/1", 10, "fast")
                .succeed("http://slow.test/1", 5_000, "slow"),
        );
        let racer = racer(&fetcher, &["http://slow.test/{id}", "http://fast.test/{id}"]);

        let started_at = Instant::now();
        let resp = racer.race("1", secs(30)).await.unwrap();

        assert!(started_at.elapsed() < Duration::from_millis(100));
        assert_eq!(
            resp,
            Response {
                url: "http://fast.test/1".into(),
                data: "fast".into(),
            }
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fetcher.abandoned(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_failure_wins() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .fail("http://a.test/9", 5, refused())
                .succeed("http://b.test/9", 20, "b"),
        );
        let racer = racer(&fetcher, &["http://a.test/{id}", "http://b.test/{id}"]);

        let resp = racer.race("9", secs(1)).await.unwrap();
        assert_eq!(resp.url, "http://b.test/9");
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_are_combined_in_arrival_order() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .fail("http://a.test/", 30, AttemptError::Status(500))
                .fail("http://b.test/", 10, refused())
                .fail("http://c.test/", 20, AttemptError::BodyRead("reset".into())),
        );
        let racer = racer(&fetcher, &[]);
        let targets = ["http://a.test/", "http://b.test/", "http://c.test/"]
            .into_iter()
            .map(Target::from)
            .collect();

        let Err(RaceError::CombinedFailure(failures)) = racer.race_targets(targets, secs(1)).await
        else {
            panic!("expected every attempt to fail");
        };

        let order: Vec<_> = failures.iter().map(|f| f.target.as_str()).collect();
        assert_eq!(order, ["http://b.test/", "http://c.test/", "http://a.test/"]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_exceeded_when_every_attempt_is_slower() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .succeed("http://a.test/1", 2_000, "a")
                .succeed("http://b.test/1", 3_000, "b"),
        );
        let racer = racer(&fetcher, &["http://a.test/{id}", "http://b.test/{id}"]);

        let started_at = Instant::now();
        let err = racer
            .race("1", time::Duration::milliseconds(500))
            .await
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        let elapsed = started_at.elapsed();
        assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(600));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fetcher.abandoned(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_takes_precedence_over_recorded_failures() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .fail("http://a.test/1", 5, refused())
                .succeed("http://b.test/1", 10_000, "b"),
        );
        let racer = racer(&fetcher, &["http://a.test/{id}", "http://b.test/{id}"]);

        let err = racer
            .race("1", time::Duration::milliseconds(100))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn negative_timeout_is_exceeded_at_first_check() {
        let fetcher = Arc::new(ScriptedFetcher::default().succeed("http://a.test/1", 0, "a"));
        let racer = racer(&fetcher, &["http://a.test/{id}"]);

        let err = racer
            .race("1", time::Duration::minutes(-90))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_attempt_is_reported_before_the_deadline() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .fail("http://a.test/1", 5, refused())
                .panic("http://b.test/1", 10),
        );
        let racer = racer(&fetcher, &["http://a.test/{id}", "http://b.test/{id}"]);

        let started_at = Instant::now();
        let err = racer.race("1", secs(30)).await.unwrap_err();
        assert!(started_at.elapsed() < Duration::from_secs(1));

        let failures = match err {
            RaceError::CombinedFailure(failures) => failures,
            other => panic!("expected combined failure, got {other:?}"),
        };
        let errors: Vec<_> = failures
            .iter()
            .map(|f| (f.target.as_str(), f.error.to_string()))
            .collect();
        assert_eq!(
            errors,
            [
                ("http://a.test/1", "transport error: connection refused".to_owned()),
                ("http://b.test/1", "attempt ended without an outcome".to_owned()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_attempt_does_not_hide_a_later_success() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .panic("http://a.test/1", 5)
                .succeed("http://b.test/1", 20, "b"),
        );
        let racer = racer(&fetcher, &["http://a.test/{id}", "http://b.test/{id}"]);

        let resp = racer.race("1", secs(30)).await.unwrap();
        assert_eq!(resp.url, "http://b.test/1");
    }

    #[tokio::test]
    async fn blank_identifier_is_rejected_before_dispatch() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let racer = racer(&fetcher, &["http://a.test/{id}"]);

        for id in ["", "   "] {
            let err = racer.race(id, secs(1)).await.unwrap_err();
            assert!(matches!(err, RaceError::InvalidIdentifier(ref raw) if raw == id));
        }

        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn empty_target_list_is_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let racer = racer(&fetcher, &[]);

        let err = racer.race("1", secs(1)).await.unwrap_err();
        assert!(matches!(err, RaceError::NoTargets));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn simultaneous_failures_are_counted_once_each() {
        let mut fetcher = ScriptedFetcher::default();
        let mut targets = Vec::new();
        for idx in 0..16 {
            let url = format!("http://{idx}.test/");
            fetcher = fetcher.fail(&url, 5, refused());
            targets.push(Target::from(url));
        }
        let fetcher = Arc::new(fetcher);
        let racer = racer(&fetcher, &[]);

        let Err(RaceError::CombinedFailure(failures)) = racer.race_targets(targets, secs(1)).await
        else {
            panic!("expected every attempt to fail");
        };

        let mut seen: Vec<_> = failures.iter().map(|f| f.target.to_string()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 16);
        assert_eq!(failures.len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_races_always_terminate() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .fail("http://a.test/1", 50, refused())
                .succeed("http://b.test/1", 100, "b"),
        );
        let racer = racer(&fetcher, &["http://a.test/{id}", "http://b.test/{id}"]);

        let timeouts = [10, 75, 150, 1_000, -1, 0];
        let races = timeouts
            .iter()
            .map(|ms| racer.race("1", time::Duration::milliseconds(*ms)));
        let results = join_all(races).await;

        let won = results.iter().filter(|res| res.is_ok()).count();
        let timed_out = results
            .iter()
            .filter(|res| matches!(res, Err(RaceError::DeadlineExceeded)))
            .count();
        assert_eq!((won, timed_out), (2, 4));
    }

    #[test]
    fn race_state_reports_once_all_failed() {
        let mut state = RaceState::new(2);
        let failure = |url: &str| AttemptFailure {
            target: Target::from(url),
            error: refused(),
        };

        assert!(state.record(failure("http://a.test/")).is_none());
        let failures = state.record(failure("http://b.test/")).unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(state.received, 2);
    }

    #[test]
    fn unreported_duplicates_are_each_lost() {
        let dup = Target::from("http://dup.test/");
        let targets = [dup.clone(), Target::from("http://other.test/"), dup.clone()];
        let mut state = RaceState::new(targets.len());

        assert!(state
            .record(AttemptFailure {
                target: dup.clone(),
                error: refused(),
            })
            .is_none());

        let failures = state.lose_unreported(&targets);
        let lost: Vec<_> = failures
            .iter()
            .filter(|f| matches!(f.error, AttemptError::Lost))
            .map(|f| f.target.as_str())
            .collect();
        assert_eq!(lost, ["http://other.test/", "http://dup.test/"]);
        assert_eq!(state.received, 3);
    }
}
