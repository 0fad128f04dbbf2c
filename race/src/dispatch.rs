use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    deadline::{send_or_abandon, DeadlineContext},
    fetch::Fetch,
    outcome::{Outcome, Response},
    target::Target,
};

/// Fans one request per target out onto the runtime.
#[derive(Clone)]
pub struct Dispatcher {
    fetcher: Arc<dyn Fetch + Send + Sync>,
}

impl Dispatcher {
    pub fn new(fetcher: Arc<dyn Fetch + Send + Sync>) -> Self {
        Self { fetcher }
    }

    /// Spawns an attempt per target and returns the stream their outcomes
    /// arrive on, in completion order.
    ///
    /// Each target reports at most once. Once `ctx` is done, attempts stop
    /// and report nothing, so callers must not expect the stream to yield
    /// an outcome for every target.
    pub fn dispatch(&self, ctx: &DeadlineContext, targets: Vec<Target>) -> mpsc::Receiver<Outcome> {
        debug_assert!(!targets.is_empty(), "dispatch requires at least one target");

        let (tx, rx) = mpsc::channel(1);
        tracing::debug!(target: "race::dispatch", count = targets.len(), "dispatching attempts");

        for target in targets {
            tokio::spawn(attempt(
                Arc::clone(&self.fetcher),
                ctx.clone(),
                tx.clone(),
                target,
            ));
        }

        rx
    }
}

#[tracing::instrument(name = "attempt", skip_all, fields(url = %target))]
async fn attempt(
    fetcher: Arc<dyn Fetch + Send + Sync>,
    ctx: DeadlineContext,
    tx: mpsc::Sender<Outcome>,
    target: Target,
) {
    let result = tokio::select! {
        biased;
        _ = ctx.done() => {
            tracing::debug!(target: "race::dispatch", "attempt abandoned in flight");
            return;
        }
        result = fetcher.fetch(&target, &ctx) => result,
    };

    let outcome = match result {
        Ok(body) => Outcome::Success(Response::new(&target, &body)),
        Err(error) => {
            tracing::debug!(target: "race::dispatch", %error, "attempt failed");
            Outcome::failure(target, error)
        }
    };

    let success = outcome.is_success();
    if !send_or_abandon(&ctx, &tx, outcome).await {
        tracing::debug!(
            target: "race::dispatch",
            success,
            "outcome dropped, race already concluded"
        );
    }
}
