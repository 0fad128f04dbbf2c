use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;

use crate::{
    deadline::DeadlineContext,
    error::AttemptError,
    fetch::Fetch,
    target::Target,
};

enum Reply {
    Body(&'static str),
    Error(AttemptError),
    Panic,
}

struct Script {
    delay: Duration,
    reply: Reply,
}

/// Answers each target after a fixed delay with a canned result.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: HashMap<Target, Script>,
    calls: AtomicUsize,
    abandoned: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub(crate) fn succeed(self, url: &str, after_ms: u64, body: &'static str) -> Self {
        self.script(url, after_ms, Reply::Body(body))
    }

    pub(crate) fn fail(self, url: &str, after_ms: u64, error: AttemptError) -> Self {
        self.script(url, after_ms, Reply::Error(error))
    }

    /// The attempt's task panics instead of reporting.
    pub(crate) fn panic(self, url: &str, after_ms: u64) -> Self {
        self.script(url, after_ms, Reply::Panic)
    }

    fn script(mut self, url: &str, after_ms: u64, reply: Reply) -> Self {
        self.scripts.insert(
            Target::from(url),
            Script {
                delay: Duration::from_millis(after_ms),
                reply,
            },
        );
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetches whose future was dropped before finishing.
    pub(crate) fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

struct InFlight {
    abandoned: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(&self, target: &Target, _ctx: &DeadlineContext) -> Result<Bytes, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(script) = self.scripts.get(target) else {
            return Err(AttemptError::Transport(format!("no script for {target}")));
        };

        let mut in_flight = InFlight {
            abandoned: Arc::clone(&self.abandoned),
            finished: false,
        };
        tokio::time::sleep(script.delay).await;
        in_flight.finished = true;

        match &script.reply {
            Reply::Body(body) => Ok(Bytes::from_static(body.as_bytes())),
            Reply::Error(error) => Err(error.clone()),
            Reply::Panic => panic!("scripted panic for {target}"),
        }
    }
}
