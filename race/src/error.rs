use std::fmt;

use crate::target::Target;

/// Why a single attempt against one target failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttemptError {
    #[error("invalid request: {0}")]
    Request(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("failed to read body: {0}")]
    BodyRead(String),
    /// The attempt stopped before reporting, e.g. its task panicked.
    #[error("attempt ended without an outcome")]
    Lost,
}

#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub target: Target,
    pub error: AttemptError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

impl std::error::Error for AttemptFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Every failure of a race, in the order the outcomes arrived.
#[derive(Debug, Clone, Default)]
pub struct Failures(Vec<AttemptFailure>);

impl Failures {
    pub fn push(&mut self, failure: AttemptFailure) {
        self.0.push(failure);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptFailure> {
        self.0.iter()
    }
}

impl fmt::Display for Failures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{failure}")?;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("no targets to dispatch")]
    NoTargets,
    #[error("{0}")]
    CombinedFailure(Failures),
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl RaceError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, RaceError::DeadlineExceeded)
    }
}
