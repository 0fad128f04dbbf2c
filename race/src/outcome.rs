use crate::{
    error::{AttemptError, AttemptFailure},
    target::Target,
};

/// A fully read response from the target that won the race.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Response {
    pub url: String,
    pub data: String,
}

impl Response {
    /// Invalid UTF-8 sequences in `body` become U+FFFD.
    pub fn new(target: &Target, body: &[u8]) -> Self {
        let data = match std::str::from_utf8(body) {
            Ok(data) => data.to_owned(),
            Err(err) => {
                tracing::debug!(
                    target: "race::dispatch",
                    url = %target,
                    valid_up_to = err.valid_up_to(),
                    "body is not valid UTF-8, replacing invalid sequences"
                );
                String::from_utf8_lossy(body).into_owned()
            }
        };

        Self {
            url: target.to_string(),
            data,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Success(Response),
    Failure(AttemptFailure),
}

impl Outcome {
    pub fn failure(target: Target, error: AttemptError) -> Self {
        Outcome::Failure(AttemptFailure { target, error })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn target(&self) -> &str {
        match self {
            Outcome::Success(resp) => &resp.url,
            Outcome::Failure(failure) => failure.target.as_str(),
        }
    }
}
