use std::{error::Error as StdError, fmt::Write};

use bytes::Bytes;
use url::Url;

use crate::{deadline::DeadlineContext, error::AttemptError, target::Target};

use super::Fetch;

#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub user_agent: Option<String>,
    /// Treat non-2xx responses as failed attempts instead of winners.
    pub reject_error_status: bool,
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    reject_error_status: bool,
}

impl HttpFetcher {
    pub fn new(options: HttpOptions) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent);
        }

        Ok(Self {
            client: builder.build()?,
            reject_error_status: options.reject_error_status,
        })
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, target: &Target, ctx: &DeadlineContext) -> Result<Bytes, AttemptError> {
        let url = parse_target(target)?;

        let resp = self
            .client
            .get(url)
            .timeout(ctx.remaining())
            .send()
            .await
            .map_err(|err| AttemptError::Transport(error_chain(&err)))?;

        let status = resp.status();
        tracing::trace!(target: "race::dispatch", url = %target, %status, "received response headers");
        if self.reject_error_status && !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        resp.bytes()
            .await
            .map_err(|err| AttemptError::BodyRead(error_chain(&err)))
    }
}

fn parse_target(target: &Target) -> Result<Url, AttemptError> {
    let url = Url::parse(target.as_str()).map_err(|err| AttemptError::Request(err.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AttemptError::Request(format!(
            "unsupported scheme {scheme:?}"
        ))),
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        let _ = write!(msg, ": {err}");
        source = err.source();
    }

    msg
}
