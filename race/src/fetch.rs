pub mod http;

use bytes::Bytes;

use crate::{deadline::DeadlineContext, error::AttemptError, target::Target};

pub use self::http::{HttpFetcher, HttpOptions};

/// Performs one request against one target and returns the whole body.
///
/// Implementations may assume `ctx` is live when called; the dispatcher drops
/// the returned future as soon as the context is done.
#[async_trait::async_trait]
pub trait Fetch {
    async fn fetch(&self, target: &Target, ctx: &DeadlineContext) -> Result<Bytes, AttemptError>;
}
