//! Races the same request against several endpoints and keeps the first
//! success.
//!
//! A [`Racer`] renders one [`Target`] per configured [`TargetTemplate`],
//! hands them to a [`Dispatcher`] that spawns an attempt for each, and reads
//! outcomes until one succeeds, all of them fail, or the deadline passes.
//! Whatever is still running when the race ends is cancelled through the
//! shared [`DeadlineContext`].
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use race::{HttpFetcher, HttpOptions, Racer, TargetTemplate};
//!
//! let fetcher = HttpFetcher::new(HttpOptions::default())?;
//! let racer = Racer::new(Arc::new(fetcher), TargetTemplate::defaults());
//!
//! let resp = racer.race("01001000", race::parse_duration("1s")?).await?;
//! println!("{}: {}", resp.url, resp.data);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod deadline;
pub mod dispatch;
pub mod duration;
pub mod error;
pub mod fetch;
pub mod outcome;
pub mod target;

#[cfg(test)]
mod testing;

pub use coordinator::Racer;
pub use deadline::{send_or_abandon, DeadlineContext};
pub use dispatch::Dispatcher;
pub use duration::{parse_duration, ParseDurationError};
pub use error::{AttemptError, AttemptFailure, Failures, RaceError};
pub use fetch::{Fetch, HttpFetcher, HttpOptions};
pub use outcome::{Outcome, Response};
pub use target::{Target, TargetTemplate};
