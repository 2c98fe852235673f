//! edgegate-analytics
//!
//! Outbound usage-record uploader for the edgegate sidecar: serializes a
//! batch of [`Record`]s and POSTs it to the collection endpoint derived from
//! the caller's [`edgegate_auth::AuthContext`]. HTTP 200 is accepted; any
//! other status is a rejection with the response body surfaced.

#![forbid(unsafe_code)]

mod error;
mod record;
mod uploader;

pub use error::{Error, Result};
pub use record::Record;
pub use uploader::LegacyUploader;
