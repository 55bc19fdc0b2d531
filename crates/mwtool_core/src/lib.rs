//! MediaWiki API client core: a throttled transport, typed API errors, token
//! caching with one-shot refresh, continuation over both cursor dialects, the
//! [`WikiClient`] operations for MediaWiki 1.19 and 1.31, and bulk workflows
//! built on them.

pub mod bulk;
pub mod classify;
pub mod client;
pub mod config;
pub mod continuation;
pub mod error;
pub mod session;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{
    Credentials, ImageInfo, LegacyClient, Listing, ModernClient, PageRef, ProtocolVersion,
    WikiClient, connect,
};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
