//! Upstream provider abstractions.
//!
//! This module contains:
//! - The `ProviderClient` trait every data source implements
//! - `HttpProviderClient`, a client for JSON upstreams
//!
//! The feed core never inspects transport details; providers hand back a
//! typed [`Payload`](crate::models::Payload) or a classified
//! [`FeedError`](crate::errors::FeedError).

mod http;
mod traits;

pub use http::HttpProviderClient;
pub use traits::ProviderClient;
