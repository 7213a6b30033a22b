//! Client code for cachefront.
//!
//! This crate provides the network side of the gateway: the `Fetcher`
//! trait the router fetches through, and its reqwest-backed implementation.

pub mod fetch;

pub use fetch::{FetchConfig, FetchedResponse, Fetcher, HttpFetcher, canonicalize};
