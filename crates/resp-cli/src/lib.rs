//! Building blocks of the `resp-cli` tool: configuration loading and a
//! single-connection client over the pooled transport.

pub mod client;
pub mod config;
