//! Reqwest-based HTTP API datasource for conduit.
//!
//! [`RestClient`] wraps a JSON HTTP API behind the conduit execution
//! policies: every request runs under the context's retry policy with a fresh
//! per-attempt deadline, and non-success statuses count as failed attempts.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_reqwest::{RestClient, RestContext};
//!
//! let context = RestContext::new(DatasourceContext::new("billing"), "https://billing.internal/api")
//!     .with_token("secret");
//! let client = RestClient::new(context)?;
//!
//! let invoice: Invoice = client.get("invoices/42").await?;
//! let created: Invoice = client.post("invoices", &draft).await?;
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Tracing target for HTTP request operations.
pub const TRACING_TARGET_CLIENT: &str = "conduit_reqwest::client";

mod client;

pub use conduit_core::context::RestContext;
pub use reqwest::Method;

pub use crate::client::RestClient;
