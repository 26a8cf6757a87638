//! HTTP API client and request helpers.

mod endpoint;
mod rest_client;

pub use rest_client::RestClient;
