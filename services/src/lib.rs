//! Outbound HTTP clients for the media services.
//!
//! [`ServiceClient`] is the resilient client: it shapes URLs and credentials
//! through a [`Binding`], retries connection failures with exponential backoff
//! per its [`RetryPolicy`], and surfaces every other failure immediately.

#[macro_use]
extern crate tracing;

pub mod api;
mod binding;
mod client;
mod error;
mod registry;
mod retry;

pub use binding::{
    Binding,
    StatusCall,
};
pub use client::ServiceClient;
pub use error::{
    BoxError,
    ClientError,
};
pub use registry::ServiceClients;
pub use reqwest::Method;
pub use retry::RetryPolicy;
