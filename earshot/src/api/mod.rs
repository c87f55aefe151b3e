//! HTTP API.
//!
//! A thin layer over [`AlarmController`](crate::alarm::AlarmController):
//! handlers translate its snapshot and reset results into the JSON
//! shapes in [`crate::api_client::types`]. No alarm logic lives here.

mod routes;
pub mod server;

pub use server::{SharedState, router, serve};
