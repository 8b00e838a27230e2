#![warn(clippy::unwrap_used)]

pub mod records_rest;
pub mod rest;
pub mod server;
pub mod workflow_rest;

pub use server::ApiServer;
