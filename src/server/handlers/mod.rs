//! HTTP handlers for the server.

pub mod queue;
pub mod service;
