//! API-compatible types: request/response bodies and authentication.

pub mod auth;
pub mod election;
pub mod notification;
pub mod receipt;
pub mod results;
