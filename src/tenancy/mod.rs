//! Host-based tenant routing and the session gate in front of every route.

pub mod host;
pub mod interceptor;
