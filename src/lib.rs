//! Lodge - a small HTTP/1.1 daemon
//!
//! Parses requests by hand, gates a dashboard behind a cookie login backed by
//! sliding-expiry sessions, and serves static files by media type.

pub mod clock;
pub mod config;
pub mod content;
pub mod http;
pub mod server;
pub mod session;
