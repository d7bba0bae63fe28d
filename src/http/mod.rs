//! HTTP/1.1 protocol implementation.
//!
//! One request per connection; the connection is closed after the response.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine and transport read loop
//! - **`parser`**: Turns raw bytes into a [`request::Request`], permissively
//! - **`request`**: Request, method and case-insensitive header types
//! - **`router`**: Exact `(method, path)` table of hooks
//! - **`response`**: Response representation with builder pattern
//! - **`writer`**: Serializes and writes responses to the client
//! - **`cookie`**: `Set-Cookie` values for the login gate
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Until head + Content-Length bytes, or EOF
//!        └──────┬──────┘
//!               │ Message buffered
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Parse and dispatch on the blocking pool
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ▼
//!            Closed
//! ```

pub mod connection;
pub mod cookie;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod router;
pub mod writer;
