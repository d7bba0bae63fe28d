//! Accept loop and request dispatch.

pub mod dispatch;
pub mod listener;

pub use dispatch::Dispatcher;
