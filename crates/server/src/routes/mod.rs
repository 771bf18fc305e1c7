//! API route handlers.

pub mod discovery;
