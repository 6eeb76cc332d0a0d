//! Middleware Module
//!
//! Request processing shared by every handler.
//!
//! # Architecture
//!
//! - **`actor`** - `Actor` and `Origin` extractors for the identity and
//!   session headers
//!
//! Request logging and CORS come from tower-http layers installed in
//! `routes::router`.

pub mod actor;

pub use actor::{Actor, Origin};
