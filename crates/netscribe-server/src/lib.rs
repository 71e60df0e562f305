//! Netscribe background host.
//!
//! Owns the request observer, one relay per open page, and the control
//! panel, and exposes them over HTTP.

pub mod pages;
pub mod routes;
pub mod state;
pub mod watcher;

pub use state::AppState;
