//! dictserve-server — the HTTP layer over the [`dictserve_core`] engine.
//!
//! Everything testable lives here: the router and its handlers. The binary
//! in `main.rs` is a thin CLI shell around [`build_router`].

pub mod api;

pub use api::{build_router, AppContext};
