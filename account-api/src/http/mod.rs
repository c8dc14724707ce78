//! HTTP layer: Axum router, handlers, and JSON envelopes.
//!
//! Exposes the account endpoints under `/api/users` plus `/health`.

mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::AppState;
