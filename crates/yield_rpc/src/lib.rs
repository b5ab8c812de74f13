//! HTTP surface for crop yield prediction
//!
//! JSON endpoints under `/api` and server-rendered dashboard pages, both
//! backed by the same injected services.

mod dashboard;
mod server;

pub use server::{build_router, start_server, AppState, DEFAULT_HISTORY_LIMIT, SERVICE_NAME};
