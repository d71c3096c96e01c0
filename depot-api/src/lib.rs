//! HTTP transport for the depot (§6.4): a single Axum router over one
//! concrete [`AppState`], covering every operation spec'd for the surface.

pub mod error;
pub mod route_trait;
pub mod router;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::{AppState, DepotConfig};
