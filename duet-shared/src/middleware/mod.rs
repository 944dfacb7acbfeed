//! Request-side plumbing shared by Duet services: the `AuthUser` extractor,
//! subscriber setup and HTTP metrics.

mod auth_extractor;
mod metrics_layer;
mod tracing_layer;

pub use metrics_layer::{init_metrics, metrics_middleware};
pub use tracing_layer::init_tracing;
