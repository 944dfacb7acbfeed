pub mod types;
pub mod errors;
pub mod middleware;
pub mod clients;
pub mod store;

pub use types::*;
pub use errors::{AppError, ErrorCode, AppResult};
pub use store::{Document, DocumentStore, StoreError, StoreResult};
