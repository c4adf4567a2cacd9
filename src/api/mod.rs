// ==========================================
// Trip import engine - API layer
// ==========================================
// Responsibility: import + query surface consumed by the CLI and embedders
// ==========================================

pub mod error;
pub mod import_api;
pub mod trip_query_api;

pub use error::{ApiError, ApiResult};
pub use import_api::ActualImportService;
pub use trip_query_api::TripQueryApi;
