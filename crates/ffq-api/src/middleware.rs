//! API middleware.

use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS for every route; preflight OPTIONS short-circuits with
/// a 200 from the layer itself.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(600))
}
