mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;
use crate::distance::Distance;
use crate::score::ScoreElement;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler, api::similar_handler, api::add_handler),
    components(schemas(
        types::SearchForm,
        types::SearchResponse,
        types::AddForm,
        types::AddResponse,
        ScoreElement,
        Distance,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/search", post(api::search_handler))
        .route("/similar/{id}", get(api::similar_handler))
        .route("/add", post(api::add_handler))
        .route_layer(from_fn_with_state(state.clone(), api::auth_middleware));

    Router::new()
        .merge(api)
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
