//! Router assembly (§6.4): every operation the spec names, wired to one
//! concrete [`AppState`], behind tracing/compression/CORS middleware.

use axum::routing::post;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use crate::route_trait::RegisterableRoute;
use crate::routes;
use crate::state::AppState;

/// Builds the full router. Streaming generation is registered manually since
/// it returns a chunked body rather than the trait's single JSON response.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();

    router = routes::models::ListModelsRoute::register(router);
    router = routes::models::ShowModelRoute::register(router);
    router = routes::models::SetAliasRoute::register(router);
    router = routes::models::CheckDownloadedRoute::register(router);
    router = routes::models::DeleteModelRoute::register(router);
    router = routes::models::ListLoadedRoute::register(router);
    router = routes::models::LoadModelRoute::register(router);
    router = routes::models::UnloadModelRoute::register(router);

    router = routes::downloads::DownloadRoute::register(router);
    router = routes::downloads::ResumeRoute::register(router);
    router = routes::downloads::PauseRoute::register(router);
    router = routes::downloads::CancelRoute::register(router);
    router = routes::downloads::DownloadStatusRoute::register(router);

    router = routes::discovery::DiscoverRoute::register(router);
    router = routes::discovery::CollectionInfoRoute::register(router);
    router = routes::discovery::CollectionModelsRoute::register(router);

    router = routes::inference::GenerateRoute::register(router);
    router = routes::inference::EmbedRoute::register(router);
    router = router.route("/v1/generate/stream", post(routes::inference::stream_generate));

    router
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
