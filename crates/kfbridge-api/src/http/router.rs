//! Axum router configuration with middleware.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(
            "/webhook/wechat",
            get(handlers::webhook::verify_url).post(handlers::webhook::receive_callback),
        )
        .route("/health", get(handlers::health::health));

    if state.admin_token.is_some() {
        let admin = Router::new()
            .route("/contexts", get(handlers::admin::list_contexts))
            .route(
                "/contexts/{user}",
                get(handlers::admin::get_context).delete(handlers::admin::delete_context),
            )
            .route(
                "/contexts/{user}/refresh",
                post(handlers::admin::refresh_context),
            );
        router = router.nest("/admin", admin);
    } else {
        tracing::info!("no admin token configured, admin routes disabled");
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
