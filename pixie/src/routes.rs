use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use pixie_core::deadlines::{EMPTY_TRASH_DEADLINE, HTTP_REQUEST_DEADLINE};
use pixie_core::AppError;

use crate::auth_gate;
use crate::handlers::{auth, photos, users};
use crate::state::AppContext;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Builds the full router: unauthenticated routes, the `user`-gated photo
/// surface, and the `admin`-gated user CRUD surface, each behind the
/// matching middleware stack. Falls back to serving `config.static_dir` for
/// anything that isn't an API route.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    // Empty-trash runs its own bulk blob cleanup (spec §5's 60s budget) and
    // must not inherit the ordinary 30s request deadline.
    let empty_trash_route = Router::new()
        .route("/api/photos/trash", get(photos::list_trashed).delete(photos::purge_all))
        .route_layer(axum::middleware::from_fn_with_state(ctx.clone(), auth_gate::authenticate))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(EMPTY_TRASH_DEADLINE)),
        );

    let upload_route = Router::new()
        .route("/api/upload", post(photos::upload))
        .route_layer(axum::middleware::from_fn_with_state(ctx.clone(), auth_gate::authenticate))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    let user_routes = Router::new()
        .route("/api/photos", get(photos::list_photos))
        .route("/api/photo/{id}", get(photos::read_photo).delete(photos::legacy_delete))
        .route("/api/photos/trash/{id}", put(photos::trash).delete(photos::purge_one))
        .route("/api/photos/trash/{id}/restore", put(photos::restore))
        .route_layer(axum::middleware::from_fn_with_state(ctx.clone(), auth_gate::authenticate));

    let admin_routes = Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route_layer(axum::middleware::from_fn(auth_gate::require_admin))
        .route_layer(axum::middleware::from_fn_with_state(ctx.clone(), auth_gate::authenticate));

    let public_routes = Router::new()
        .route("/healthz", get(|| async { "pixie core" }))
        .route("/api/auth/health", get(auth::health))
        .route("/api/auth/token", post(auth::issue_token))
        .route("/api/auth/revoke", post(auth::revoke_token))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/recreate-admin", post(auth::recreate_admin));

    // The ordinary 30s deadline wraps everything except empty-trash, which
    // carries its own longer deadline above — applying this layer after
    // merging empty-trash back in would shadow that override with a
    // shorter one.
    let timed_routes = Router::new()
        .merge(public_routes)
        .merge(upload_route)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(HTTP_REQUEST_DEADLINE)),
        );

    Router::new()
        .merge(timed_routes)
        .merge(empty_trash_route)
        .fallback_service(ServeDir::new(&ctx.config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(ctx)
}

/// Maps a `TimeoutLayer` expiry to the same `AppError` response shape every
/// other failure uses, rather than leaking tower's own error body.
async fn handle_timeout_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Transient("request deadline exceeded".into()).into_response()
    } else {
        AppError::Internal(err.to_string()).into_response()
    }
}
