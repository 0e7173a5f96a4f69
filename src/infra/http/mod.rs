//! HTTP surface: account endpoints, the session gate, and the JSON API behind it.

mod auth;
mod middleware;
mod posts;
pub mod session;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::application::accounts::AccountService;
use crate::application::error::ErrorReport;
use crate::application::posts::PostService;
use crate::application::repos::{HealthRepo, RepoError};
use crate::application::session::SessionManager;
use crate::application::users::UserService;
use crate::cache::KvStore;

pub use middleware::RequestContext;
pub use session::CurrentUser;

#[derive(Clone)]
pub struct HttpState {
    pub sessions: Arc<SessionManager>,
    pub accounts: Arc<AccountService>,
    pub posts: Arc<PostService>,
    pub users: Arc<UserService>,
    pub kv: Arc<dyn KvStore>,
    pub database: Arc<dyn HealthRepo>,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct JsonMessage {
    pub success: bool,
    pub message: &'static str,
}

impl JsonMessage {
    pub fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let protected = Router::new()
        .route("/api/posts", get(posts::list_posts).post(posts::save_post))
        .route(
            "/api/posts/{id}",
            get(posts::view_post).delete(posts::delete_post),
        )
        .route("/api/vote", post(posts::vote))
        .route("/api/authors", get(posts::list_authors))
        .route("/api/users/{name}/rank", get(users::user_rank))
        .route("/api/admin/users", get(users::list_users))
        .route("/api/admin/ranks", post(users::save_ranks))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/signup", post(auth::sign_up))
        .route("/signin", post(auth::sign_in))
        .route("/logout", post(auth::log_out))
        .route("/_health", get(health))
        .route("/_health/db", get(db_health))
        .merge(protected)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.kv.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::kv_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.database.health_check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
