use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::application::error::HttpError;
use crate::domain::entities::UserInfo;
use crate::domain::users::Credentials;

use super::session::{clear_markers, issue_markers, presented_markers};
use super::{HttpState, JsonMessage};

pub async fn sign_up(
    State(state): State<HttpState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<UserInfo>, HttpError> {
    let created = state.accounts.sign_up(&credentials).await?;
    Ok(Json(created))
}

pub async fn sign_in(
    State(state): State<HttpState>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<(CookieJar, Json<JsonMessage>), HttpError> {
    let session = state.sessions.sign_in(&credentials).await?;
    let jar = issue_markers(jar, &session);
    Ok((jar, Json(JsonMessage::ok("signed in"))))
}

/// Ends the caller's session when the markers are valid; the markers are cleared either way.
pub async fn log_out(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let (token, subject) = presented_markers(&jar);
    let outcome = match state.sessions.validate(token, subject).await {
        Ok(subject) => state.sessions.sign_out(&subject).await,
        Err(err) if err.is_unauthenticated() => {
            info!(
                target = "lectern::http::auth",
                error = %err,
                "logout without a live session"
            );
            Ok(())
        }
        Err(err) => Err(err),
    };

    let jar = clear_markers(jar);
    match outcome {
        Ok(()) => (jar, Json(JsonMessage::ok("signed out"))).into_response(),
        Err(err) => (jar, HttpError::from(err)).into_response(),
    }
}
