//! Session markers carried in cookies, and the middleware that checks them.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

use crate::application::error::HttpError;
use crate::application::session::Session;

use super::HttpState;

/// Cookie holding the opaque session token.
pub const TOKEN_MARKER: &str = "session_token";
/// Cookie holding the subject the token was issued to.
pub const SUBJECT_MARKER: &str = "user";

/// Authenticated subject, inserted by [`require_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

pub fn issue_markers(jar: CookieJar, session: &Session) -> CookieJar {
    let ttl = time::Duration::try_from(session.ttl).unwrap_or(time::Duration::MAX);
    let expires = OffsetDateTime::now_utc().saturating_add(ttl);

    let token = Cookie::build((TOKEN_MARKER, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(ttl)
        .expires(expires);
    let subject = Cookie::build((SUBJECT_MARKER, session.subject.clone()))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(ttl)
        .expires(expires);

    jar.add(token).add(subject)
}

/// Overwrites both markers with empty, already-expired cookies.
pub fn clear_markers(jar: CookieJar) -> CookieJar {
    let expired = OffsetDateTime::now_utc() - time::Duration::days(7);
    let clear = |name: &'static str| {
        Cookie::build((name, ""))
            .path("/")
            .max_age(time::Duration::ZERO)
            .expires(expired)
    };

    jar.add(clear(TOKEN_MARKER)).add(clear(SUBJECT_MARKER))
}

pub fn presented_markers(jar: &CookieJar) -> (Option<&str>, Option<&str>) {
    (
        jar.get(TOKEN_MARKER).map(|cookie| cookie.value()),
        jar.get(SUBJECT_MARKER).map(|cookie| cookie.value()),
    )
}

/// Rejects requests without a live session; a superseded token also clears the markers.
pub async fn require_session(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let (token, subject) = presented_markers(&jar);
    match state.sessions.validate(token, subject).await {
        Ok(subject) => {
            let user = CurrentUser(subject);
            request.extensions_mut().insert(user.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(user);
            response
        }
        Err(err) if err.clears_markers() => {
            (clear_markers(jar), HttpError::from(err)).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}
