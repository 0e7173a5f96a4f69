use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::application::error::HttpError;
use crate::domain::entities::UserInfo;

use super::session::CurrentUser;
use super::{HttpState, JsonMessage};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveRanksRequest {
    pub pairs: Vec<UserInfo>,
}

pub async fn user_rank(
    State(state): State<HttpState>,
    Path(username): Path<String>,
) -> Result<Json<UserInfo>, HttpError> {
    let rank = state.users.rank(&username).await?;
    Ok(Json(UserInfo { username, rank }))
}

pub async fn list_users(
    State(state): State<HttpState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Vec<UserInfo>>, HttpError> {
    Ok(Json(state.users.list_users(&actor).await?))
}

pub async fn save_ranks(
    State(state): State<HttpState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(request): Json<SaveRanksRequest>,
) -> Result<Json<JsonMessage>, HttpError> {
    state.users.set_ranks(&actor, &request.pairs).await?;
    Ok(Json(JsonMessage::ok("ranks saved")))
}
