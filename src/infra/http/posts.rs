use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::application::error::HttpError;
use crate::application::posts::{PostView, SavePostCommand};
use crate::domain::entities::{PostInfo, PostRecord};
use crate::domain::types::Star;

use super::session::CurrentUser;
use super::{HttpState, JsonMessage};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SavePostRequest {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    pub id: i64,
    pub star: Star,
}

pub async fn list_posts(State(state): State<HttpState>) -> Result<Json<Vec<PostInfo>>, HttpError> {
    Ok(Json(state.posts.post_infos().await?))
}

pub async fn view_post(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<PostView>, HttpError> {
    Ok(Json(state.posts.view(&user, id).await?))
}

pub async fn save_post(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<SavePostRequest>,
) -> Result<Json<PostRecord>, HttpError> {
    let command = SavePostCommand {
        id: request.id,
        title: request.title,
        body: request.body,
    };
    Ok(Json(state.posts.save(&user, command).await?))
}

pub async fn delete_post(
    State(state): State<HttpState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<JsonMessage>, HttpError> {
    state.posts.delete(&user, id).await?;
    Ok(Json(JsonMessage::ok("post deleted")))
}

pub async fn vote(
    State(state): State<HttpState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<JsonMessage>, HttpError> {
    state.posts.vote(request.id, request.star).await?;
    Ok(Json(JsonMessage::ok("vote recorded")))
}

pub async fn list_authors(State(state): State<HttpState>) -> Result<Json<Vec<String>>, HttpError> {
    Ok(Json(state.posts.authors().await?))
}
