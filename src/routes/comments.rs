//! Comment and reaction routes
//!
//! Reactions live under `/api/comments/:id/...` for both posts and comments;
//! `isPost` selects the target kind.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;

use crate::server::AppState;
use crate::services::{CreateCommentRequest, ReactionRequest};
use crate::types::Result;

use super::posts::parse_post_id;
use super::request::ApiRequest;
use super::response::{json_response, ok_json};
use super::voice::serve_voice;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionQuery {
    #[serde(default)]
    is_post: bool,
}

pub async fn create(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_post_id(post_id)?;
    let body: CreateCommentRequest = req.json()?;
    let created = state.comments.create(post_id, body).await?;
    Ok(json_response(StatusCode::CREATED, &created))
}

pub async fn list(state: &AppState, post_id: &str) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&state.comments.list(parse_post_id(post_id)?).await?))
}

pub async fn voice(
    state: &AppState,
    req: &ApiRequest,
    comment_ref: &str,
) -> Result<Response<Full<Bytes>>> {
    let stored = state.comments.voice(comment_ref).await?;
    serve_voice(req, &stored)
}

pub async fn react(
    state: &AppState,
    req: &ApiRequest,
    target: &str,
) -> Result<Response<Full<Bytes>>> {
    let body: ReactionRequest = req.json()?;
    Ok(ok_json(&state.reactions.toggle(target, body).await?))
}

pub async fn reactions(
    state: &AppState,
    req: &ApiRequest,
    target: &str,
) -> Result<Response<Full<Bytes>>> {
    let query: ReactionQuery = req.query()?;
    Ok(ok_json(&state.reactions.summary(target, query.is_post).await?))
}
