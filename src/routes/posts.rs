//! Post and bounty routes
//!
//! - `POST /api/posts`, `GET /api/posts`, `GET /api/posts/user/:wallet`
//! - `GET|PUT|DELETE /api/posts/:postId`, `GET /api/posts/:postId/voice`
//! - `POST /api/posts/:postId/bounty`, `PUT /api/posts/:postId/bounty-status`,
//!   `POST /api/posts/:postId/pay-bounty`
//! - `GET /api/bounties/active`, `POST /api/bounties/:postId/award`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;

use crate::ledger::{PostId, Wei};
use crate::server::AppState;
use crate::services::{CreatePostRequest, ListPostsParams, UpdatePostRequest};
use crate::types::{Result, ViviError};

use super::request::ApiRequest;
use super::response::{json_response, ok_json};
use super::voice::serve_voice;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BountyBody {
    bounty_amount: Wei,
}

#[derive(Deserialize)]
struct BountyStatusBody {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipientBody {
    recipient_address: String,
}

pub(crate) fn parse_post_id(raw: &str) -> Result<PostId> {
    raw.parse::<PostId>()
        .map_err(|_| ViviError::BadRequest(format!("Invalid post id: {}", raw)))
}

pub async fn create(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    let body: CreatePostRequest = req.json()?;
    let created = state.posts.create(body).await?;
    Ok(json_response(StatusCode::CREATED, &created))
}

pub async fn list(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    let params: ListPostsParams = req.query()?;
    Ok(ok_json(&state.posts.list(params).await?))
}

pub async fn list_by_user(state: &AppState, wallet: &str) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&state.posts.list_by_user(wallet).await?))
}

pub async fn get(state: &AppState, post_id: &str) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&state.posts.get(parse_post_id(post_id)?).await?))
}

pub async fn update(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let wallet = req.wallet()?;
    let post_id = parse_post_id(post_id)?;
    let body: UpdatePostRequest = req.json()?;
    Ok(ok_json(&state.posts.update(post_id, &wallet, body).await?))
}

pub async fn delete(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let wallet = req.wallet()?;
    let post_id = parse_post_id(post_id)?;
    state.posts.delete(post_id, &wallet).await?;
    Ok(ok_json(&serde_json::json!({ "status": "success", "postId": post_id })))
}

pub async fn voice(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let stored = state.posts.voice(parse_post_id(post_id)?).await?;
    serve_voice(req, &stored)
}

pub async fn add_bounty(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_post_id(post_id)?;
    let body: BountyBody = req
        .json()
        .map_err(|_| ViviError::BadRequest("Invalid bounty amount".to_string()))?;
    Ok(ok_json(&state.posts.add_bounty(post_id, body.bounty_amount).await?))
}

pub async fn set_bounty_status(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let wallet = req.wallet()?;
    let post_id = parse_post_id(post_id)?;
    let body: BountyStatusBody = req.json()?;
    Ok(ok_json(
        &state
            .posts
            .set_bounty_status(post_id, &wallet, &body.status)
            .await?,
    ))
}

pub async fn pay_bounty(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_post_id(post_id)?;
    let body: RecipientBody = req.json()?;
    Ok(ok_json(
        &state
            .posts
            .pay_bounty(post_id, &body.recipient_address)
            .await?,
    ))
}

pub async fn active_bounties(state: &AppState) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&state.posts.active_bounties().await?))
}

pub async fn award_bounty(
    state: &AppState,
    req: &ApiRequest,
    post_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let wallet = req.wallet()?;
    let post_id = parse_post_id(post_id)?;
    let body: RecipientBody = req.json()?;
    Ok(ok_json(
        &state
            .posts
            .award_bounty(post_id, &wallet, &body.recipient_address)
            .await?,
    ))
}
