//! Ledger routes
//!
//! Transactions are submitted with the caller's wallet header as sender.
//! Read routes expose the contract's view functions and the event log.

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::{
    Address, CommentId, CommentRecord, LogEntry, PostId, PostRecord, Transaction,
    TransactionRequest, Wei,
};
use crate::server::AppState;
use crate::types::{Result, ViviError};

use super::posts::parse_post_id;
use super::request::ApiRequest;
use super::response::ok_json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainPostView {
    #[serde(flatten)]
    record: PostRecord,
    likes: u64,
    dislikes: u64,
    comment_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainCommentView {
    #[serde(flatten)]
    record: CommentRecord,
    likes: u64,
    dislikes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReactionFlags {
    has_liked: bool,
    has_disliked: bool,
}

#[derive(Serialize)]
struct AccountView {
    address: Address,
    balance: Wei,
}

#[derive(Deserialize)]
struct FaucetBody {
    address: String,
    amount: Wei,
}

#[derive(Debug, Default, Deserialize)]
struct LogsQuery {
    #[serde(default)]
    since: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogsView {
    last_sequence: u64,
    entries: Vec<LogEntry>,
}

fn parse_comment_id(raw: &str) -> Result<CommentId> {
    raw.parse::<CommentId>()
        .map_err(|_| ViviError::BadRequest(format!("Invalid comment id: {}", raw)))
}

fn parse_wallet(raw: &str) -> Result<Address> {
    Address::parse(raw).map_err(|e| ViviError::BadRequest(e.to_string()))
}

pub async fn submit(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    let sender = req.wallet()?;
    let body: TransactionRequest = req.json()?;
    let tx = Transaction::new(sender, body.call).with_value(body.value);
    let receipt = state.ledger.submit(tx).await?;
    Ok(ok_json(&receipt))
}

pub async fn faucet(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    if !state.args.dev_mode {
        return Err(ViviError::Forbidden(
            "Faucet is only available in development mode".to_string(),
        ));
    }
    let body: FaucetBody = req.json()?;
    let address = parse_wallet(&body.address)?;
    let balance = state.ledger.credit(&address, body.amount).await;
    info!(address = %address, amount = %body.amount, "Faucet request served");
    Ok(ok_json(&AccountView { address, balance }))
}

pub async fn post(state: &AppState, post_id: &str) -> Result<Response<Full<Bytes>>> {
    let post_id: PostId = parse_post_id(post_id)?;
    let view = state
        .ledger
        .view(|c| {
            c.post(post_id).map(|record| ChainPostView {
                record: record.clone(),
                likes: c.post_likes(post_id),
                dislikes: c.post_dislikes(post_id),
                comment_count: c.post_comments(post_id).len(),
            })
        })
        .await
        .ok_or_else(|| ViviError::NotFound("Post does not exist".to_string()))?;
    Ok(ok_json(&view))
}

pub async fn post_comments(state: &AppState, post_id: &str) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_post_id(post_id)?;
    let ids = state
        .ledger
        .view(|c| c.post(post_id).map(|_| c.post_comments(post_id).to_vec()))
        .await
        .ok_or_else(|| ViviError::NotFound("Post does not exist".to_string()))?;
    Ok(ok_json(&ids))
}

pub async fn post_reactions(
    state: &AppState,
    post_id: &str,
    wallet: &str,
) -> Result<Response<Full<Bytes>>> {
    let post_id = parse_post_id(post_id)?;
    let wallet = parse_wallet(wallet)?;
    let flags = state
        .ledger
        .view(|c| ReactionFlags {
            has_liked: c.has_liked_post(&wallet, post_id),
            has_disliked: c.has_disliked_post(&wallet, post_id),
        })
        .await;
    Ok(ok_json(&flags))
}

pub async fn comment(state: &AppState, comment_id: &str) -> Result<Response<Full<Bytes>>> {
    let comment_id = parse_comment_id(comment_id)?;
    let view = state
        .ledger
        .view(|c| {
            c.comment(comment_id).map(|record| ChainCommentView {
                record: record.clone(),
                likes: c.comment_likes(comment_id),
                dislikes: c.comment_dislikes(comment_id),
            })
        })
        .await
        .ok_or_else(|| ViviError::NotFound("Comment does not exist".to_string()))?;
    Ok(ok_json(&view))
}

pub async fn account(state: &AppState, wallet: &str) -> Result<Response<Full<Bytes>>> {
    let address = parse_wallet(wallet)?;
    let balance = state.ledger.view(|c| c.balance_of(&address)).await;
    Ok(ok_json(&AccountView { address, balance }))
}

pub async fn logs(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    let query: LogsQuery = req.query()?;
    let entries = state.ledger.logs_since(query.since).await;
    let last_sequence = state.ledger.last_sequence().await;
    Ok(ok_json(&LogsView {
        last_sequence,
        entries,
    }))
}
