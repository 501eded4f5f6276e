//! REST API integration tests
//!
//! Drives `routes::route` directly with buffered bodies against an
//! in-memory mirror and a fresh development ledger:
//! - Post lifecycle: chain create, content push, bounty award
//! - Comment push before the chain event, then adoption
//! - Voice upload and ranged playback
//! - Error rendering, CORS and the dev-only faucet

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request, StatusCode};
use serde_json::{json, Value};

use vivi::content::content_address;
use vivi::routes;
use vivi::store::{MemoryStore, MirrorStore};
use vivi::{AppState, Args};

const ALICE: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";
const ONE_ETHER: &str = "1000000000000000000";

// =============================================================================
// Helpers
// =============================================================================

fn dev_state() -> Arc<AppState> {
    let args = Args::parse_from(["vivi", "--dev-mode"]);
    let store: Arc<dyn MirrorStore> = Arc::new(MemoryStore::new());
    Arc::new(AppState::new(args, store).unwrap())
}

struct Reply {
    status: StatusCode,
    headers: hyper::HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn call(
    state: &Arc<AppState>,
    method: Method,
    uri: &str,
    wallet: Option<&str>,
    body: Option<Value>,
) -> Reply {
    call_with(state, method, uri, wallet, body, &[]).await
}

async fn call_with(
    state: &Arc<AppState>,
    method: Method,
    uri: &str,
    wallet: Option<&str>,
    body: Option<Value>,
    extra_headers: &[(&str, &str)],
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(wallet) = wallet {
        builder = builder.header("x-wallet-address", wallet);
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    let bytes = body
        .map(|b| Bytes::from(serde_json::to_vec(&b).unwrap()))
        .unwrap_or_default();
    let req = builder.body(Full::new(bytes)).unwrap();

    let response = routes::route(Arc::clone(state), req).await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        body,
    }
}

/// Create a post on the ledger as `creator` and let the listener mirror it
async fn chain_post(
    state: &Arc<AppState>,
    creator: &str,
    hash: &str,
    post_type: &str,
    value: &str,
) -> u64 {
    let reply = call(
        state,
        Method::POST,
        "/api/chain/transactions",
        Some(creator),
        Some(json!({
            "method": "createPost",
            "contentHash": hash,
            "postType": post_type,
            "value": value,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
    state.listener.catch_up().await;
    reply.json()["issuedId"].as_u64().unwrap()
}

async fn fund(state: &Arc<AppState>, address: &str, amount: &str) {
    let reply = call(
        state,
        Method::POST,
        "/api/chain/faucet",
        None,
        Some(json!({ "address": address, "amount": amount })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
}

// =============================================================================
// Posts and bounties
// =============================================================================

#[tokio::test]
async fn test_post_lifecycle_with_bounty_award() {
    let state = dev_state();
    fund(&state, ALICE, "5000000000000000000").await;

    let text = "Who can fix my bike?";
    let hash = content_address(text.as_bytes());
    let post_id = chain_post(&state, ALICE, &hash, "TEXT", ONE_ETHER).await;
    assert_eq!(post_id, 1);

    // Listener mirrored the chain post without content
    let reply = call(&state, Method::GET, "/api/posts/1", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["contentPending"], json!(true));

    let reply = call(
        &state,
        Method::POST,
        "/api/posts",
        None,
        Some(json!({ "type": "TEXT", "author": ALICE, "content": text, "postId": post_id })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let created = reply.json();
    assert_eq!(created["contentHash"], json!(hash));
    assert_eq!(created["post"]["content"]["text"], json!(text));
    assert_eq!(created["post"]["bountyAmount"], json!(ONE_ETHER));
    assert_eq!(created["post"]["bountyStatus"], json!("OPEN"));

    let reply = call(&state, Method::GET, "/api/bounties/active", None, None).await;
    assert_eq!(reply.json().as_array().unwrap().len(), 1);

    let reply = call(
        &state,
        Method::POST,
        "/api/chain/transactions",
        Some(ALICE),
        Some(json!({ "method": "awardBounty", "postId": post_id, "winner": BOB })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    state.listener.catch_up().await;

    let post = call(&state, Method::GET, "/api/posts/1", None, None).await.json();
    assert_eq!(post["status"], json!("COMPLETED"));
    assert_eq!(post["bountyStatus"], json!("CLOSED"));
    assert_eq!(post["bountyPaidTo"], json!(BOB));
    assert_eq!(post["bountyAmount"], json!("0"));

    let reply = call(&state, Method::GET, "/api/bounties/active", None, None).await;
    assert!(reply.json().as_array().unwrap().is_empty());

    let account = call(&state, Method::GET, &format!("/api/chain/accounts/{}", BOB), None, None)
        .await
        .json();
    assert_eq!(account["balance"], json!(ONE_ETHER));
}

#[tokio::test]
async fn test_push_with_mismatched_hash_is_rejected() {
    let state = dev_state();
    let hash = content_address(b"original");
    let post_id = chain_post(&state, ALICE, &hash, "TEXT", "0").await;

    let reply = call(
        &state,
        Method::POST,
        "/api/posts",
        None,
        Some(json!({ "type": "TEXT", "author": ALICE, "content": "tampered", "postId": post_id })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json()["code"], json!("CONFLICT"));
}

#[tokio::test]
async fn test_delete_requires_creator_wallet() {
    let state = dev_state();
    let text = "temporary";
    let post_id = chain_post(&state, ALICE, &content_address(text.as_bytes()), "TEXT", "0").await;
    let uri = format!("/api/posts/{}", post_id);

    let reply = call(&state, Method::DELETE, &uri, None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = call(&state, Method::DELETE, &uri, Some(BOB), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = call(&state, Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["postId"], json!(post_id));

    let reply = call(&state, Method::GET, &uri, None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reverted_transaction_maps_to_422() {
    let state = dev_state();
    let reply = call(
        &state,
        Method::POST,
        "/api/chain/transactions",
        Some(ALICE),
        Some(json!({ "method": "cancelPost", "postId": 42 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.json()["code"], json!("REVERTED"));
    assert_eq!(state.ledger.last_sequence().await, 0);
}

// =============================================================================
// Comments and reactions
// =============================================================================

#[tokio::test]
async fn test_comment_pushed_before_chain_event_is_adopted() {
    let state = dev_state();
    let post_id = chain_post(&state, ALICE, &content_address(b"post"), "TEXT", "0").await;

    let comment = "Try a new chain";
    let comment_hash = content_address(comment.as_bytes());
    let reply = call(
        &state,
        Method::POST,
        &format!("/api/comments/{}/comments", post_id),
        None,
        Some(json!({ "type": "TEXT", "content": comment, "creatorAddress": BOB })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let key = reply.json()["commentId"].as_str().unwrap().to_string();

    let reply = call(
        &state,
        Method::POST,
        "/api/chain/transactions",
        Some(BOB),
        Some(json!({
            "method": "addComment",
            "postId": post_id,
            "contentHash": comment_hash,
            "commentType": "TEXT",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    state.listener.catch_up().await;

    let listed = call(
        &state,
        Method::GET,
        &format!("/api/comments/{}/comments", post_id),
        None,
        None,
    )
    .await
    .json();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["commentKey"], json!(key));
    assert_eq!(listed[0]["chainCommentId"], json!(1));
    assert_eq!(listed[0]["chainSynced"], json!(true));
    assert_eq!(listed[0]["content"]["text"], json!(comment));

    let post = call(&state, Method::GET, &format!("/api/posts/{}", post_id), None, None)
        .await
        .json();
    assert_eq!(post["commentCount"], json!(1));
}

#[tokio::test]
async fn test_reaction_toggle_on_post() {
    let state = dev_state();
    let post_id = chain_post(&state, ALICE, &content_address(b"react"), "TEXT", "0").await;
    let uri = format!("/api/comments/{}/reaction", post_id);

    let reply = call(
        &state,
        Method::POST,
        &uri,
        None,
        Some(json!({ "type": "like", "isPost": true, "creatorAddress": BOB })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "likes": 1, "dislikes": 0 }));

    let reply = call(
        &state,
        Method::POST,
        &uri,
        None,
        Some(json!({ "type": "dislike", "isPost": true, "creatorAddress": BOB })),
    )
    .await;
    assert_eq!(reply.json(), json!({ "likes": 0, "dislikes": 1 }));

    let summary = call(
        &state,
        Method::GET,
        &format!("/api/comments/{}/reactions?isPost=true", post_id),
        None,
        None,
    )
    .await
    .json();
    assert_eq!(summary["dislikedBy"], json!([BOB]));
}

// =============================================================================
// Voice
// =============================================================================

#[tokio::test]
async fn test_voice_post_serves_ranges() {
    let state = dev_state();
    let audio: Vec<u8> = (0u8..32).collect();
    let post_id = chain_post(&state, ALICE, &content_address(&audio), "VOICE", "0").await;

    let reply = call(
        &state,
        Method::POST,
        "/api/posts",
        None,
        Some(json!({
            "type": "VOICE",
            "author": ALICE,
            "postId": post_id,
            "voice": { "data": STANDARD.encode(&audio), "contentType": "audio/webm" },
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);

    let uri = format!("/api/posts/{}/voice", post_id);
    let full = call(&state, Method::GET, &uri, None, None).await;
    assert_eq!(full.status, StatusCode::OK);
    assert_eq!(full.headers[header::CONTENT_TYPE], "audio/webm");
    assert_eq!(full.body.as_ref(), audio.as_slice());
    let etag = full.headers[header::ETAG].to_str().unwrap().to_string();
    assert_eq!(etag, format!("\"{}\"", content_address(&audio)));

    let cached = call_with(&state, Method::GET, &uri, None, None, &[("if-none-match", etag.as_str())]).await;
    assert_eq!(cached.status, StatusCode::NOT_MODIFIED);
    assert!(cached.body.is_empty());

    let partial = call_with(&state, Method::GET, &uri, None, None, &[("range", "bytes=0-3")]).await;
    assert_eq!(partial.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.headers[header::CONTENT_RANGE], "bytes 0-3/32");
    assert_eq!(partial.body.as_ref(), &[0u8, 1, 2, 3]);

    let bad = call_with(&state, Method::GET, &uri, None, None, &[("range", "bytes=64-")]).await;
    assert_eq!(bad.status, StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_voice_upload_rejects_non_audio() {
    let state = dev_state();
    let post_id = chain_post(&state, ALICE, "bafkreifake", "VOICE", "0").await;

    let reply = call(
        &state,
        Method::POST,
        "/api/posts",
        None,
        Some(json!({
            "type": "VOICE",
            "author": ALICE,
            "postId": post_id,
            "voice": { "data": STANDARD.encode(b"hello"), "contentType": "text/plain" },
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], json!("Only audio files are allowed"));
}

// =============================================================================
// Surface
// =============================================================================

#[tokio::test]
async fn test_unknown_route_and_preflight() {
    let state = dev_state();

    let reply = call(&state, Method::GET, "/api/nothing-here", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = call(&state, Method::OPTIONS, "/api/posts", None, None).await;
    assert!(reply.status.is_success());
    assert!(reply
        .headers
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_faucet_is_closed_outside_dev_mode() {
    let args = Args::parse_from(["vivi", "--contract-owner", ALICE]);
    let store: Arc<dyn MirrorStore> = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(args, store).unwrap());

    let reply = call(
        &state,
        Method::POST,
        "/api/chain/faucet",
        None,
        Some(json!({ "address": BOB, "amount": ONE_ETHER })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_reports_ledger_and_cursor() {
    let state = dev_state();
    chain_post(&state, ALICE, &content_address(b"health"), "TEXT", "0").await;

    let health = call(&state, Method::GET, "/health", None, None).await.json();
    assert_eq!(health["healthy"], json!(true));
    assert_eq!(health["mode"], json!("development"));
    assert_eq!(health["store"], json!("memory"));
    assert_eq!(health["ledgerSequence"], json!(1));
    assert_eq!(health["mirrorCursor"], json!(1));

    let ready = call(&state, Method::GET, "/ready", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);
}
