//! HTTP routes for Vivi
//!
//! [`route`] buffers the request, dispatches on method and path segments,
//! and renders any error as a JSON error response with CORS headers.

pub mod chain;
pub mod comments;
pub mod health;
pub mod posts;
pub mod request;
pub mod response;
pub mod sync;
pub mod users;
pub mod voice;

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use tracing::{debug, error};

use crate::server::AppState;
use crate::types::Result;

pub use request::ApiRequest;
pub use response::{error_response, not_found_response, preflight_response};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handle one request end to end
pub async fn route<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let req = match ApiRequest::read(req, state.args.max_body_bytes()).await {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };

    match dispatch(&state, &req).await {
        Ok(response) => response,
        Err(e) => {
            if e.status_code().is_server_error() {
                error!(method = %req.method, path = %req.path, error = %e, "Request failed");
            } else {
                debug!(method = %req.method, path = %req.path, error = %e, "Request rejected");
            }
            error_response(&e)
        }
    }
}

async fn dispatch(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    let segments: Vec<&str> = req
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (req.method.clone(), segments.as_slice()) {
        // CORS preflight
        (Method::OPTIONS, _) => Ok(preflight_response()),

        // Health
        (Method::GET, ["health"] | ["healthz"]) => Ok(health::health_check(state).await),
        (Method::GET, ["ready"] | ["readyz"]) => Ok(health::readiness_check(state).await),
        (Method::GET, ["version"]) => Ok(health::version()),

        // Posts
        (Method::POST, ["api", "posts"]) => posts::create(state, req).await,
        (Method::GET, ["api", "posts"]) => posts::list(state, req).await,
        (Method::GET, ["api", "posts", "user", wallet]) => posts::list_by_user(state, wallet).await,
        (Method::GET, ["api", "posts", id]) => posts::get(state, id).await,
        (Method::PUT, ["api", "posts", id]) => posts::update(state, req, id).await,
        (Method::DELETE, ["api", "posts", id]) => posts::delete(state, req, id).await,
        (Method::GET, ["api", "posts", id, "voice"]) => posts::voice(state, req, id).await,
        (Method::POST, ["api", "posts", id, "bounty"]) => posts::add_bounty(state, req, id).await,
        (Method::PUT, ["api", "posts", id, "bounty-status"]) => {
            posts::set_bounty_status(state, req, id).await
        }
        (Method::POST, ["api", "posts", id, "pay-bounty"]) => {
            posts::pay_bounty(state, req, id).await
        }

        // Bounties
        (Method::GET, ["api", "bounties", "active"]) => posts::active_bounties(state).await,
        (Method::POST, ["api", "bounties", id, "award"]) => {
            posts::award_bounty(state, req, id).await
        }

        // Comments and reactions
        (Method::GET, ["api", "comments", "comments", id, "voice"]) => {
            comments::voice(state, req, id).await
        }
        (Method::POST, ["api", "comments", post_id, "comments"]) => {
            comments::create(state, req, post_id).await
        }
        (Method::GET, ["api", "comments", post_id, "comments"]) => {
            comments::list(state, post_id).await
        }
        (Method::POST, ["api", "comments", id, "reaction"]) => comments::react(state, req, id).await,
        (Method::GET, ["api", "comments", id, "reactions"]) => {
            comments::reactions(state, req, id).await
        }

        // Profiles
        (Method::POST, ["api", "users", "profile"]) => users::upsert_profile(state, req).await,
        (Method::GET, ["api", "users", "profile", wallet]) => users::get_profile(state, wallet).await,

        // Ledger
        (Method::POST, ["api", "chain", "transactions"]) => chain::submit(state, req).await,
        (Method::POST, ["api", "chain", "faucet"]) => chain::faucet(state, req).await,
        (Method::GET, ["api", "chain", "posts", id]) => chain::post(state, id).await,
        (Method::GET, ["api", "chain", "posts", id, "comments"]) => {
            chain::post_comments(state, id).await
        }
        (Method::GET, ["api", "chain", "posts", id, "reactions", wallet]) => {
            chain::post_reactions(state, id, wallet).await
        }
        (Method::GET, ["api", "chain", "comments", id]) => chain::comment(state, id).await,
        (Method::GET, ["api", "chain", "accounts", wallet]) => chain::account(state, wallet).await,
        (Method::GET, ["api", "chain", "logs"]) => chain::logs(state, req).await,

        // Mirror sync
        (Method::GET, ["api", "sync", "status"]) => sync::status(state).await,
        (Method::POST, ["api", "sync", "reconcile"]) => sync::reconcile(state).await,

        _ => Ok(not_found_response(&req.path)),
    }
}
