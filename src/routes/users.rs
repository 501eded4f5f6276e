//! Profile routes

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;

use crate::server::AppState;
use crate::services::ProfileRequest;
use crate::types::Result;

use super::request::ApiRequest;
use super::response::ok_json;

pub async fn upsert_profile(state: &AppState, req: &ApiRequest) -> Result<Response<Full<Bytes>>> {
    let body: ProfileRequest = req.json()?;
    Ok(ok_json(&state.profiles.upsert(body).await?))
}

pub async fn get_profile(state: &AppState, wallet: &str) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&state.profiles.get(wallet).await?))
}
