//! Mirror sync routes

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::Serialize;

use crate::server::AppState;
use crate::sync::{ListenerStatus, ReconcileReport};
use crate::types::Result;

use super::response::ok_json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncStatus<'a> {
    deployment_id: &'a str,
    ledger_sequence: u64,
    listener: ListenerStatus,
    last_reconcile: Option<ReconcileReport>,
}

pub async fn status(state: &AppState) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&SyncStatus {
        deployment_id: state.ledger.deployment_id(),
        ledger_sequence: state.ledger.last_sequence().await,
        listener: state.listener.status(),
        last_reconcile: state.reconciler.last_report().await,
    }))
}

pub async fn reconcile(state: &AppState) -> Result<Response<Full<Bytes>>> {
    Ok(ok_json(&state.reconciler.run().await?))
}
