//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::ledger::Ledger;
use crate::routes;
use crate::services::{CommentService, PostService, ProfileService, ReactionService};
use crate::store::MirrorStore;
use crate::sync::{MirrorListener, Reconciler};
use crate::types::{Result, ViviError};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn MirrorStore>,
    pub ledger: Arc<Ledger>,
    pub posts: PostService,
    pub comments: CommentService,
    pub reactions: ReactionService,
    pub profiles: ProfileService,
    pub listener: Arc<MirrorListener>,
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// Deploy a fresh ledger and wire the services over `store`
    pub fn new(args: Args, store: Arc<dyn MirrorStore>) -> Result<Self> {
        let owner = args.contract_owner().map_err(ViviError::Config)?;
        let ledger = Arc::new(Ledger::new(owner, args.event_buffer));
        Ok(Self::with_ledger(args, store, ledger))
    }

    /// Wire the services over an existing ledger
    pub fn with_ledger(args: Args, store: Arc<dyn MirrorStore>, ledger: Arc<Ledger>) -> Self {
        let max_voice = args.max_voice_bytes;
        Self {
            posts: PostService::new(Arc::clone(&store), Arc::clone(&ledger), max_voice),
            comments: CommentService::new(Arc::clone(&store), Arc::clone(&ledger), max_voice),
            reactions: ReactionService::new(Arc::clone(&store)),
            profiles: ProfileService::new(Arc::clone(&store)),
            listener: Arc::new(MirrorListener::new(Arc::clone(&store), Arc::clone(&ledger))),
            reconciler: Arc::new(Reconciler::new(Arc::clone(&store), Arc::clone(&ledger))),
            args,
            store,
            ledger,
        }
    }

    /// Start the mirror listener and, if configured, periodic reconciliation
    pub fn spawn_sync_tasks(&self, shutdown: &broadcast::Sender<()>) {
        Arc::clone(&self.listener).spawn(shutdown.subscribe());

        match self.args.reconcile_interval() {
            Some(interval) => {
                Arc::clone(&self.reconciler).spawn_periodic(interval, shutdown.subscribe());
            }
            None => info!("Periodic reconciliation disabled"),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Vivi listening on {} (store: {})",
        state.args.listen,
        state.store.backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - faucet is open");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());

    let response = routes::route(state, req).await;
    Ok(to_boxed(response))
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
