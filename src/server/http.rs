//! HTTP server implementation
//!
//! hyper http1 with TokioIo; one spawned task per connection. Routing is
//! a chain of prefix dispatchers, each of which returns None when the
//! path is not theirs.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::TokenValidator;
use crate::config::Args;
use crate::db::schemas::{WisdomPostDoc, USER_COLLECTION, WISDOM_POST_COLLECTION};
use crate::db::{MemoryUserStore, MongoClient, MongoCollection, MongoUserStore, UserStore};
use crate::payment::{OrderClient, PaymentGate};
use crate::progress::ProgressTracker;
use crate::routes;
use crate::routes::helpers::{cors_preflight, json_response, BoxBody, ErrorResponse};
use crate::types::{AshramError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// User records; MongoDB-backed, or in-memory in dev mode
    pub store: Arc<dyn UserStore>,
    /// Wisdom post collection; None when running without MongoDB
    pub posts: Option<MongoCollection<WisdomPostDoc>>,
    /// Payment verification gate; None when gateway keys are absent
    pub gate: Option<PaymentGate>,
    /// Order creation client; None when gateway keys are absent
    pub orders: Option<OrderClient>,
    pub tracker: ProgressTracker,
    pub tokens: TokenValidator,
    pub started_at: Instant,
}

impl AppState {
    /// Build application state from config and an optional MongoDB
    /// connection. Without MongoDB the user store is in-memory and the
    /// wisdom feed is unavailable.
    pub async fn new(args: Args, mongo: Option<MongoClient>) -> Result<Self> {
        let secret = args.identity_secret().ok_or_else(|| {
            AshramError::Config("identity token secret is not configured".into())
        })?;
        let tokens = TokenValidator::new(secret)?;

        let (store, posts): (Arc<dyn UserStore>, Option<MongoCollection<WisdomPostDoc>>) =
            match &mongo {
                Some(client) => {
                    let users = client.collection(USER_COLLECTION).await?;
                    let posts = client.collection(WISDOM_POST_COLLECTION).await?;
                    (Arc::new(MongoUserStore::new(users)), Some(posts))
                }
                None => {
                    warn!("running without MongoDB - user records are in-memory only");
                    (Arc::new(MemoryUserStore::new()), None)
                }
            };

        let (gate, orders) = match (&args.gateway_key_id, &args.gateway_key_secret) {
            (Some(key_id), Some(key_secret)) => {
                let gate = PaymentGate::new(Arc::clone(&store), key_secret.clone());
                let orders = OrderClient::new(
                    args.gateway_url.clone(),
                    key_id.clone(),
                    key_secret.clone(),
                    args.gateway_timeout_ms,
                )?;
                (Some(gate), Some(orders))
            }
            _ => {
                warn!("payment gateway keys not configured - payment endpoints disabled");
                (None, None)
            }
        };

        let tracker = ProgressTracker::new(Arc::clone(&store));

        Ok(Self {
            args,
            mongo,
            store,
            posts,
            gate,
            orders,
            tracker,
            tokens,
            started_at: Instant::now(),
        })
    }
}

/// Run the HTTP server until the process is killed
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Ashram listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - relaxed secrets in effect");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
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
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("{} {}", method, path);

    match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            return Ok(routes::health_check(&state));
        }
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            return Ok(routes::readiness_check(&state));
        }
        (Method::OPTIONS, p) if !p.starts_with("/api/") => {
            return Ok(cors_preflight());
        }
        _ => {}
    }

    // Each dispatcher consumes the request and returns None when the
    // path is not its own; try them in turn.
    let maybe = if path == "/api/session" || path == "/api/me" || path == "/api/me/theme" {
        routes::handle_account_request(req, state).await
    } else if path == "/api/create-order" || path == "/api/verify-payment" {
        routes::handle_payment_request(req, state).await
    } else if path.starts_with("/api/progress") || path.starts_with("/api/reader") {
        routes::handle_progress_request(req, state).await
    } else if path.starts_with("/api/wisdom") {
        routes::handle_wisdom_request(req, state).await
    } else if path.starts_with("/api/admin/") {
        routes::handle_admin_request(req, state).await
    } else if path == "/api/contact" {
        routes::handle_contact_request(req, state).await
    } else {
        None
    };

    Ok(maybe.unwrap_or_else(|| {
        json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse::new(format!("Not found: {}", path)),
        )
    }))
}
