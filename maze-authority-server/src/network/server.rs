//! WebSocket Room Server
//!
//! Accepts real-time connections at `/ws?room=..&player=..&mode=..`, joins
//! each one to its room, and drives every running room with its own fixed
//! rate tick loop. A cleanup loop evicts rooms left empty for too long.
//!
//! Tick overlap policy: a room's ticks run one after another under the
//! room's write lock, and ticks missed while a slow tick was running are
//! skipped rather than replayed in a burst.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::input::InputOutcome;
use crate::game::state::PlayerId;
use crate::game::tick::RoomConfig;
use crate::network::ops::{ChaosControl, Metrics};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::registry::{RoomHandle, RoomRegistry};
use crate::network::room::CLIENT_QUEUE_DEPTH;
use crate::proof::receipt::{ReceiptError, ReceiptIssuer};
use crate::store::{Store, StoreError};

/// Path the WebSocket endpoint is served on.
pub const WS_PATH: &str = "/ws";

/// Mode used when a connection or seed request names none.
pub const DEFAULT_MODE: &str = "daily";

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket bind address.
    pub ws_addr: SocketAddr,
    /// HTTP bind address.
    pub http_addr: SocketAddr,
    /// WebSocket URL advertised by the seed endpoint.
    pub public_ws: String,
    /// Salt mixed into every derived seed.
    pub seed_salt: String,
    /// Receipt signing secret; the seed salt is used when unset.
    pub receipt_secret: Option<String>,
    /// `Dragonfly`/Redis URL; in-memory store when unset.
    pub redis_url: Option<String>,
    /// How long a room may sit with no connections before eviction.
    pub room_idle_timeout: Duration,
    /// How often idle rooms are swept.
    pub cleanup_interval: Duration,
    /// Protocol violations tolerated per connection before it is closed.
    pub max_protocol_violations: u32,
    /// Registry shard count.
    pub room_shards: usize,
    /// Simulation settings for new rooms.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], 8080));
        Self {
            ws_addr,
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            public_ws: default_public_ws(ws_addr.port()),
            seed_salt: "dev-salt".to_string(),
            receipt_secret: None,
            redis_url: None,
            room_idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(30),
            max_protocol_violations: 10,
            room_shards: 16,
            room: RoomConfig::default(),
        }
    }
}

fn default_public_ws(port: u16) -> String {
    format!("ws://localhost:{port}{WS_PATH}")
}

impl ServerConfig {
    /// Defaults overridden by environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let ws_port: u16 = env_parse("SERVER_PORT", config.ws_addr.port());
        config.ws_addr.set_port(ws_port);
        let http_port: u16 = env_parse("HTTP_PORT", config.http_addr.port());
        config.http_addr.set_port(http_port);

        config.public_ws = env_string("SERVER_PUBLIC_WS").unwrap_or_else(|| default_public_ws(ws_port));
        if let Some(salt) = env_string("DAILY_SEED_SALT") {
            config.seed_salt = salt;
        }
        config.receipt_secret = env_string("RECEIPT_SECRET");
        config.redis_url = env_string("REDIS_URL");

        let idle_secs = env_parse("ROOM_IDLE_TIMEOUT_SECS", config.room_idle_timeout.as_secs());
        config.room_idle_timeout = Duration::from_secs(idle_secs);
        config.room.tick_rate = env_parse("TICK_RATE", config.room.tick_rate).max(1);
        config.max_protocol_violations = env_parse("MAX_PROTOCOL_VIOLATIONS", config.max_protocol_violations);
        config.room_shards = env_parse("ROOM_SHARDS", config.room_shards).max(1);

        if config.receipt_secret.is_none() {
            warn!("RECEIPT_SECRET not set, signing receipts with the seed salt");
        }
        config
    }

    /// Key receipts are signed with.
    pub fn receipt_key(&self) -> &str {
        self.receipt_secret.as_deref().unwrap_or(&self.seed_salt)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match env_string(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "ignoring unparseable environment value");
            default
        }),
        None => default,
    }
}

// =============================================================================
// ERRORS & SHARED STATE
// =============================================================================

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind or accept.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Receipt issuer could not be built.
    #[error("Receipt issuer: {0}")]
    Receipt(#[from] ReceiptError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Everything the WebSocket and HTTP handlers share.
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Live rooms
    pub registry: RoomRegistry,
    /// Durable store
    pub store: Store,
    /// Receipt signer
    pub issuer: ReceiptIssuer,
    /// Chaos knobs
    pub chaos: ChaosControl,
    /// Counters
    pub metrics: Metrics,
}

impl AppState {
    /// Build the shared state over `store`.
    pub fn new(config: ServerConfig, store: Store) -> Result<Self, ServerError> {
        let issuer = ReceiptIssuer::new(config.receipt_key().as_bytes(), store.clone())?;
        let registry = RoomRegistry::new(
            config.room_shards,
            config.room.clone(),
            config.seed_salt.clone(),
            store.clone(),
            issuer.clone(),
        );
        Ok(Self {
            config,
            registry,
            store,
            issuer,
            chaos: ChaosControl::new(),
            metrics: Metrics::default(),
        })
    }
}

// =============================================================================
// CONNECTION PARAMETERS
// =============================================================================

/// Who a connection is and which room it joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Room to join; random when absent
    pub room_id: String,
    /// Player identity; random when absent
    pub player_id: PlayerId,
    /// Seed mode for a room created by this connection
    pub mode: String,
}

impl ConnectParams {
    /// Read `room`, `player` and `mode` from a URL query string.
    pub fn from_query(query: Option<&str>) -> Self {
        let (mut room, mut player, mut mode) = (None, None, None);
        for pair in query.unwrap_or_default().split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_decode(value);
            if value.is_empty() {
                continue;
            }
            match key {
                "room" => room = Some(value),
                "player" => player = Some(value),
                "mode" => mode = Some(value),
                _ => {}
            }
        }

        Self {
            room_id: room.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            player_id: PlayerId::new(player.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())),
            mode: mode.unwrap_or_else(|| DEFAULT_MODE.to_string()),
        }
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match hex::decode(&bytes[i + 1..i + 3]) {
                    Ok(decoded) => {
                        out.extend_from_slice(&decoded);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// =============================================================================
// SERVER
// =============================================================================

/// The WebSocket room server.
pub struct GameServer {
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server over shared state.
    pub fn new(state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { state, shutdown_tx }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.state.config.ws_addr).await?;
        info!("WebSocket server listening on {}", self.state.config.ws_addr);
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let cleanup_state = Arc::clone(&self.state);
        let cleanup_handle = tokio::spawn(async move {
            run_cleanup_loop(cleanup_state).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            tokio::spawn(handle_connection(Arc::clone(&self.state), stream, addr));
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Stop accepting connections.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

/// Serve one WebSocket connection from handshake to close.
async fn handle_connection(state: Arc<AppState>, stream: TcpStream, addr: SocketAddr) {
    let mut query = None;
    let handshake = accept_hdr_async(stream, |req: &Request, resp: Response| {
        if req.uri().path() != WS_PATH {
            let mut not_found = ErrorResponse::new(Some("not found".to_string()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            return Err(not_found);
        }
        query = req.uri().query().map(str::to_string);
        Ok(resp)
    })
    .await;

    let ws_stream = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let params = ConnectParams::from_query(query.as_deref());
    let room = match state.registry.get_or_create(&params.room_id, &params.mode).await {
        Ok(room) => room,
        Err(e) => {
            error!(room_id = %params.room_id, error = %e, "room could not be built");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(CLIENT_QUEUE_DEPTH);

    let attached = room.write().await.attach(params.player_id.clone(), msg_tx, crate::now_millis());
    let attached = match attached {
        Ok(a) => a,
        Err(e) => {
            warn!(room_id = %params.room_id, player_id = %params.player_id, error = %e, "attach refused");
            return;
        }
    };
    Metrics::incr(&state.metrics.connections_total);
    info!(
        room_id = %params.room_id,
        player_id = %params.player_id,
        conn_id = attached.conn_id,
        %addr,
        "player connected"
    );

    if attached.started {
        tokio::spawn(run_room_loop(Arc::clone(&state), Arc::clone(&room)));
    }

    // The room holds the only sender, so this ends when the room drops it.
    let mut sender_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut violations: u32 = 0;
    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let cmd = match ClientMessage::parse(&text) {
                            Ok(ClientMessage::Input(cmd)) => cmd,
                            Err(e) => {
                                Metrics::incr(&state.metrics.inputs_invalid);
                                debug!(player_id = %params.player_id, error = %e, "input dropped");
                                continue;
                            }
                        };

                        if !state.chaos.admit().await {
                            Metrics::incr(&state.metrics.inputs_dropped);
                            continue;
                        }

                        let outcome = room
                            .write()
                            .await
                            .handle_input(&params.player_id, attached.conn_id, &cmd, crate::now_millis());
                        match outcome {
                            Ok(InputOutcome::Applied) => Metrics::incr(&state.metrics.inputs_applied),
                            Ok(InputOutcome::Stale) => Metrics::incr(&state.metrics.inputs_stale),
                            Err(e) if e.is_protocol_violation() => {
                                Metrics::incr(&state.metrics.protocol_violations);
                                violations += 1;
                                warn!(player_id = %params.player_id, violations, error = %e, "protocol violation");
                                if violations >= state.config.max_protocol_violations {
                                    Metrics::incr(&state.metrics.violation_disconnects);
                                    warn!(player_id = %params.player_id, "too many protocol violations, disconnecting");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(player_id = %params.player_id, error = %e, "input not applied");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        Metrics::incr(&state.metrics.inputs_invalid);
                        debug!(player_id = %params.player_id, "binary frame dropped");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut sender_task => {
                debug!(player_id = %params.player_id, "outbound closed by room");
                break;
            }
        }
    }

    sender_task.abort();
    room.write().await.detach(&params.player_id, attached.conn_id);
    info!(room_id = %params.room_id, player_id = %params.player_id, conn_id = attached.conn_id, "player disconnected");
}

/// Tick one room at its configured rate until it stops.
async fn run_room_loop(state: Arc<AppState>, room: RoomHandle) {
    let (room_id, tick_rate) = {
        let r = room.read().await;
        (r.room_id().to_string(), r.config().tick_rate.max(1))
    };

    let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate));
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick of an interval completes immediately.
    tick_interval.tick().await;

    debug!(room_id = %room_id, tick_rate, "tick loop started");
    loop {
        tick_interval.tick().await;
        let ran = room.write().await.run_tick(crate::now_millis()).is_some();
        if !ran {
            break;
        }
        Metrics::incr(&state.metrics.ticks_total);
    }
    debug!(room_id = %room_id, "tick loop ended");
}

/// Periodically evict rooms with no connections.
async fn run_cleanup_loop(state: Arc<AppState>) {
    let mut sweep = interval(state.config.cleanup_interval);

    loop {
        sweep.tick().await;
        let evicted = state.registry.evict_idle(state.config.room_idle_timeout).await;
        for _ in &evicted {
            Metrics::incr(&state.metrics.rooms_evicted);
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted idle rooms");
        }
    }
}
