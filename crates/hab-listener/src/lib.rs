//! Local HTTP listener the alarm device pushes events to.
//!
//! | Route | Effect |
//! |---|---|
//! | `/arm`, `/disarm` | set the shared state, broadcast a notice |
//! | `/status` | `{"state": "ARMED" | "DISARMED"}` |
//! | `/alarm`, `/success` | broadcast a notice |
//! | `POST /video` | multipart field `file`, broadcast as a video |

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{any, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use hab_core::{
    domain::AlarmState, orchestrator::AlarmBot, state::Store, Error as CoreError,
    Result as CoreResult,
};

mod error;

pub use error::ApiError;

pub const NOTICE_ARMED: &str = "🔒 System Armed (via local API)";
pub const NOTICE_DISARMED: &str = "🔓 System Disarmed (via local API)";
pub const NOTICE_ALARM: &str = "🚨 ALARM TRIGGERED";
pub const NOTICE_SUCCESS: &str = "✅ Alarm disarmed via PIN";
pub const VIDEO_CAPTION: &str = "🎥 Alarm clip";

const VIDEO_FIELD: &str = "file";

/// Shared state accessible to all listener handlers.
#[derive(Clone)]
pub struct ListenerState {
    pub store: Arc<Store>,
    pub bot: Arc<AlarmBot>,
}

impl ListenerState {
    pub fn new(bot: Arc<AlarmBot>) -> Self {
        Self {
            store: bot.store().clone(),
            bot,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: AlarmState,
}

/// Build the listener router. `/video` bodies above `video_max_bytes` are refused.
pub fn router(state: ListenerState, video_max_bytes: usize) -> Router {
    Router::new()
        .route("/arm", any(arm_handler))
        .route("/disarm", any(disarm_handler))
        .route("/status", any(status_handler))
        .route("/alarm", any(alarm_handler))
        .route("/success", any(success_handler))
        .route(
            "/video",
            post(video_handler).layer(DefaultBodyLimit::max(video_max_bytes)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listener socket. Failing to bind is a startup error.
pub async fn bind(addr: SocketAddr) -> CoreResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| CoreError::Config(format!("failed to bind {addr}: {e}")))
}

/// Serve on an already bound socket until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: ListenerState,
    video_max_bytes: usize,
    cancel: CancellationToken,
) -> CoreResult<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("local listener on {addr}");
    }

    axum::serve(listener, router(state, video_max_bytes))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

async fn arm_handler(State(state): State<ListenerState>) -> StatusCode {
    state.store.set(AlarmState::Armed);
    state.bot.broadcast(NOTICE_ARMED).await;
    StatusCode::OK
}

async fn disarm_handler(State(state): State<ListenerState>) -> StatusCode {
    state.store.set(AlarmState::Disarmed);
    state.bot.broadcast(NOTICE_DISARMED).await;
    StatusCode::OK
}

async fn status_handler(State(state): State<ListenerState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.store.get(),
    })
}

async fn alarm_handler(State(state): State<ListenerState>) -> StatusCode {
    tracing::warn!("alarm triggered by device");
    state.bot.broadcast(NOTICE_ALARM).await;
    StatusCode::OK
}

async fn success_handler(State(state): State<ListenerState>) -> StatusCode {
    state.bot.broadcast(NOTICE_SUCCESS).await;
    StatusCode::OK
}

async fn video_handler(
    State(state): State<ListenerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, ApiError> {
    let mut multipart = multipart?;

    let video = loop {
        let Some(field) = multipart.next_field().await? else {
            return Err(ApiError::MissingField(VIDEO_FIELD));
        };
        if field.name() == Some(VIDEO_FIELD) {
            break field.bytes().await?;
        }
    };

    state
        .bot
        .broadcast_video(&video[..], VIDEO_CAPTION)
        .await
        .map_err(ApiError::Broadcast)?;

    Ok(StatusCode::OK)
}
