//! Compile endpoints
//!
//! The WebSocket client sends one [`CompileRequest`] as its first text
//! message. The server answers with `output` messages while the build runs,
//! then one `complete` or `error` message, then closes.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use kiln_core::{BuildMessage, CompileRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::forge::{Compiler, ToolchainStatus};
use crate::server::{error::ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contracts/compile", post(compile))
        .route("/contracts/compile/stream", get(stream))
        .route("/contracts/check-env", get(check_env))
}

async fn compile(
    State(state): State<AppState>,
    payload: Result<Json<CompileRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    info!(project = %request.project_path.display(), "compile request");

    // nobody listens to lines on the request/response route
    let (lines, _) = mpsc::unbounded_channel();
    let response = match state.compiler().compile(&request, lines).await {
        Ok(result) => Json(result).into_response(),
        Err(body) => {
            debug!(error = %body.error, "build failed");
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
    };
    Ok(response)
}

async fn check_env(State(state): State<AppState>) -> Json<ToolchainStatus> {
    Json(state.compiler().check().await)
}

async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.compiler()))
}

fn to_message(message: &BuildMessage) -> Option<Message> {
    serde_json::to_string(message)
        .ok()
        .map(|json| Message::Text(json.into()))
}

/// Wait for the compile request, skipping pings and other non-text frames
async fn read_request(
    receiver: &mut SplitStream<WebSocket>,
) -> Option<Result<CompileRequest, String>> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                return Some(
                    serde_json::from_str(text.as_str()).map_err(|e| format!("Invalid request: {e}")),
                );
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn handle_socket(socket: WebSocket, compiler: Arc<dyn Compiler>) {
    let (mut sender, mut receiver) = socket.split();

    let request = match read_request(&mut receiver).await {
        Some(Ok(request)) => request,
        Some(Err(error)) => {
            warn!(%error, "rejecting stream request");
            let reply = BuildMessage::Error {
                error,
                output: String::new(),
            };
            if let Some(msg) = to_message(&reply) {
                let _ = sender.send(msg).await;
            }
            let _ = sender.close().await;
            return;
        }
        None => return,
    };
    info!(project = %request.project_path.display(), "streaming compile request");

    let (lines_tx, mut lines) = mpsc::unbounded_channel();
    let job = tokio::spawn(async move { compiler.compile(&request, lines_tx).await });

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    let Some(msg) = to_message(&BuildMessage::Output { line }) else {
                        continue;
                    };
                    if sender.send(msg).await.is_err() {
                        debug!("client went away, stopping build");
                        job.abort();
                        return;
                    }
                }
                // the compiler dropped its sender: the build is over
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    info!("client closed the stream, stopping build");
                    job.abort();
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let terminal = match job.await {
        Ok(Ok(result)) => BuildMessage::Complete { result },
        Ok(Err(body)) => BuildMessage::Error {
            error: body.error,
            output: body.output,
        },
        Err(e) => BuildMessage::Error {
            error: format!("build task failed: {e}"),
            output: String::new(),
        },
    };
    if let Some(msg) = to_message(&terminal) {
        if let Err(e) = sender.send(msg).await {
            debug!(error = %e, "could not deliver build result");
        }
    }
    let _ = sender.close().await;
}
