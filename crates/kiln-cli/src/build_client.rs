//! Build-service client over HTTP and WebSocket

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use kiln_core::{
    BuildChannel, BuildErrorBody, BuildMessage, BuildResult, BuildService, CompileRequest, Error,
    Result,
};
use reqwest::{StatusCode, Url};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

const COMPILE_PATH: &str = "api/contracts/compile";
const STREAM_PATH: &str = "api/contracts/compile/stream";

/// Talks to a build service such as the one started by `kiln serve`
#[derive(Debug, Clone)]
pub struct RemoteBuildService {
    base: Url,
    http: reqwest::Client,
}

fn transport(err: impl std::fmt::Display) -> Error {
    Error::BuildTransport(err.to_string())
}

impl RemoteBuildService {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base: Url = base_url
            .parse()
            .map_err(|e| transport(format!("invalid build service URL '{}': {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            http: reqwest::Client::new(),
        })
    }

    fn compile_url(&self) -> Result<Url> {
        self.base.join(COMPILE_PATH).map_err(transport)
    }

    fn stream_url(&self) -> Result<Url> {
        let mut url = self.base.join(STREAM_PATH).map_err(transport)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| transport(format!("cannot open a WebSocket to {}", self.base)))?;
        Ok(url)
    }
}

#[async_trait]
impl BuildService for RemoteBuildService {
    async fn compile(&self, request: &CompileRequest) -> Result<BuildResult> {
        let url = self.compile_url()?;
        debug!(%url, project = %request.project_path.display(), "POST compile");

        let response = self.http.post(url).json(request).send().await.map_err(transport)?;

        match response.status() {
            status if status.is_success() => response
                .json::<BuildResult>()
                .await
                .map_err(|e| transport(format!("malformed build response: {}", e))),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body: BuildErrorBody = response
                    .json()
                    .await
                    .map_err(|e| transport(format!("malformed build error: {}", e)))?;
                Err(Error::BuildFailure {
                    message: body.error,
                    log: body.output,
                })
            }
            status => Err(transport(format!("build service answered {}", status))),
        }
    }

    async fn open_channel(&self, request: &CompileRequest) -> Result<Box<dyn BuildChannel>> {
        let url = self.stream_url()?;
        debug!(%url, "opening build stream");

        let (mut socket, _) = connect_async(url.as_str()).await.map_err(transport)?;
        let payload = serde_json::to_string(request)?;
        socket.send(Message::text(payload)).await.map_err(transport)?;

        Ok(Box::new(WsBuildChannel { socket }))
    }
}

struct WsBuildChannel {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl BuildChannel for WsBuildChannel {
    async fn recv(&mut self) -> Result<Option<BuildMessage>> {
        loop {
            let message = match self.socket.next().await {
                None => return Ok(None),
                Some(message) => message.map_err(transport)?,
            };
            match message {
                Message::Text(text) => {
                    trace!(message = %text.as_str(), "build stream");
                    let parsed = serde_json::from_str(text.as_str())
                        .map_err(|e| transport(format!("malformed build message: {}", e)))?;
                    return Ok(Some(parsed));
                }
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            trace!(error = %e, "closing build stream");
        }
    }
}
