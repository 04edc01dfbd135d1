//! rmcp session setup for each transport

use std::sync::Arc;

use council_config::{HttpConfig, McpServerType, StdioConfig};
use rmcp::service::{RoleClient, RunningService, ServiceExt as _};
use rmcp::transport::TokioChildProcess;
use secrecy::ExposeSecret;

use crate::error::ToolError;

/// Open an MCP client session
pub(crate) async fn connect(server_type: &McpServerType) -> Result<RunningService<RoleClient, ()>, ToolError> {
    match server_type {
        McpServerType::Stdio(config) => connect_stdio(config).await,
        McpServerType::Sse(config) => connect_sse(config).await,
        McpServerType::StreamableHttp(config) => connect_streamable_http(config).await,
    }
}

async fn connect_stdio(config: &StdioConfig) -> Result<RunningService<RoleClient, ()>, ToolError> {
    let mut cmd = tokio::process::Command::new(&config.command);
    cmd.args(&config.args);
    for (k, v) in &config.env {
        cmd.env(k, v);
    }

    let transport =
        TokioChildProcess::new(cmd).map_err(|e| ToolError::Transport(format!("failed to spawn process: {e}")))?;

    ().serve(transport)
        .await
        .map_err(|e| ToolError::Transport(format!("STDIO handshake failed: {e}")))
}

async fn connect_sse(config: &HttpConfig) -> Result<RunningService<RoleClient, ()>, ToolError> {
    use rmcp::transport::SseClientTransport;
    use rmcp::transport::sse_client::SseClientConfig;

    let sse_config = SseClientConfig {
        sse_endpoint: Arc::from(config.url.as_str()),
        ..Default::default()
    };

    let transport = SseClientTransport::start_with_client(http_client(config)?, sse_config)
        .await
        .map_err(|e| ToolError::Transport(format!("SSE connection failed: {e}")))?;

    ().serve(transport)
        .await
        .map_err(|e| ToolError::Transport(format!("SSE handshake failed: {e}")))
}

async fn connect_streamable_http(config: &HttpConfig) -> Result<RunningService<RoleClient, ()>, ToolError> {
    use rmcp::transport::StreamableHttpClientTransport;
    use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;

    let mut transport_config = StreamableHttpClientTransportConfig::with_uri(config.url.as_str());
    if let Some(token) = &config.token {
        transport_config = transport_config.auth_header(format!("Bearer {}", token.expose_secret()));
    }

    let transport = StreamableHttpClientTransport::with_client(reqwest::Client::new(), transport_config);

    ().serve(transport)
        .await
        .map_err(|e| ToolError::Transport(format!("StreamableHTTP handshake failed: {e}")))
}

/// HTTP client carrying the server's bearer token, if any
fn http_client(config: &HttpConfig) -> Result<reqwest::Client, ToolError> {
    let mut builder = reqwest::Client::builder();

    if let Some(token) = &config.token {
        let mut headers = reqwest::header::HeaderMap::new();
        let val = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| ToolError::Transport(format!("invalid auth token: {e}")))?;
        headers.insert(reqwest::header::AUTHORIZATION, val);
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| ToolError::Transport(format!("failed to build HTTP client: {e}")))
}
