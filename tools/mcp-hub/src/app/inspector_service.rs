use anyhow::{Context, Result, anyhow};
use rmcp::{
    RoleClient, ServiceExt,
    service::RunningService,
    transport::{
        child_process::TokioChildProcess, sse_client::SseClientTransport,
        streamable_http_client::{StreamableHttpClientTransport, StreamableHttpClientTransportConfig},
    },
};
use serde::de::DeserializeOwned;
use std::{process::Stdio, time::Duration};
use tokio::{process::Command, time::timeout};

use crate::shared::{
    types::{DiscoveryRequest, RawPrompt, RawResource, RawTool},
    utils::split_args,
};

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Protocols the service knows how to connect with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetProtocol {
    Stdio,
    Sse,
    StreamableHttp,
}

impl TargetProtocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "sse" => Some(Self::Sse),
            "streamable-http" | "streamable_http" | "streamablehttp" | "http" => {
                Some(Self::StreamableHttp)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable-http",
        }
    }
}

/// Everything listed by one target server, in wire form.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub tools: Vec<RawTool>,
    pub prompts: Vec<RawPrompt>,
    pub resources: Vec<RawResource>,
}

#[derive(Clone)]
pub struct InspectorService {
    handshake_timeout: Duration,
    http: reqwest::Client,
}

impl Default for InspectorService {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl InspectorService {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self {
            handshake_timeout,
            http: reqwest::Client::new(),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub async fn discover(&self, req: &DiscoveryRequest) -> Result<Listing> {
        let protocol = TargetProtocol::parse(&req.protocol)
            .ok_or_else(|| anyhow!("unsupported protocol '{}'", req.protocol))?;
        let client = match protocol {
            TargetProtocol::Stdio => self.connect_stdio(req).await?,
            TargetProtocol::Sse => self.connect_sse(req).await?,
            TargetProtocol::StreamableHttp => self.connect_http(req).await?,
        };
        let listing = collect_listing(&client).await;
        if let Err(err) = client.cancel().await {
            tracing::debug!(%err, "target client did not shut down cleanly");
        }
        listing
    }

    async fn connect_stdio(&self, req: &DiscoveryRequest) -> Result<RunningService<RoleClient, ()>> {
        let program = req
            .command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .ok_or_else(|| anyhow!("command is required for stdio transport"))?;
        let args = match req.args.as_deref() {
            Some(raw) if !raw.trim().is_empty() => split_args(raw)?,
            _ => Vec::new(),
        };
        let mut cmd = Command::new(program);
        cmd.args(&args);
        if let Some(env) = &req.env {
            for (k, v) in env {
                cmd.env(k, v);
            }
        }
        if let Some(cwd) = req.cwd.as_deref().filter(|c| !c.trim().is_empty()) {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let transport =
            TokioChildProcess::new(cmd).with_context(|| format!("spawn stdio target '{program}'"))?;
        timeout(self.handshake_timeout, ().serve(transport))
            .await
            .map_err(|_| {
                anyhow!(
                    "stdio handshake timed out after {} ms",
                    self.handshake_timeout.as_millis()
                )
            })?
            .context("initialize stdio target")
    }

    async fn connect_sse(&self, req: &DiscoveryRequest) -> Result<RunningService<RoleClient, ()>> {
        let url = required_url(req)?;
        let transport = SseClientTransport::start(url.to_string())
            .await
            .context("open sse stream")?;
        timeout(self.handshake_timeout, ().serve(transport))
            .await
            .map_err(|_| {
                anyhow!(
                    "sse handshake timed out after {} ms",
                    self.handshake_timeout.as_millis()
                )
            })?
            .context("initialize sse target")
    }

    async fn connect_http(&self, req: &DiscoveryRequest) -> Result<RunningService<RoleClient, ()>> {
        let url = required_url(req)?;
        let cfg = StreamableHttpClientTransportConfig::with_uri(url.to_string());
        let transport = StreamableHttpClientTransport::with_client(self.http.clone(), cfg);
        timeout(self.handshake_timeout, ().serve(transport))
            .await
            .map_err(|_| {
                anyhow!(
                    "http handshake timed out after {} ms",
                    self.handshake_timeout.as_millis()
                )
            })?
            .context("initialize http target")
    }
}

fn required_url(req: &DiscoveryRequest) -> Result<&str> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(anyhow!("url is required for {} transport", req.protocol));
    }
    Ok(url)
}

async fn collect_listing(client: &RunningService<RoleClient, ()>) -> Result<Listing> {
    let tools = client.list_all_tools().await.context("list tools")?;
    let tools: Vec<RawTool> = to_wire(&tools).context("decode tools")?;

    let (has_prompts, has_resources) = client
        .peer_info()
        .map(|info| {
            (
                info.capabilities.prompts.is_some(),
                info.capabilities.resources.is_some(),
            )
        })
        .unwrap_or((false, false));

    let mut prompts = Vec::new();
    if has_prompts {
        match client.list_all_prompts().await {
            Ok(listed) => prompts = decode_or_warn(&listed, "prompts"),
            Err(err) => tracing::warn!(%err, "list prompts failed"),
        }
    }
    let mut resources = Vec::new();
    if has_resources {
        match client.list_all_resources().await {
            Ok(listed) => resources = decode_or_warn(&listed, "resources"),
            Err(err) => tracing::warn!(%err, "list resources failed"),
        }
    }

    Ok(Listing {
        tools,
        prompts,
        resources,
    })
}

// rmcp models serialize to the MCP wire shape, which is what the wire types read.
fn to_wire<S: serde::Serialize, T: DeserializeOwned>(items: &S) -> Result<T> {
    let value = serde_json::to_value(items)?;
    Ok(serde_json::from_value(value)?)
}

/// Prompts and resources that do not decode are logged and left out.
fn decode_or_warn<S: serde::Serialize, T: DeserializeOwned>(items: &S, what: &str) -> Vec<T> {
    match to_wire(items) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), what, "decode listing failed");
            Vec::new()
        }
    }
}
