use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use rmcp::{
    ErrorData, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, InitializeRequestParam, InitializeResult,
        JsonObject, ListPromptsResult, ListResourcesResult, ListToolsResult,
        PaginatedRequestParam,
    },
    schemars::JsonSchema,
    service::{RequestContext, RoleServer},
    transport::{
        stdio,
        streamable_http_server::{
            session::local::LocalSessionManager, tower::StreamableHttpService,
        },
    },
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_PAGE_SIZE: usize = 2;

/// Small MCP server with a fixed catalog: two typed tools, one tool whose
/// schema omits types, a prompt and a resource. Tools are served in pages of
/// `MOCK_PAGE_SIZE` (default 2).
#[derive(Clone, Default)]
struct MockServer;

#[derive(Debug, Clone, Default, serde::Deserialize, JsonSchema)]
struct EchoArgs {
    /// Text to send back.
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize, JsonSchema)]
struct AddArgs {
    /// Numbers to sum.
    values: Vec<f64>,
}

fn schema_for<T: JsonSchema + 'static>() -> Arc<JsonObject> {
    use rmcp::handler::server::wrapper::Parameters;
    rmcp::handler::server::common::cached_schema_for_type::<Parameters<T>>()
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

fn page_size() -> usize {
    env::var("MOCK_PAGE_SIZE")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Cursors are the offset of the next item.
fn paginate<T>(
    items: Vec<T>,
    request: Option<PaginatedRequestParam>,
) -> Result<(Vec<T>, Option<String>), ErrorData> {
    let start = match request.and_then(|r| r.cursor) {
        Some(cursor) => cursor
            .parse::<usize>()
            .ok()
            .filter(|offset| *offset <= items.len())
            .ok_or_else(|| ErrorData::invalid_params(format!("bad cursor '{cursor}'"), None))?,
        None => 0,
    };
    let end = (start + page_size()).min(items.len());
    let next_cursor = (end < items.len()).then(|| end.to_string());
    let page = items.into_iter().skip(start).take(end - start).collect();
    Ok((page, next_cursor))
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ErrorData> {
    serde_json::from_value(value).map_err(|err| ErrorData::internal_error(err.to_string(), None))
}

impl MockServer {
    fn catalog(&self) -> Vec<rmcp::model::Tool> {
        vec![
            rmcp::model::Tool::new(
                "echo",
                "Echo back the supplied text payload.",
                schema_for::<EchoArgs>(),
            ),
            rmcp::model::Tool::new(
                "add",
                "Sum a list of numbers and return the total.",
                schema_for::<AddArgs>(),
            ),
            rmcp::model::Tool::new(
                "lookup",
                "Look up a record by key.",
                Arc::new(object(json!({
                    "type": "object",
                    "properties": {
                        "key": {"description": "Record key"},
                        "verbose": {"type": "boolean"}
                    },
                    "required": ["key"]
                }))),
            ),
        ]
    }

    fn invoke(&self, request: CallToolRequestParam) -> CallToolResult {
        let arguments = Value::Object(request.arguments.unwrap_or_default());
        match request.name.as_ref() {
            "echo" => {
                let args = serde_json::from_value::<EchoArgs>(arguments).unwrap_or_default();
                CallToolResult::structured(json!({ "echoed": args.text }))
            }
            "add" => {
                let args = serde_json::from_value::<AddArgs>(arguments).unwrap_or_default();
                let sum: f64 = args.values.iter().sum();
                CallToolResult::structured(json!({ "sum": sum, "count": args.values.len() }))
            }
            "lookup" => CallToolResult::structured(json!({ "found": false, "query": arguments })),
            other => CallToolResult::structured_error(json!({
                "error": format!("unknown tool: {other}"),
            })),
        }
    }
}

impl rmcp::ServerHandler for MockServer {
    fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<InitializeResult, ErrorData>> + Send + '_ {
        async move {
            let capabilities = rmcp::model::ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build();
            let info = rmcp::model::ServerInfo {
                capabilities,
                server_info: rmcp::model::Implementation {
                    name: "mock-mcp-server".into(),
                    title: Some("Mock MCP Server".into()),
                    version: env!("CARGO_PKG_VERSION").into(),
                    icons: None,
                    website_url: None,
                },
                protocol_version: request.protocol_version,
                instructions: None,
            };
            tracing::info!("initialize complete");
            Ok(info)
        }
    }

    fn list_tools(
        &self,
        request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        let page = paginate(self.catalog(), request);
        async move {
            let (tools, next_cursor) = page?;
            Ok(ListToolsResult { tools, next_cursor })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        let response = self.invoke(request);
        async move { Ok(response) }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, ErrorData>> + Send + '_ {
        async move {
            decode(json!({
                "prompts": [{
                    "name": "summarize",
                    "description": "Summarize a document.",
                    "arguments": [
                        {"name": "document", "description": "Text to summarize", "required": true},
                        {"name": "style"}
                    ]
                }]
            }))
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, ErrorData>> + Send + '_ {
        async move {
            decode(json!({
                "resources": [{
                    "uri": "mock://readme",
                    "name": "readme",
                    "description": "Mock server notes.",
                    "mimeType": "text/plain"
                }]
            }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let http_ct = CancellationToken::new();
    let http_task = match env::var("MOCK_HTTP_ADDR") {
        Ok(raw) => {
            let http_addr: SocketAddr = raw
                .parse()
                .with_context(|| format!("parse MOCK_HTTP_ADDR '{raw}'"))?;
            let http_service: StreamableHttpService<MockServer, LocalSessionManager> =
                StreamableHttpService::new(
                    || Ok(MockServer),
                    Arc::new(LocalSessionManager::default()),
                    Default::default(),
                );
            let http_router = Router::new().nest_service("/mcp", http_service);
            let http_listener = TcpListener::bind(http_addr)
                .await
                .with_context(|| format!("bind {http_addr}"))?;
            let ct = http_ct.clone();
            Some(tokio::spawn(async move {
                tracing::info!(%http_addr, "http server listening");
                let _ = axum::serve(http_listener, http_router)
                    .with_graceful_shutdown(async move { ct.cancelled().await })
                    .await;
            }))
        }
        Err(_) => None,
    };

    let enable_stdio = env::var("MOCK_ENABLE_STDIO")
        .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false"))
        .unwrap_or(true);

    if enable_stdio {
        let server = MockServer.serve(stdio()).await?;
        tracing::info!("stdio server ready");
        server.waiting().await?;
    } else {
        tracing::info!("stdio disabled; waiting for shutdown signal");
        let _ = signal::ctrl_c().await;
    }

    http_ct.cancel();
    if let Some(task) = http_task {
        let _ = task.await;
    }
    Ok(())
}
