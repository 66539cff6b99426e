use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use mcp_hub::{
    adapters::{
        http_backend::HttpDiscoveryBackend, http_repository::HttpServerRepository,
        memory::InMemoryServerRepository,
    },
    app::{
        discovery::DiscoveryClient,
        orchestration::{ConnectionFields, DiscoveryFeedback, ServerForm},
        repository::ServerRecord,
    },
    domain::{connection::EnvVar, reconcile::Choice, tags::{format_tags, parse_tags}, tool::Tool},
    infra::config::AppConfig,
};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Discover the tools of an MCP server and merge them into a server's tool list."
)]
struct Args {
    /// Hub backend base URL (overrides MCP_HUB_BACKEND_URL)
    #[arg(long)]
    backend_url: Option<String>,

    /// Transport of the target server: stdio, sse or streamable-http
    #[arg(long, default_value = "stdio")]
    transport: String,

    /// Endpoint of a URL-based target server
    #[arg(long)]
    url: Option<String>,

    /// Command launching a stdio target server
    #[arg(long)]
    command: Option<String>,

    /// Argument string for the command, split with shell quoting rules
    #[arg(long)]
    args: Option<String>,

    /// Working directory for the target process
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Environment variables KEY=VALUE (repeat flag)
    #[arg(long, value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// JSON file holding the current tools (a tool array or a server record)
    #[arg(long, conflicts_with = "server_id")]
    existing: Option<PathBuf>,

    /// Edit a persisted server instead of creating one
    #[arg(long)]
    server_id: Option<String>,

    /// Replace the existing tool of this name with the discovered one (repeat flag)
    #[arg(long)]
    take_discovered: Vec<String>,

    /// Replace every conflicting tool with its discovered version
    #[arg(long)]
    take_all_discovered: bool,

    /// Replace the server's tags (JSON array or comma list)
    #[arg(long)]
    tags: Option<String>,

    /// Save the result: back to --existing, or to the persistence API
    #[arg(long)]
    save: bool,
}

fn parse_env(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("env entry must be KEY=VALUE"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Reads the `--existing` file; the flag tells whether it held a bare tool
/// array.
fn read_existing(path: &Path) -> Result<(ServerRecord, bool)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    if value.is_array() {
        let tools: Vec<Tool> = serde_json::from_value(value)
            .with_context(|| format!("decode tool list in {}", path.display()))?;
        let record = ServerRecord {
            tools,
            ..ServerRecord::default()
        };
        return Ok((record, true));
    }
    let record = serde_json::from_value(value)
        .with_context(|| format!("decode server record in {}", path.display()))?;
    Ok((record, false))
}

fn write_existing(
    path: &Path,
    original_id: Option<String>,
    bare: bool,
    form: &ServerForm,
    saved: ServerRecord,
) -> Result<()> {
    let body = if bare {
        serde_json::to_string_pretty(form.tools())?
    } else {
        serde_json::to_string_pretty(&ServerRecord {
            id: original_id,
            ..saved
        })?
    };
    fs::write(path, body).with_context(|| format!("write {}", path.display()))
}

fn connection_fields(args: &Args) -> ConnectionFields {
    ConnectionFields {
        transport: args.transport.clone(),
        url: args.url.clone().unwrap_or_default(),
        command: args.command.clone().unwrap_or_default(),
        args: args.args.clone().unwrap_or_default(),
        cwd: args
            .cwd
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
        env: args
            .env
            .iter()
            .map(|(k, v)| EnvVar::new(k.clone(), v.clone()))
            .collect(),
    }
}

fn resolve_review(form: &mut ServerForm, args: &Args) -> Result<()> {
    if args.take_all_discovered {
        form.choose_all(Choice::Discovered)?;
    }
    for name in &args.take_discovered {
        form.set_choice(name, Choice::Discovered)
            .with_context(|| format!("--take-discovered {name}"))?;
    }
    if let Some(review) = form.review() {
        for conflict in &review.conflicts {
            let choice = review.choice(conflict.name()).unwrap_or_default();
            let note = if conflict.is_identical() { " (identical)" } else { "" };
            eprintln!(
                "conflict {}{note}: existing [{}] vs discovered [{}], keeping {}",
                conflict.name(),
                conflict.existing.parameter_summary(),
                conflict.discovered.parameter_summary(),
                choice.as_str()
            );
        }
    }
    let total = form.apply_review()?;
    eprintln!("review applied; {total} tools on the server");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load().context("load configuration")?;
    if let Some(url) = &args.backend_url {
        config.backend_url = Some(url.clone());
    }

    let local = InMemoryServerRepository::new();
    let mut original_id = None;
    let mut bare_tool_list = false;
    let (mut form, remote) = match (&args.existing, &args.server_id) {
        (Some(path), _) => {
            let (record, bare) = read_existing(path)?;
            original_id = record.id.clone();
            bare_tool_list = bare;
            let server_id = local.insert(record);
            (ServerForm::edit(&server_id, &local).await?, None)
        }
        (None, Some(server_id)) => {
            let remote = HttpServerRepository::from_config(&config)?;
            let form = ServerForm::edit(server_id, &remote)
                .await
                .with_context(|| format!("load server {server_id}"))?;
            (form, Some(remote))
        }
        (None, None) => (
            ServerForm::create(),
            Some(HttpServerRepository::from_config(&config)?),
        ),
    };
    form.fields = connection_fields(&args);
    if let Some(raw) = &args.tags {
        let record = form.record_mut();
        record.set_tags(parse_tags(raw).into_vec());
        eprintln!("tags: {}", format_tags(&record.tags()));
    }

    let client = DiscoveryClient::new(HttpDiscoveryBackend::from_config(&config)?);
    match form.discover(&client).await {
        DiscoveryFeedback::ToolsAdded { added } => eprintln!("added {added} discovered tools"),
        DiscoveryFeedback::ReviewRequired {
            conflicts,
            new_tools,
        } => {
            eprintln!("{conflicts} conflicting tools, {new_tools} new tools");
            resolve_review(&mut form, &args)?;
        }
        DiscoveryFeedback::NothingFound { cause } => {
            eprintln!("no tools discovered ({}): {cause}", cause.kind());
        }
        DiscoveryFeedback::ReviewPending => {
            return Err(anyhow!("a tool review is already open"));
        }
        DiscoveryFeedback::Rejected { error } => {
            return Err(error).context("reconcile discovered tools");
        }
    }

    if args.save {
        match (&args.existing, &remote) {
            (Some(path), _) => {
                let saved = form.submit(&local).await?;
                write_existing(path, original_id, bare_tool_list, &form, saved)?;
            }
            (None, Some(remote)) => {
                let saved = form.submit(remote).await?;
                eprintln!("saved server {}", saved.id.unwrap_or_default());
            }
            (None, None) => {}
        }
    }

    println!("{}", serde_json::to_string_pretty(form.tools())?);
    Ok(())
}
