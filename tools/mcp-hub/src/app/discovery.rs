//! Client side of capability discovery.
//!
//! One request per call, no retries. Every failure is reported with its own
//! [`DiscoveryError`] variant; [`DiscoveryClient::discover_tools`] collapses
//! them into an empty list for callers that only render results.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::capability::DiscoveredCapabilities;
use crate::domain::connection::{ConnectionDescriptor, DescriptorError};
use crate::domain::schema::{prompt_from_raw, resource_from_raw, tool_from_raw};
use crate::domain::tool::Tool;
use crate::shared::types::{DiscoveryRequest, DiscoveryResponse, RawTool};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("invalid connection descriptor: {0}")]
    InvalidDescriptor(#[from] DescriptorError),
    #[error("discovery backend unreachable: {0}")]
    TransportFailure(String),
    #[error("malformed discovery response: {0}")]
    MalformedResponse(String),
    #[error("no tools found{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    NoToolsFound { message: Option<String> },
}

impl DiscoveryError {
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::InvalidDescriptor(_) => "invalid_descriptor",
            DiscoveryError::TransportFailure(_) => "transport_failure",
            DiscoveryError::MalformedResponse(_) => "malformed_response",
            DiscoveryError::NoToolsFound { .. } => "no_tools_found",
        }
    }

    /// True when the backend could not be reached or answered garbage,
    /// as opposed to a server that legitimately exposes nothing.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            DiscoveryError::TransportFailure(_) | DiscoveryError::MalformedResponse(_)
        )
    }
}

/// The component that actually talks to MCP servers on our behalf.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    async fn discover(&self, request: &DiscoveryRequest)
    -> Result<DiscoveryResponse, DiscoveryError>;
}

#[async_trait]
impl<B: DiscoveryBackend + ?Sized> DiscoveryBackend for std::sync::Arc<B> {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, DiscoveryError> {
        (**self).discover(request).await
    }
}

/// Build the wire request for a descriptor, refusing incomplete ones.
pub fn build_request(descriptor: &ConnectionDescriptor) -> Result<DiscoveryRequest, DiscoveryError> {
    descriptor.validate()?;
    let url = descriptor
        .url
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let mut request = DiscoveryRequest {
        url,
        protocol: descriptor.transport.as_str().to_string(),
        ..DiscoveryRequest::default()
    };
    if descriptor.transport.is_stdio() {
        request.command = descriptor.command.as_deref().map(|c| c.trim().to_string());
        request.args = Some(descriptor.args.clone().unwrap_or_default());
        request.cwd = Some(descriptor.cwd.clone().unwrap_or_default());
        let env = descriptor.env_map();
        if !env.is_empty() {
            request.env = Some(env);
        }
    }
    Ok(request)
}

pub struct DiscoveryClient<B> {
    backend: B,
}

impl<B: DiscoveryBackend> DiscoveryClient<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tools, prompts and resources. An empty tool list is fine here as long
    /// as the server reported something.
    pub async fn try_discover(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<DiscoveredCapabilities, DiscoveryError> {
        let request = build_request(descriptor)?;
        tracing::debug!(protocol = %request.protocol, "sending discovery request");
        let response = self.backend.discover(&request).await?;
        if !response.success {
            return Err(DiscoveryError::NoToolsFound {
                message: response.message,
            });
        }
        let capabilities = normalize(response);
        if capabilities.is_empty() {
            return Err(DiscoveryError::NoToolsFound { message: None });
        }
        Ok(capabilities)
    }

    pub async fn try_discover_tools(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Vec<Tool>, DiscoveryError> {
        let capabilities = self.try_discover(descriptor).await?;
        if capabilities.tools.is_empty() {
            return Err(DiscoveryError::NoToolsFound { message: None });
        }
        Ok(capabilities.tools)
    }

    /// Never fails: every error is logged and yields an empty list.
    pub async fn discover_tools(&self, descriptor: &ConnectionDescriptor) -> Vec<Tool> {
        match self.try_discover_tools(descriptor).await {
            Ok(tools) => {
                tracing::info!(
                    protocol = %descriptor.transport,
                    count = tools.len(),
                    "discovered tools"
                );
                tools
            }
            Err(err) => {
                log_discovery_error(descriptor, &err);
                Vec::new()
            }
        }
    }
}

pub fn log_discovery_error(descriptor: &ConnectionDescriptor, err: &DiscoveryError) {
    if err.is_transport_failure() {
        tracing::error!(protocol = %descriptor.transport, kind = err.kind(), %err, "tool discovery failed");
    } else {
        tracing::info!(protocol = %descriptor.transport, kind = err.kind(), %err, "tool discovery returned nothing");
    }
}

fn normalize(response: DiscoveryResponse) -> DiscoveredCapabilities {
    DiscoveredCapabilities {
        tools: normalize_tools(response.tools.unwrap_or_default()),
        prompts: response
            .prompts
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.name.is_empty())
            .map(prompt_from_raw)
            .collect(),
        resources: response
            .resources
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.uri.is_empty())
            .map(resource_from_raw)
            .collect(),
    }
}

// Reconciliation needs unique, non-empty names; enforce that here.
fn normalize_tools(raw: Vec<RawTool>) -> Vec<Tool> {
    let mut seen = HashSet::new();
    let mut tools = Vec::with_capacity(raw.len());
    for record in raw {
        if record.name.trim().is_empty() {
            tracing::warn!("skipping discovered tool without a name");
            continue;
        }
        if !seen.insert(record.name.clone()) {
            tracing::warn!(tool = %record.name, "skipping duplicate discovered tool");
            continue;
        }
        tools.push(tool_from_raw(record));
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::Transport;

    #[test]
    fn stdio_request_carries_process_fields() {
        let desc = ConnectionDescriptor::stdio(" npx ")
            .with_args("-y @acme/server")
            .with_env("API_KEY", "k")
            .with_env(" ", "dropped");
        let req = build_request(&desc).unwrap();
        assert_eq!(req.url, "");
        assert_eq!(req.protocol, "stdio");
        assert_eq!(req.command.as_deref(), Some("npx"));
        assert_eq!(req.args.as_deref(), Some("-y @acme/server"));
        assert_eq!(req.cwd.as_deref(), Some(""));
        let env = req.env.unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("API_KEY").map(String::as_str), Some("k"));
    }

    #[test]
    fn stdio_request_without_env_rows_omits_env() {
        let req = build_request(&ConnectionDescriptor::stdio("server").with_env("", "x")).unwrap();
        assert!(req.env.is_none());
    }

    #[test]
    fn url_request_forwards_transport_verbatim() {
        let desc = ConnectionDescriptor::remote(Transport::new("websocket"), "ws://host/mcp")
            .with_env("IGNORED", "1");
        let req = build_request(&desc).unwrap();
        assert_eq!(req.protocol, "websocket");
        assert_eq!(req.url, "ws://host/mcp");
        assert!(req.command.is_none() && req.args.is_none() && req.env.is_none());
    }

    #[test]
    fn invalid_descriptor_is_reported() {
        let err = build_request(&ConnectionDescriptor::stdio("")).unwrap_err();
        assert_eq!(err.kind(), "invalid_descriptor");
        assert!(!err.is_transport_failure());
    }

    #[test]
    fn no_tools_message_is_included() {
        let err = DiscoveryError::NoToolsFound {
            message: Some("server exposes nothing".into()),
        };
        assert_eq!(err.to_string(), "no tools found: server exposes nothing");
        let err = DiscoveryError::NoToolsFound { message: None };
        assert_eq!(err.to_string(), "no tools found");
    }
}
