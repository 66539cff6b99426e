use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Transport name as the backend understands it. Kept as an opaque string so
/// new backend transports need no change here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transport(String);

impl Transport {
    pub const STDIO: &'static str = "stdio";
    pub const SSE: &'static str = "sse";
    pub const STREAMABLE_HTTP: &'static str = "streamable-http";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn stdio() -> Self {
        Self::new(Self::STDIO)
    }

    pub fn sse() -> Self {
        Self::new(Self::SSE)
    }

    pub fn streamable_http() -> Self {
        Self::new(Self::STREAMABLE_HTTP)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_stdio(&self) -> bool {
        self.0.trim().eq_ignore_ascii_case(Self::STDIO)
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Transport {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One row of the environment editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub transport: Transport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl ConnectionDescriptor {
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            transport: Transport::stdio(),
            url: None,
            command: Some(command.into()),
            args: None,
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn remote(transport: Transport, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: Some(url.into()),
            command: None,
            args: None,
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar::new(key, value));
        self
    }

    /// Checks the fields the selected transport needs.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.transport.is_empty() {
            return Err(DescriptorError::MissingTransport);
        }
        if self.transport.is_stdio() {
            match self.command.as_deref().map(str::trim) {
                Some(cmd) if !cmd.is_empty() => Ok(()),
                _ => Err(DescriptorError::MissingCommand),
            }
        } else {
            let url = self.url.as_deref().map(str::trim).unwrap_or_default();
            if url.is_empty() {
                return Err(DescriptorError::MissingUrl {
                    transport: self.transport.to_string(),
                });
            }
            Url::parse(url).map_err(|err| DescriptorError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
            Ok(())
        }
    }

    /// Environment entries with a non-blank key. Keys are trimmed; later rows
    /// win over earlier rows with the same key.
    pub fn env_map(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter_map(|var| {
                let key = var.key.trim();
                (!key.is_empty()).then(|| (key.to_string(), var.value.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("transport is required")]
    MissingTransport,
    #[error("command is required for stdio transport")]
    MissingCommand,
    #[error("url is required for {transport} transport")]
    MissingUrl { transport: String },
    #[error("'{url}' is not a valid url: {reason}")]
    InvalidUrl { url: String, reason: String },
}
