use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use std::time::Instant;

pub async fn measure_latency<F, Fut, T>(f: F) -> Result<(T, u64)>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start = Instant::now();
    let res = f().await?;
    let elapsed = start.elapsed().as_millis() as u64;
    Ok((res, elapsed))
}

/// Split a form-entered argument string using shell quoting rules.
pub fn split_args(raw: &str) -> Result<Vec<String>> {
    shell_words::split(raw).map_err(|e| anyhow!("failed to parse arguments '{}': {}", raw, e))
}

/// Shorten a response body for log lines and error messages.
pub fn truncate_for_log(body: &str, limit: usize) -> String {
    if body.chars().count() <= limit {
        return body.to_string();
    }
    let mut out: String = body.chars().take(limit).collect();
    out.push('…');
    out
}

/// Append `path` under `base`, keeping any path prefix the base carries
/// (`http://host/hub` + `/api/x` gives `http://host/hub/api/x`).
pub fn join_under(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
        .with_context(|| format!("join '{}' onto '{}'", path, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_args_respects_quotes() {
        let args = split_args(r#"-y "@scope/server name" --flag"#).unwrap();
        assert_eq!(args, vec!["-y", "@scope/server name", "--flag"]);
    }

    #[test]
    fn unbalanced_quotes_are_an_error() {
        assert!(split_args(r#"--name "open"#).is_err());
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc…");
    }

    #[test]
    fn join_under_keeps_the_base_prefix() {
        let hosted = Url::parse("http://host/hub").unwrap();
        assert_eq!(
            join_under(&hosted, "/api/mcp/discover").unwrap().as_str(),
            "http://host/hub/api/mcp/discover"
        );
        let slashed = Url::parse("http://host/hub/").unwrap();
        assert_eq!(
            join_under(&slashed, "api/mcp-servers").unwrap().as_str(),
            "http://host/hub/api/mcp-servers"
        );
        let bare = Url::parse("http://host:8080").unwrap();
        assert_eq!(
            join_under(&bare, "/api/mcp/discover").unwrap().as_str(),
            "http://host:8080/api/mcp/discover"
        );
    }
}
