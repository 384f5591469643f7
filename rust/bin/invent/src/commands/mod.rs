pub mod context;
pub mod field;
pub mod scan;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use install::api::OPS_PATH;
use invent_remote::{HttpRemote, NoAuth, RemoteService, StaticToken, TokenSource};
use serde::Serialize;

use crate::config::ClientConfig;

/// Server endpoint and bearer token for one invocation.
#[derive(Debug, PartialEq)]
pub(crate) struct Target {
    pub endpoint: String,
    pub token: Option<String>,
}

/// Pick the server of `--server` or of the current context.
///
/// The context token is only sent to the context's own server.
pub(crate) fn target(config: &ClientConfig, server_override: Option<&str>) -> Result<Target> {
    let current = config.current();

    let (server, token_ctx) = match server_override {
        Some(s) => {
            let same = current.filter(|c| c.server.trim_end_matches('/') == s.trim_end_matches('/'));
            (s.to_string(), same)
        }
        None => match current.filter(|c| !c.server.is_empty()) {
            Some(ctx) => (ctx.server.clone(), Some(ctx)),
            None => anyhow::bail!(
                "No server configured. Run `invent context set <name> --server <url>` or pass --server."
            ),
        },
    };

    let token = token_ctx.filter(|c| !c.token.is_empty()).map(|c| c.token.clone());
    Ok(Target {
        endpoint: format!("{}{}", server.trim_end_matches('/'), OPS_PATH),
        token,
    })
}

/// Connect to the server of `--server` or of the current context.
pub fn connect(config_path: &Path, server_override: Option<&str>) -> Result<Arc<dyn RemoteService>> {
    let config = ClientConfig::load(config_path)?;
    let target = target(&config, server_override)?;

    let token_source: Arc<dyn TokenSource> = match target.token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(NoAuth),
    };

    let remote = HttpRemote::new(target.endpoint, token_source);
    tracing::debug!(endpoint = remote.endpoint(), "connecting");
    Ok(Arc::new(remote))
}

/// Output format selected with `-o`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Table,
    Json,
}

impl Output {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Output::Table),
            "json" => Ok(Output::Json),
            other => anyhow::bail!("unknown output format \"{}\" (use table or json)", other),
        }
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Context;

    fn config() -> ClientConfig {
        ClientConfig {
            current_context: "north".into(),
            contexts: vec![Context {
                name: "north".into(),
                server: "http://north.local:8080/".into(),
                token: "north-secret".into(),
            }],
        }
    }

    #[test]
    fn context_server_carries_token() {
        let t = target(&config(), None).unwrap();
        assert_eq!(t.endpoint, format!("http://north.local:8080{}", OPS_PATH));
        assert_eq!(t.token.as_deref(), Some("north-secret"));
    }

    #[test]
    fn server_override_drops_context_token() {
        let t = target(&config(), Some("http://elsewhere:9000")).unwrap();
        assert_eq!(t.endpoint, format!("http://elsewhere:9000{}", OPS_PATH));
        assert_eq!(t.token, None);
    }

    #[test]
    fn override_matching_context_server_keeps_token() {
        let t = target(&config(), Some("http://north.local:8080")).unwrap();
        assert_eq!(t.token.as_deref(), Some("north-secret"));
    }

    #[test]
    fn no_server_configured() {
        assert!(target(&ClientConfig::default(), None).is_err());
        let t = target(&ClientConfig::default(), Some("http://x")).unwrap();
        assert_eq!(t.token, None);
    }

    #[test]
    fn connect_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config().save(&path).unwrap();
        assert!(connect(&path, Some("http://elsewhere:9000")).is_ok());
        assert!(connect(&dir.path().join("missing.toml"), None).is_err());
    }
}
