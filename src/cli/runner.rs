//! CLI runner - executes commands

use crate::auth::CredentialManager;
use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::sink::{JsonLinesSink, RecordSink};
use crate::state::StateManager;
use crate::streams::Catalog;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel a running sync through `token`
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Discover => self.discover(),
            Commands::Streams => self.streams(),
            Commands::Sync { streams } => self.sync(streams.as_deref()).await,
        }
    }

    /// Load and validate the configuration file
    fn load_config(&self) -> Result<TapConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use --config)"))?;
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
        TapConfig::from_json_str(&content)
    }

    fn load_state(&self) -> Result<StateManager> {
        match &self.cli.state {
            Some(path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }

    /// Print the catalog
    ///
    /// The config is optional here and only consulted for flattening.
    fn discover(&self) -> Result<()> {
        let depth = match self.cli.config {
            Some(_) => self.load_config()?.flattening_depth(),
            None => None,
        };
        let catalog = serde_json::json!({
            "streams": Catalog::hubspot().list_streams(depth),
        });
        print_line(&serde_json::to_string_pretty(&catalog)?)
    }

    fn streams(&self) -> Result<()> {
        for name in Catalog::hubspot().names() {
            print_line(name)?;
        }
        Ok(())
    }

    async fn sync(&self, streams: Option<&str>) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(list) = streams {
            config.streams = parse_stream_list(list);
        }
        let config = Arc::new(config);

        let credentials = Arc::new(CredentialManager::from_config(
            &config,
            reqwest::Client::new(),
        )?);
        let client = HttpClient::with_credentials(config.http_client_config(), credentials)?;
        let sink: Arc<dyn RecordSink> = Arc::new(JsonLinesSink::new(std::io::stdout()));

        let engine = SyncEngine::new(Arc::clone(&config), client, self.load_state()?, sink)?
            .with_cancellation(self.cancel.clone());
        let stats = engine.run().await?;

        info!(
            records = stats.records_emitted,
            skipped = stats.records_skipped,
            streams = stats.streams_completed,
            checkpoints = stats.checkpoints,
            "Done"
        );
        Ok(())
    }
}

/// Split `a, b,,c` into stream names
pub(crate) fn parse_stream_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn print_line(line: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    Ok(())
}
