//! Command-line interface
//!
//! One binary covers both processes: `daemon` runs the capture side,
//! `run` the enrichment front-end, and the remaining subcommands query or
//! manipulate the store directly.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Config;
use crate::daemon;
use crate::pipeline::{Pipeline, Services, UpdateNotifier};
use crate::search::SearchEngine;
use crate::store::{ClipboardItem, ItemKind, Store};
use crate::transport;

#[derive(Parser)]
#[command(name = "clipstash")]
#[command(about = "Clipboard history manager for Linux")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the capture daemon")]
    Daemon {
        /// Stream address, e.g. unix:///tmp/clipboard-daemon.sock
        address: Option<String>,
    },

    #[command(about = "Run the enrichment front-end")]
    Run,

    #[command(about = "Show recent clipboard history")]
    Recent {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    #[command(about = "Search the clipboard history")]
    Search {
        query: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    #[command(about = "Show one item in full")]
    Show { id: i64 },

    #[command(about = "Copy an item back to the clipboard")]
    Copy { id: i64 },

    #[command(about = "Open a URL item in the browser")]
    Open { id: i64 },

    #[command(about = "Delete one item")]
    Delete { id: i64 },

    #[command(about = "Delete the entire history")]
    Clear,

    #[command(about = "Show the active configuration")]
    Config,
}

pub struct CliHandler {
    config: Config,
    store: Option<Arc<Store>>,
    services: Option<Arc<Services>>,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path)?;

        Ok(Self {
            config,
            store: None,
            services: None,
        })
    }

    /// Lazily open the store when a command needs it
    fn ensure_store(&mut self) -> Result<Arc<Store>> {
        if self.store.is_none() {
            info!("opening store at {}", self.config.db_path().display());
            let store = Arc::new(Store::open(&self.config.db_path())?);
            self.store = Some(store);
        }
        Ok(self.store.as_ref().unwrap().clone())
    }

    /// Lazily create the model service set when a command needs it
    fn ensure_services(&mut self) -> Arc<Services> {
        if self.services.is_none() {
            self.services = Some(Arc::new(Services::new(self.config.clone())));
        }
        self.services.as_ref().unwrap().clone()
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Daemon { address } => self.run_daemon(address).await,
            Commands::Run => self.run_frontend().await,
            Commands::Recent { limit } => self.show_recent(limit).await,
            Commands::Search { query, limit } => self.search(&query, limit).await,
            Commands::Show { id } => self.show_item(id).await,
            Commands::Copy { id } => self.copy_item(id).await,
            Commands::Open { id } => self.open_item(id).await,
            Commands::Delete { id } => self.delete_item(id).await,
            Commands::Clear => self.clear_history().await,
            Commands::Config => self.show_config(),
        }
    }

    async fn run_daemon(&self, address: Option<String>) -> Result<()> {
        let address = address.unwrap_or_else(|| self.config.daemon.address.clone());
        daemon::run(&address).await?;
        Ok(())
    }

    async fn run_frontend(&mut self) -> Result<()> {
        let store = self.ensure_store()?;
        let services = self.ensure_services();
        let notifier = Arc::new(UpdateNotifier::new(|| {
            // Front-end views poll the store on this signal; headless runs
            // just log it
            tracing::debug!("items updated");
        }));

        let pipeline = Pipeline::new(store, services, notifier);
        let events = transport::subscribe(&self.config.daemon.address);

        info!(
            "front-end consuming events from {}",
            self.config.daemon.address
        );

        tokio::select! {
            _ = pipeline.run(events) => {}
            _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
        }

        Ok(())
    }

    async fn show_recent(&mut self, limit: usize) -> Result<()> {
        let store = self.ensure_store()?;
        let items = store.get_recent(limit).await?;

        if items.is_empty() {
            println!("No clipboard history found");
            return Ok(());
        }

        println!("Clipboard history ({} items):", items.len());
        for (i, item) in items.iter().enumerate() {
            println!("{}. {}", i + 1, summary_line(item));
        }

        Ok(())
    }

    async fn search(&mut self, query: &str, limit: usize) -> Result<()> {
        let store = self.ensure_store()?;
        let services = self.ensure_services();
        let engine = SearchEngine::new(store, services, self.config.search.lane_factor);

        let items = engine.search(query, limit).await?;
        if items.is_empty() {
            println!("No items matching '{}'", query);
            return Ok(());
        }

        println!("{} items matching '{}':", items.len(), query);
        for (i, item) in items.iter().enumerate() {
            println!("{}. {}", i + 1, summary_line(item));
        }

        Ok(())
    }

    async fn show_item(&mut self, id: i64) -> Result<()> {
        let store = self.ensure_store()?;
        let item = store
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("no item with id {}", id))?;

        println!("Id:        {}", item.id);
        println!("Kind:      {}", item.kind.as_label());
        println!("Captured:  {}", format_timestamp(item.timestamp));
        if !item.source_app.is_empty() {
            println!("Source:    {}", item.source_app);
        }
        if !item.code_language.is_empty() {
            println!("Language:  {}", item.code_language);
        }
        if !item.embedding.is_empty() {
            println!("Embedding: {} dimensions", item.embedding.len());
        }
        if !item.ocr_text.is_empty() {
            println!("OCR text:\n{}", item.ocr_text);
        }
        match item.text() {
            Some(text) => println!("Content:\n{}", text),
            None => println!("Content:   <image, {} bytes>", item.content.len()),
        }

        Ok(())
    }

    async fn copy_item(&mut self, id: i64) -> Result<()> {
        let store = self.ensure_store()?;
        let item = store
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("no item with id {}", id))?;

        let mut command = Command::new("wl-copy");
        if item.kind == ItemKind::Image {
            command.args(["--type", "image/png"]);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .spawn()
            .context("failed to launch wl-copy")?;
        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("wl-copy stdin unavailable"))?
            .write_all(&item.content)?;

        let status = child.wait()?;
        if !status.success() {
            return Err(anyhow!("wl-copy exited with {}", status));
        }

        println!("Item {} copied to clipboard", id);
        Ok(())
    }

    async fn open_item(&mut self, id: i64) -> Result<()> {
        let store = self.ensure_store()?;
        let item = store
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("no item with id {}", id))?;

        if item.kind != ItemKind::Url {
            return Err(anyhow!("item {} is not a URL", id));
        }
        let url = item
            .text()
            .ok_or_else(|| anyhow!("item {} holds no text", id))?;

        let status = Command::new("xdg-open")
            .arg(url)
            .status()
            .context("failed to launch xdg-open")?;
        if !status.success() {
            return Err(anyhow!("xdg-open exited with {}", status));
        }

        Ok(())
    }

    async fn delete_item(&mut self, id: i64) -> Result<()> {
        let store = self.ensure_store()?;
        if store.delete(id).await? {
            println!("Item {} deleted", id);
        } else {
            println!("No item with id {}", id);
        }
        Ok(())
    }

    async fn clear_history(&mut self) -> Result<()> {
        let store = self.ensure_store()?;
        store.delete_all().await?;
        println!("Clipboard history cleared");
        Ok(())
    }

    fn show_config(&self) -> Result<()> {
        println!("Data dir:            {}", self.config.data_dir.display());
        println!("Database:            {}", self.config.db_path().display());
        println!("Daemon address:      {}", self.config.daemon.address);
        println!("Detector threshold:  {}", self.config.models.detector_threshold);
        println!("OCR languages:       {}", self.config.models.ocr_languages);
        println!("Search lane factor:  {}", self.config.search.lane_factor);
        Ok(())
    }
}

/// One-line listing entry: timestamp, kind tag, preview
fn summary_line(item: &ClipboardItem) -> String {
    let preview = match item.text() {
        Some(text) => {
            let flat = text.replace(['\n', '\r'], " ");
            if flat.chars().count() > 60 {
                format!("{}...", flat.chars().take(60).collect::<String>())
            } else {
                flat
            }
        }
        None => format!("<image, {} bytes>", item.content.len()),
    };

    let tag = if item.code_language.is_empty() {
        item.kind.as_label().to_string()
    } else {
        format!("{}/{}", item.kind.as_label(), item.code_language)
    };

    format!(
        "#{} [{}] [{}] {}",
        item.id,
        format_timestamp(item.timestamp),
        tag,
        preview
    )
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}
