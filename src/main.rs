use anyhow::{Context, Result};
use arrsync::config::{Configuration, SonarrInstance};
use arrsync::http::HttpClient;
use arrsync::models::{Guid, Item};
use arrsync::{AppEndpoint, SonarrClient};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only act on the Sonarr instance with this name
    #[arg(short, long)]
    instance: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check connectivity and API permissions
    Test,
    /// Initialize and make sure the webhook is registered
    Init,
    /// List every series, including import-list exclusions unless bypassed
    Catalog {
        #[arg(long)]
        bypass_exclusions: bool,
    },
    /// List tags
    Tags,
    CreateTag { label: String },
    DeleteTag { id: i32 },
    /// Replace the tags on a series
    Retag {
        series_id: i32,
        tag_ids: Vec<i32>,
    },
    /// Delete a series by its identifiers (e.g. `sonarr:12` or `tvdb:81189`)
    Delete {
        #[arg(required = true)]
        guids: Vec<String>,
        #[arg(long)]
        delete_files: bool,
    },
    /// Register the Plex Media Server notification from the `plex` section
    ConfigurePlex,
    RemovePlex,
    RemoveWebhook,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .init();

    let config = Configuration::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    info!("Configuration loaded from: {}", cli.config);

    let instances: Vec<&SonarrInstance> = match cli.instance.as_deref() {
        Some(name) => vec![config
            .instance(name)
            .with_context(|| format!("No Sonarr instance named {}", name))?],
        None => config.sonarr.iter().collect(),
    };
    if instances.is_empty() {
        warn!("No Sonarr instances configured");
        return Ok(());
    }

    let http = Arc::new(HttpClient::new()?);
    let mut failed = false;

    for instance in instances {
        if let Err(e) = run(&cli.command, &config, instance, Arc::clone(&http)).await {
            error!("{}: {:#}", instance.name, e);
            failed = true;
        }
    }

    if failed {
        anyhow::bail!("One or more instances failed");
    }
    Ok(())
}

async fn run(
    command: &Command,
    config: &Configuration,
    instance: &SonarrInstance,
    http: Arc<HttpClient>,
) -> Result<()> {
    // This process is its own listener, so the callback target is reachable as soon as
    // the command runs.
    let app = AppEndpoint::listening(config.app.base_url.clone(), config.app.port);
    let client = Arc::new(SonarrClient::new(http, app));

    if let Command::Test = command {
        let result = client
            .test_connection(&instance.base_url, &instance.api_key)
            .await;
        println!("{}: {}", instance.name, result.message);
        if !result.success {
            anyhow::bail!("connection test failed");
        }
        return Ok(());
    }

    if let Command::Init = command {
        return Ok(client.initialize(instance).await?);
    }
    client.configure(instance).await?;

    match command {
        Command::Test | Command::Init => {}
        Command::Catalog { bypass_exclusions } => {
            let bypass = *bypass_exclusions || instance.bypass_ignored.unwrap_or(false);
            let items = client.fetch_series(bypass).await?;
            for item in &items {
                let guids: Vec<String> = item.guids.iter().map(Guid::to_string).collect();
                println!("{}\t{:?}\t{}", item.title, item.status, guids.join(","));
            }
            info!("{} items in {}", items.len(), instance.name);
        }
        Command::Tags => {
            for tag in client.get_tags().await? {
                println!("{}\t{}", tag.id, tag.label);
            }
        }
        Command::CreateTag { label } => {
            let tag = client.create_tag(label).await?;
            println!("{}\t{}", tag.id, tag.label);
        }
        Command::DeleteTag { id } => client.delete_tag(*id).await?,
        Command::Retag { series_id, tag_ids } => {
            client.update_series_tags(*series_id, tag_ids).await?
        }
        Command::Delete { guids, delete_files } => {
            let item = Item::new(
                guids.join(" "),
                guids.iter().map(|g| Guid::parse(g)),
            );
            client.delete_series(&item, *delete_files).await?;
        }
        Command::ConfigurePlex => {
            let plex = config
                .plex
                .as_ref()
                .context("No plex section in configuration")?;
            client.configure_plex_notification(plex).await?;
        }
        Command::RemovePlex => client.remove_plex_notification().await?,
        Command::RemoveWebhook => client.remove_webhook().await?,
    }

    Ok(())
}
