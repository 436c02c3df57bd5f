//! `shipwright` binary: serve the HTTP API or preview the fallback bundle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use shipwright_pipeline::{materialize, Orchestrator};
use shipwright_server::{router, AppState};
use shipwright_types::config::{
    DEFAULT_GITHUB_API_URL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};
use shipwright_types::{Attachment, Config, FileBundle, Secret};

#[derive(Parser)]
#[command(
    name = "shipwright",
    version,
    about = "Generate static web apps from a brief and publish them to GitHub Pages"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (the default)
    Serve(ServeArgs),

    /// Write the offline fallback bundle for a brief to a directory
    PreviewFallback {
        /// Application brief
        #[arg(long)]
        brief: String,

        /// Attachment as NAME=URL (repeatable)
        #[arg(long = "attachment", value_parser = parse_attachment)]
        attachments: Vec<Attachment>,

        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[command(flatten)]
    settings: Settings,
}

/// Credentials and endpoints, normally supplied through the environment.
#[derive(Args)]
struct Settings {
    #[arg(long, env = "STUDENT_SECRET", hide_env_values = true)]
    student_secret: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, env = "GITHUB_USERNAME")]
    github_username: Option<String>,

    /// Create repositories under this organization instead of the user
    #[arg(long, env = "GITHUB_ORG")]
    github_org: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,

    /// Without a key every request uses the fallback bundle
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    openai_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Parent directory for per-request scratch workspaces
    #[arg(long, env = "SHIPWRIGHT_WORKSPACE_DIR")]
    workspace_dir: Option<PathBuf>,

    /// Seconds to wait after requesting Pages activation
    #[arg(long, env = "PAGES_SETTLE_SECS", default_value_t = 5)]
    pages_settle_secs: u64,

    /// Seconds before a generative backend or GitHub API request is abandoned
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 120)]
    http_timeout_secs: u64,
}

impl Settings {
    fn into_config(self) -> Config {
        let secret = |v: Option<String>| v.filter(|s| !s.is_empty()).map(Secret::new);
        let text = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Config {
            shared_secret: secret(self.student_secret),
            github_token: secret(self.github_token),
            github_username: text(self.github_username),
            github_org: text(self.github_org),
            github_api_url: self.github_api_url,
            openai_api_key: secret(self.openai_api_key),
            openai_model: self.openai_model,
            openai_base_url: self.openai_base_url,
            workspace_dir: self.workspace_dir,
            pages_settle_delay: Duration::from_secs(self.pages_settle_secs),
            http_timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
        }
    }
}

fn parse_attachment(raw: &str) -> Result<Attachment, String> {
    let (name, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{raw}'"))?;
    if name.is_empty() {
        return Err("attachment name is empty".into());
    }
    Ok(Attachment {
        name: name.to_string(),
        url: url.to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => Commands::Serve(ServeArgs::from_env()?),
    };

    match command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::PreviewFallback {
            brief,
            attachments,
            out,
        } => cmd_preview_fallback(&brief, &attachments, out).await,
    }
}

impl ServeArgs {
    /// Serve options when no subcommand was given: defaults plus environment.
    fn from_env() -> anyhow::Result<Self> {
        #[derive(Parser)]
        struct Bare {
            #[command(flatten)]
            args: ServeArgs,
        }
        Ok(Bare::try_parse_from(["shipwright"])?.args)
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = Arc::new(args.settings.into_config());
    if config.shared_secret.is_none() {
        tracing::warn!("STUDENT_SECRET is not set; every pipeline request will be refused");
    }
    if config.github_credentials().is_err() {
        tracing::warn!("GitHub credentials are not set; publishing will fail");
    }
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; apps will use the fallback template");
    }

    let orchestrator = Arc::new(Orchestrator::from_config(&config));
    let app = router(AppState::new(config, orchestrator));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "shipwright listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn cmd_preview_fallback(
    brief: &str,
    attachments: &[Attachment],
    out: PathBuf,
) -> anyhow::Result<()> {
    let bundle = FileBundle::fallback(brief, attachments);
    tokio::fs::create_dir_all(&out).await?;
    materialize(&out, &bundle).await?;
    for path in bundle.paths() {
        println!("{}", out.join(path).display());
    }
    Ok(())
}
