use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use aplite_onboarding::api::{AdminApi, ApliteClient, ClientQuery, DirectoryApi, OnboardingApi};
use aplite_onboarding::config::AppConfig;
use aplite_onboarding::onboarding::{
    WizardRouteState, WizardSession, spawn_status_poller, wizard_routes,
};
use aplite_onboarding::store::FileStorage;

#[derive(Parser)]
#[command(name = "aplite-onboarding", version, about = "Aplite onboarding wizard and review tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the wizard HTTP surface (default).
    Serve,
    /// Print the signed-in user's onboarding status.
    Status {
        /// Keep polling until the status is final.
        #[arg(long)]
        watch: bool,
    },
    /// List sessions waiting on review.
    Queue,
    /// Show one session under review.
    Detail { session_id: Uuid },
    /// Approve a session.
    Approve { session_id: Uuid },
    /// Reject a session.
    Reject {
        session_id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// Download an uploaded document.
    File {
        file_id: String,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Search the public client directory.
    Clients {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let client = Arc::new(ApliteClient::new(&config).context("Failed to build API client")?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, client).await?,
        Command::Status { watch } => {
            if watch {
                let (handle, mut rx) = spawn_status_poller(client, config.poll_interval);
                while let Some(state) = rx.recv().await {
                    println!("{state}");
                }
                handle.await.context("Status poller panicked")?;
            } else {
                let state = client.onboarding_status().await?;
                println!("{state}");
            }
        }
        Command::Queue => {
            let items = client.list_queue().await?;
            if items.is_empty() {
                eprintln!("Review queue is empty");
            }
            for item in items {
                println!(
                    "{}  {:<14}  {:<4}  {}",
                    item.session_id,
                    item.state.to_string(),
                    item.method,
                    item.display_name()
                );
            }
        }
        Command::Detail { session_id } => {
            let detail = client.session_detail(session_id).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        Command::Approve { session_id } => {
            let decision = client.approve(session_id).await?;
            println!(
                "{} {}",
                decision.status,
                decision.upi.as_deref().unwrap_or_default()
            );
        }
        Command::Reject { session_id, reason } => {
            let decision = client.reject(session_id, &reason).await?;
            println!("{}", decision.status);
        }
        Command::File { file_id, out } => {
            let file = client.fetch_file(&file_id).await?;
            tokio::fs::write(&out, &file.bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            eprintln!(
                "Wrote {} bytes ({}) to {}",
                file.bytes.len(),
                file.content_type,
                out.display()
            );
        }
        Command::Clients { search, limit } => {
            let mut query = ClientQuery::default().limit(limit);
            if let Some(term) = search {
                query = query.search(term);
            }
            let clients = client.list_clients(&query).await?;
            println!("{}", serde_json::to_string_pretty(&clients)?);
        }
    }

    Ok(())
}

async fn serve(config: AppConfig, client: Arc<ApliteClient>) -> anyhow::Result<()> {
    eprintln!("Aplite onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_url);
    eprintln!("   Session dir: {}", config.session_dir.display());
    eprintln!("   Wizard API: http://0.0.0.0:{}/api/wizard/state", config.bind_port);

    let storage = Arc::new(FileStorage::new(config.session_dir.clone()));
    let session = Arc::new(WizardSession::load(client, storage).await);

    // Auth-ready: reconcile once before serving.
    let route = session.refresh_session().await;
    tracing::info!(?route, "Initial onboarding route resolved");

    let app = wizard_routes(WizardRouteState { session }).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.bind_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.bind_port))?;
    tracing::info!(port = config.bind_port, "Wizard server started");
    axum::serve(listener, app).await.context("Wizard server failed")?;
    Ok(())
}
