//! FotoGate -- object storage access gateway for photo galleries.
//!
//! The process holds no durable state of its own: caches are advisory and
//! rebuilt from the document and blob stores, so restarts are cheap.
//! SIGTERM/SIGINT stop accepting connections and drain in-flight requests.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use fotogate::blobstore::backend::BlobStore;
use fotogate::docstore::store::DocumentStore;
use fotogate::identity::IdentityVerifier;

/// Command-line arguments for the FotoGate server.
#[derive(Parser, Debug)]
#[command(
    name = "fotogate",
    version,
    about = "Object storage access gateway for photo galleries"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "fotogate.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = fotogate::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register descriptions.
    fotogate::metrics::init_metrics();
    fotogate::metrics::describe_metrics();

    // One token source shared by every GCP-backed component.
    let gcp_tokens = Arc::new(fotogate::gcp::GcpTokenSource::new(
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?,
    ));

    let identity: Arc<dyn IdentityVerifier> = match config.identity.mode.as_str() {
        "static" => {
            info!("Static identity verifier with {} tokens", config.identity.static_tokens.len());
            Arc::new(fotogate::identity::StaticIdentityVerifier::new(
                config.identity.static_tokens.clone(),
            ))
        }
        _ => {
            info!("Firebase identity verifier initialized");
            Arc::new(fotogate::identity::FirebaseIdentityVerifier::new(
                &config.identity,
            )?)
        }
    };

    let docs: Arc<dyn DocumentStore> = match config.docstore.engine.as_str() {
        "memory" => {
            info!("In-memory document store initialized");
            Arc::new(fotogate::docstore::memory::MemoryDocumentStore::new())
        }
        _ => {
            info!(
                "Firestore document store initialized: project={}",
                config.docstore.firestore.project_id
            );
            Arc::new(fotogate::docstore::firestore::FirestoreDocumentStore::new(
                &config.docstore.firestore,
                gcp_tokens.clone(),
            )?)
        }
    };

    let blobs: Arc<dyn BlobStore> = match config.blobstore.backend.as_str() {
        "memory" => {
            info!("In-memory blob store initialized");
            Arc::new(fotogate::blobstore::memory::MemoryBlobStore::new())
        }
        _ => {
            info!(
                "GCS blob store initialized: bucket={} prefix='{}'",
                config.blobstore.gcs.bucket, config.blobstore.gcs.prefix
            );
            Arc::new(fotogate::blobstore::gcs::GcsBlobStore::new(
                &config.blobstore.gcs,
                gcp_tokens,
            )?)
        }
    };

    let state = Arc::new(fotogate::AppState::new(config, docs, blobs, identity));
    let app = fotogate::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("FotoGate listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("FotoGate shut down");

    Ok(())
}

/// Initialize the tracing subscriber from the logging config. `RUST_LOG`
/// overrides the configured level.
fn init_tracing(logging: &fotogate::config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.clone()));
    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
