use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mnemo::{api, decay, embed, store, AppState, EmbedCache, SharedStore};

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Privacy-tiered memory engine with humanized decay")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3923", env = "MNEMO_PORT")]
    port: u16,

    /// SQLite database path
    #[arg(short, long, default_value = "mnemo.db", env = "MNEMO_DB")]
    db: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mstore = store::MemoryStore::open(&args.db).expect("failed to open database");
    let shared: SharedStore = Arc::new(mstore);

    let embed_cfg = embed::EmbedConfig::from_env();
    let embed_status = match &embed_cfg {
        Some(cfg) => format!("model={}", cfg.model),
        None => "disabled (keyword-only)".into(),
    };

    let api_key = std::env::var("MNEMO_API_KEY").ok();
    let auth_status = if api_key.is_some() { "enabled" } else { "disabled" };

    let state = AppState {
        store: shared.clone(),
        embed: embed_cfg,
        api_key,
        embed_cache: EmbedCache::new(128),
        started_at: std::time::Instant::now(),
    };
    let app = api::router(state.clone());

    // backfill embeddings for memories written while embeddings were off
    if let Some(cfg) = state.embed.clone() {
        let bf_store = shared.clone();
        tokio::spawn(async move {
            loop {
                let store = bf_store.clone();
                let Ok(missing) =
                    tokio::task::spawn_blocking(move || store.list_missing_embeddings(64)).await
                else {
                    break;
                };
                if missing.is_empty() {
                    break;
                }
                let texts: Vec<String> = missing.iter().map(|(_, c)| c.clone()).collect();
                match embed::get_embeddings(&cfg, &texts).await {
                    Ok(embs) => {
                        let store = bf_store.clone();
                        let pairs: Vec<(String, Vec<f32>)> = missing
                            .into_iter()
                            .map(|(id, _)| id)
                            .zip(embs)
                            .collect();
                        let n = pairs.len();
                        let _ = tokio::task::spawn_blocking(move || {
                            for (id, emb) in &pairs {
                                if let Err(e) = store.set_embedding(id, emb) {
                                    tracing::warn!(id = %id, error = %e, "backfill failed");
                                }
                            }
                        })
                        .await;
                        tracing::info!(count = n, "backfilled embeddings");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "embedding backfill aborted");
                        break;
                    }
                }
            }
        });
    }

    // background sweep — expires focus sessions and runs humanized decay
    // every MNEMO_SWEEP_MINS (default 15, 0 disables)
    let sweep_mins: u64 = std::env::var("MNEMO_SWEEP_MINS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(15);
    if sweep_mins > 0 {
        let bg_store = shared.clone();
        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs(sweep_mins.saturating_mul(60));
            // wait a bit before first run so startup isn't slowed
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            loop {
                let store = bg_store.clone();
                let _ = tokio::task::spawn_blocking(move || decay::sweep(&store)).await;
                tokio::time::sleep(interval).await;
            }
        });
        info!(every_mins = sweep_mins, "background sweep enabled");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        db = %args.db,
        embed = %embed_status,
        auth = auth_status,
        "mnemo starting"
    );

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    info!("shutting down");
}
