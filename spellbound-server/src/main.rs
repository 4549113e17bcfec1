//! Spellbound server - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

use claude::Claude;
use spellbound_core::{
    ClaudeModel, GameConfig, GameEngine, KeywordLoreIndex, LoreRetriever, StateStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "spellbound_server=debug,spellbound_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Spellbound server");

    // Load configuration
    let saves_dir =
        std::env::var("SPELLBOUND_SAVES_DIR").unwrap_or_else(|_| "saves".into());
    let lore_dir = std::env::var("SPELLBOUND_LORE_DIR").unwrap_or_else(|_| "lore".into());
    let server_host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let server_port: u16 = std::env::var("SERVER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "5000".into())
        .parse()
        .unwrap_or(5000);

    let mut config = GameConfig::default().with_saves_dir(&saves_dir);
    if let Ok(model) = std::env::var("SPELLBOUND_NARRATOR_MODEL") {
        config = config.with_narrator_model(model);
    }

    // Wire the engine's dependencies
    let client = Claude::from_env()?;
    let model = Arc::new(ClaudeModel::new(
        client,
        &config.narrator_model,
        config.max_tokens,
    ));

    let index = KeywordLoreIndex::from_dir(&lore_dir, config.lore_top_k).await?;
    if index.is_empty() {
        tracing::warn!(%lore_dir, "lore index is empty; scenes will be ungrounded");
    } else {
        tracing::info!(passages = index.len(), "loaded lore index");
    }
    let retriever: Arc<dyn LoreRetriever> = Arc::new(index);

    let store = StateStore::on_disk(&config.saves_dir);
    let engine = Arc::new(GameEngine::new(store, retriever, model, config));

    // Build the router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::routes()
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{server_host}:{server_port}").parse()?;
    tracing::info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
