mod http;
mod providers;
mod request;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use chorus_core::providers::MockProvider;
use chorus_engine::config::EngineConfig;
use chorus_engine::{Engine, ExternalEndpoints};

use http::AppState;
use providers::ProviderCatalog;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind the service to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,
    /// Path to the engine config TOML file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to the provider catalog TOML file.
    #[arg(long)]
    providers: Option<PathBuf>,
    /// Web search backend endpoint.
    #[arg(long, default_value = "http://localhost:9200/search")]
    search_endpoint: Url,
    /// Domain widget backend endpoint.
    #[arg(long, default_value = "http://localhost:9200/widgets")]
    widget_endpoint: Url,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref())?;
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    info!(addr = %args.addr, "starting chorus-server");

    let endpoints = ExternalEndpoints {
        search_endpoint: args.search_endpoint,
        widget_endpoint: args.widget_endpoint,
    };
    // The engine's constructor-time provider is never exercised: every
    // request resolves its own provider from `chatModel` via `ProviderCatalog`
    // and calls `handle_with_provider`/`start_with_provider` instead.
    let engine = Engine::new(Arc::new(MockProvider::echo()), endpoints, config);
    let providers = ProviderCatalog::load(args.providers.as_deref())?;

    let state = Arc::new(AppState { engine, providers });
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
