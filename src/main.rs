use ai_proxy_gateway::config::Args;
use ai_proxy_gateway::rate_limit::sweeper;
use ai_proxy_gateway::{AppState, build_router};
use clap::Parser; // for cli
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ai_proxy_gateway=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // parse cli arguments
    let args = Args::parse();
    let upstream = args.upstream_config();
    let limits = args.limits_config();

    for (provider, endpoint) in [
        ("openai", &upstream.openai),
        ("stability", &upstream.stability),
        ("huggingface", &upstream.huggingface),
    ] {
        if endpoint.key().is_none() {
            tracing::warn!(provider, "no credential configured, endpoint will answer 500");
        }
    }

    // creating shared state
    let state = Arc::new(AppState::new(reqwest::Client::new(), upstream, limits));

    // spawn the background sweeper
    let limiters = state.limiters();
    let sweep_interval = args.sweep_interval();
    tokio::spawn(async move {
        sweeper(limiters, sweep_interval).await;
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Gateway running on http://localhost:{}", args.port);
    tracing::info!(
        chat = limits.chat.limit,
        image = limits.image.limit,
        inference = limits.inference.limit,
        window_secs = args.rate_window,
        refund_on_upstream_failure = limits.refund_on_upstream_failure,
        "rate limits per window"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
