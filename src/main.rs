use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use relay_broker::PusherBroker;
use relay_core::{constants, BrokerCredentials, Topic};

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Main entry point for the form relay server
///
/// Serves the relay publish endpoint, the health check and the API documentation, forwarding
/// every posted payload to the hosted broker.
///
/// # Environment Variables
/// - `PUSHER_APP_ID`, `PUSHER_KEY`, `PUSHER_SECRET`, `PUSHER_CLUSTER`: broker credentials
///   (all required)
/// - `PUSHER_HOST`, `PUSHER_USE_TLS`: optional broker host override
/// - `RELAY_CHANNEL`, `RELAY_EVENT`: topic (default: "hospital-form" / "patient-update")
/// - `RELAY_REST_ADDR`: server address (default: "0.0.0.0:3000")
///
/// # Errors
/// Returns an error if:
/// - any broker credential is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_run=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let credentials = BrokerCredentials::from_lookup(env_lookup)?;
    let topic = Topic::from_lookup(env_lookup)?;
    let rest_addr = env_lookup(constants::ENV_RELAY_REST_ADDR)
        .unwrap_or_else(|| constants::DEFAULT_REST_ADDR.into());

    tracing::info!(
        "-- Relaying {}/{} via app {} on cluster {}",
        topic.channel(),
        topic.event(),
        credentials.app_id(),
        credentials.endpoint().cluster()
    );

    let broker = PusherBroker::new(credentials)?;
    let app = router(AppState::new(Arc::new(broker), topic));

    tracing::info!("-- Starting form relay on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Form relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
