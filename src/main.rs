use std::net::SocketAddr;

use dotenvy::dotenv;
use schoolhub::logging::init_tracing;
use schoolhub::metrics::{init_metrics, metrics_app};
use schoolhub::router::init_router;
use schoolhub::state::init_app_state;
use tracing::{error, info};

fn env_port(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn migrations_enabled() -> bool {
    std::env::var("RUN_MIGRATIONS")
        .map(|v| !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    if let Some(handle) = init_metrics() {
        let port = env_port("METRICS_PORT", 9090);
        tokio::spawn(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    info!(%addr, "Metrics listening");
                    if let Err(e) = axum::serve(listener, metrics_app(handle)).await {
                        error!(error = %e, "Metrics server stopped");
                    }
                }
                Err(e) => error!(error = %e, %addr, "Metrics listener not started"),
            }
        });
    }

    let state = init_app_state().await;
    state
        .rate_limiters
        .spawn_cleanup(state.rate_limit_config.cleanup_interval());

    if migrations_enabled() {
        sqlx::migrate!("./migrations").run(&state.db).await?;
        info!("Migrations applied");
    }

    let app = init_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], env_port("PORT", 3000)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "SchoolHub API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
