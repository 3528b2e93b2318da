use std::sync::Arc;

use mailroom_api::app::{self, services};

// Service construction stays outside the async runtime: the SQLite store and
// the analyzer client both own blocking internals that panic if created on a
// runtime thread.
fn main() -> anyhow::Result<()> {
    mailroom_observability::init();

    let config = services::AppConfig::from_env();
    let app_services = Arc::new(services::build_services(&config)?);
    let app = app::build_app(app_services.clone());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.addr)
            .await
            .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.addr));

        tracing::info!("listening on {}", listener.local_addr().unwrap());

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await
            .unwrap();
    });

    // The server has drained; stop the enrichment workers before exiting.
    app_services.shutdown();
    Ok(())
}
