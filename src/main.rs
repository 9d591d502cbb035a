use cashier_gateway::api::{self, AppState};
use cashier_gateway::config::AppConfig;
use cashier_gateway::logging::init_tracing;
use cashier_gateway::middleware::logging::{request_logging_middleware, UuidRequestId};
use cashier_gateway::payments::factory::{PaymentFactoryConfig, PaymentProviderFactory};
use cashier_gateway::services::comm_log::CommLogSink;
use cashier_gateway::services::orchestrator::PaymentOrchestrator;
use cashier_gateway::services::order_store::OrderStore;
use cashier_gateway::services::reconciler::CallbackReconciler;
use cashier_gateway::services::runtime_config::RuntimeConfigStore;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_config = AppConfig::from_env()?;
    app_config.validate()?;
    init_tracing(&app_config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting cashier gateway"
    );

    let secrets = Arc::new(RuntimeConfigStore::new());
    let comm_log = CommLogSink::new(app_config.gateway.comm_log_endpoint.clone());

    let factory_config = PaymentFactoryConfig::from_env()?;
    let factory = Arc::new(
        PaymentProviderFactory::build(&factory_config, secrets.clone(), comm_log.clone())
            .map_err(|e| {
                error!("Failed to initialize payment provider factory: {}", e);
                anyhow::anyhow!(e.user_message())
            })?,
    );
    info!(
        providers = ?factory.list_available_providers(),
        "✅ Payment providers initialized"
    );

    let store = Arc::new(OrderStore::new());
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        factory,
        store.clone(),
        app_config.gateway.pending_timeout,
    ));
    let reconciler = Arc::new(CallbackReconciler::new(
        store.clone(),
        app_config.gateway.recency_window,
    ));

    let state = Arc::new(AppState {
        orchestrator,
        reconciler,
        store,
        secrets,
        comm_log,
    });

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr =
        format!("{}:{}", app_config.server.host, app_config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");

    Ok(())
}
