use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use inspection_market::config::AppConfig;
use inspection_market::error::AppError;
use inspection_market::marketplace::memory::{
    InMemoryMarketStore, MemoryDirectory, RecordingGateway,
};
use inspection_market::marketplace::policy::MarketPolicy;
use inspection_market::marketplace::Marketplace;
use inspection_market::telemetry;

use crate::cli::ServeArgs;
use crate::infra::{seed_principals, AppState};
use crate::routes::with_market_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryMarketStore::default());
    let directory = Arc::new(MemoryDirectory::default());
    seed_principals(&directory);
    let gateway = Arc::new(RecordingGateway::default());
    let policy = MarketPolicy::from_config(&config.market);
    let market = Arc::new(Marketplace::new(
        store,
        directory,
        gateway,
        policy,
        config.market.webhook_secret.clone(),
    ));

    let app = with_market_routes(market)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "inspection marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
