use local_market_fulfillment::adapter::driven::{
    InMemoryCartStore, InMemoryCatalogStore, InMemoryOrderRepository, InMemoryPolicyStore,
    MySqlCartStore, MySqlCatalogStore, MySqlOrderRepository, MySqlPolicyStore, SystemClock,
    TracingEventPublisher,
};
use local_market_fulfillment::adapter::driver::{create_router, AppState};
use local_market_fulfillment::adapter::telemetry::init_tracing;
use local_market_fulfillment::adapter::{
    AppConfig, DatabaseConfig, DatabaseMigration, LogFormat, StorageBackend,
};
use local_market_fulfillment::application::service::{
    CheckoutService, OrderApplicationService, OrderQueryService, OrderServiceSettings,
};
use local_market_fulfillment::domain::port::{
    CartStore, CatalogStore, Clock, OrderRepository, PolicyStore,
};
use local_market_fulfillment::domain::service::CheckoutQuoteEngine;

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 永続化方式ごとのストア一式
struct Stores {
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
    policies: Arc<dyn PolicyStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    // ログ形式だけは設定の読み込み失敗も出力できるよう先に決める
    let log_format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|f| f.parse::<LogFormat>().ok())
        .unwrap_or(LogFormat::Plain);
    init_tracing(log_format);

    let config = AppConfig::from_env()?;
    info!(
        server_addr = %config.server_addr,
        backend = ?config.storage_backend,
        "設定を読み込みました"
    );

    let stores = match config.storage_backend {
        StorageBackend::MySql => {
            let db_config = DatabaseConfig::from_env()?;
            info!(database = %db_config.redacted(), "データベースに接続します");

            // 接続プールを作成
            let pool = MySqlPoolOptions::new()
                .max_connections(db_config.max_connections)
                .acquire_timeout(db_config.acquire_timeout)
                .connect(&db_config.connection_string())
                .await?;

            // マイグレーションを実行
            DatabaseMigration::new(pool.clone()).run().await?;

            Stores {
                orders: Arc::new(MySqlOrderRepository::new(pool.clone())),
                carts: Arc::new(MySqlCartStore::new(pool.clone())),
                catalog: Arc::new(MySqlCatalogStore::new(pool.clone())),
                policies: Arc::new(MySqlPolicyStore::new(pool)),
            }
        }
        StorageBackend::Memory => {
            info!("インメモリのストアで起動します（再起動でデータは消えます）");
            Stores {
                orders: Arc::new(InMemoryOrderRepository::new()),
                carts: Arc::new(InMemoryCartStore::new()),
                catalog: Arc::new(InMemoryCatalogStore::new()),
                policies: Arc::new(InMemoryPolicyStore::new()),
            }
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let checkout_service = Arc::new(CheckoutService::new(
        stores.carts.clone(),
        stores.catalog.clone(),
        stores.policies.clone(),
        CheckoutQuoteEngine::new(config.store_offset()?),
        clock.clone(),
    ));
    let order_service = OrderApplicationService::new(
        stores.orders.clone(),
        stores.carts,
        stores.catalog,
        checkout_service.clone(),
        Arc::new(TracingEventPublisher::new()),
        clock,
        OrderServiceSettings {
            cancel_window: config.cancel_window(),
            auto_cancel: config.auto_cancel_policy(),
        },
    );

    // アプリケーション状態を作成
    let app_state = AppState {
        order_service: Arc::new(order_service),
        checkout_service,
        order_query_service: Arc::new(OrderQueryService::new(stores.orders)),
    };

    // REST APIルーターを作成
    let app = create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    // サーバーを起動
    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    info!(addr = %config.server_addr, "REST APIサーバーが起動しました");

    axum::serve(listener, app).await?;

    Ok(())
}
