// 統合テスト共通のセットアップ（インメモリのストアと固定時刻）
#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use local_market_fulfillment::adapter::driven::{
    FixedClock, InMemoryCartStore, InMemoryCatalogStore, InMemoryOrderRepository,
    InMemoryPolicyStore, TracingEventPublisher,
};
use local_market_fulfillment::application::service::{
    CheckoutService, OrderApplicationService, OrderQueryService, OrderServiceSettings,
    PlaceOrderCommand,
};
use local_market_fulfillment::domain::model::{
    CartLine, CartSnapshot, CatalogProduct, DeliveryZone, FeeOverrides, Money, Order, ProductId,
    ZoneId, ZoneMatcher,
};
use local_market_fulfillment::domain::port::{CatalogStore, OrderRepository};
use local_market_fulfillment::domain::service::CheckoutQuoteEngine;
use std::sync::Arc;

pub const SESSION: &str = "session-1";
pub const PHONE: &str = "010-1234-5678";
pub const DONG: &str = "1168010100";

/// 店舗の時差（KST）
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// 2024-05-02 10:00 KST（営業時間内、締め切り前）
pub fn store_morning() -> DateTime<Utc> {
    kst()
        .with_ymd_and_hms(2024, 5, 2, 10, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub struct Harness {
    pub orders: Arc<dyn OrderRepository>,
    pub carts: Arc<InMemoryCartStore>,
    pub catalog: Arc<InMemoryCatalogStore>,
    pub policies: Arc<InMemoryPolicyStore>,
    pub clock: Arc<FixedClock>,
    pub checkout: Arc<CheckoutService>,
    pub service: Arc<OrderApplicationService>,
    pub queries: Arc<OrderQueryService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(
            OrderServiceSettings::default(),
            Arc::new(InMemoryOrderRepository::new()),
        )
    }

    pub fn with_settings(settings: OrderServiceSettings) -> Self {
        Self::build(settings, Arc::new(InMemoryOrderRepository::new()))
    }

    pub fn build(settings: OrderServiceSettings, orders: Arc<dyn OrderRepository>) -> Self {
        let carts = Arc::new(InMemoryCartStore::new());
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let policies = Arc::new(InMemoryPolicyStore::new());
        let clock = Arc::new(FixedClock::new(store_morning()));

        let checkout = Arc::new(CheckoutService::new(
            carts.clone(),
            catalog.clone(),
            policies.clone(),
            CheckoutQuoteEngine::new(kst()),
            clock.clone(),
        ));
        let service = Arc::new(OrderApplicationService::new(
            orders.clone(),
            carts.clone(),
            catalog.clone(),
            checkout.clone(),
            Arc::new(TracingEventPublisher::new()),
            clock.clone(),
            settings,
        ));
        let queries = Arc::new(OrderQueryService::new(orders.clone()));

        Self {
            orders,
            carts,
            catalog,
            policies,
            clock,
            checkout,
            service,
            queries,
        }
    }

    /// base_fee=3000, free_delivery_threshold=30000 の洞ゾーンを登録
    pub async fn with_dong_zone(&self) {
        let zone = DeliveryZone::new(
            ZoneId(1),
            ZoneMatcher::Dong {
                dong_code: DONG.to_string(),
            },
            FeeOverrides {
                min_order_amount: None,
                base_fee: Some(Money::won(3000)),
                free_delivery_threshold: Some(Money::won(30000)),
            },
            true,
        )
        .unwrap();
        self.policies.set_zones(vec![zone]).await;
    }

    /// カートを登録し、カタログにない商品は在庫100で登録する
    pub async fn put_cart(&self, lines: Vec<CartLine>) {
        for line in &lines {
            if self.catalog.find_product(line.product_id).await.unwrap().is_none() {
                self.stock(line.product_id, &line.product_name, line.unit_snapshot_price, 100)
                    .await;
            }
        }
        self.carts
            .put_cart(CartSnapshot {
                session_key: SESSION.to_string(),
                lines,
            })
            .await;
    }

    pub async fn put_product(&self, id: i64, name: &str, price: u64, available_qty: u32) {
        self.stock(ProductId(id), name, Money::won(price), available_qty)
            .await;
    }

    async fn stock(&self, id: ProductId, name: &str, unit_price: Money, available_qty: u32) {
        self.catalog
            .put_product(CatalogProduct {
                id,
                name: name.to_string(),
                unit_price,
                is_active: true,
                available_qty,
                max_per_order: 10,
            })
            .await;
    }

    /// 現在のカートから注文を作成
    pub async fn place(&self, allow_substitution: bool) -> Order {
        self.service
            .place_order(place_command(allow_substitution))
            .await
            .unwrap()
    }
}

pub fn place_command(allow_substitution: bool) -> PlaceOrderCommand {
    PlaceOrderCommand {
        session_key: SESSION.to_string(),
        customer_name: "김민수".to_string(),
        customer_phone: PHONE.to_string(),
        address_line1: "서울특별시 강남구 테헤란로 1".to_string(),
        dong_code: Some(DONG.to_string()),
        allow_substitution,
        ..PlaceOrderCommand::default()
    }
}

pub fn line(product_id: i64, name: &str, qty: u32, price: u64) -> CartLine {
    CartLine {
        product_id: ProductId(product_id),
        product_name: name.to_string(),
        unit_label: "1개".to_string(),
        qty,
        unit_snapshot_price: Money::won(price),
        is_weight_item: false,
    }
}

/// 5900×2 + 4200×1 + 8900×2 = 33800
pub fn grocery_lines() -> Vec<CartLine> {
    vec![
        line(1, "우유", 2, 5900),
        line(2, "식빵", 1, 4200),
        line(3, "딸기", 2, 8900),
    ]
}
