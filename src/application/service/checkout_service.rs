use crate::application::ApplicationError;
use crate::domain::model::{CartSnapshot, CatalogProduct, ProductId, ZoneQuery};
use crate::domain::port::{CartStore, CatalogStore, Clock, PolicyStore};
use crate::domain::service::{CheckoutQuote, CheckoutQuoteEngine, QuoteContext};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 見積もりサービス
/// カートと配送先から注文前の見積もりを計算する（読み取り専用）
pub struct CheckoutService {
    cart_store: Arc<dyn CartStore>,
    catalog_store: Arc<dyn CatalogStore>,
    policy_store: Arc<dyn PolicyStore>,
    engine: CheckoutQuoteEngine,
    clock: Arc<dyn Clock>,
}

impl CheckoutService {
    /// 新しい見積もりサービスを作成
    ///
    /// # Arguments
    /// * `cart_store` - カートストア
    /// * `catalog_store` - カタログストア（明細の在庫確認）
    /// * `policy_store` - 営業ポリシー・休業日・配送ゾーンのストア
    /// * `engine` - 見積もりエンジン（店舗の時差を保持）
    /// * `clock` - 現在時刻
    pub fn new(
        cart_store: Arc<dyn CartStore>,
        catalog_store: Arc<dyn CatalogStore>,
        policy_store: Arc<dyn PolicyStore>,
        engine: CheckoutQuoteEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cart_store,
            catalog_store,
            policy_store,
            engine,
            clock,
        }
    }

    /// セッションのカートで見積もりを計算
    ///
    /// # Arguments
    /// * `session_key` - カートのセッションキー
    /// * `address` - 配送先のゾーン判定キー
    /// * `requested_slot_start` - 希望配達時刻
    ///
    /// # Returns
    /// * `Ok(CheckoutQuote)` - 見積もり（ルール違反は `errors` に入る）
    /// * `Err(ApplicationError)` - ストアの読み込み失敗
    #[instrument(skip(self, address, requested_slot_start))]
    pub async fn quote(
        &self,
        session_key: &str,
        address: &ZoneQuery,
        requested_slot_start: Option<DateTime<Utc>>,
    ) -> Result<CheckoutQuote, ApplicationError> {
        let cart = self.cart_store.load(session_key).await?;
        self.quote_cart(&cart, address, requested_slot_start).await
    }

    /// 読み込み済みのカートで見積もりを計算
    /// 注文作成時もここを通るため、在庫は作成の直前に確認される
    pub async fn quote_cart(
        &self,
        cart: &CartSnapshot,
        address: &ZoneQuery,
        requested_slot_start: Option<DateTime<Utc>>,
    ) -> Result<CheckoutQuote, ApplicationError> {
        let policy = self.policy_store.operating_policy().await?;
        let holidays = self.policy_store.holidays().await?;
        let zones = self.policy_store.delivery_zones().await?;
        let catalog = self.load_catalog(cart).await?;

        let quote = self.engine.quote(
            cart,
            address,
            requested_slot_start,
            QuoteContext {
                policy: &policy,
                holidays: &holidays,
                zones: &zones,
                catalog: &catalog,
            },
            self.clock.now(),
        );
        debug!(
            valid = quote.valid,
            subtotal = %quote.subtotal,
            delivery_fee = %quote.delivery_fee,
            "見積もりを計算しました"
        );
        Ok(quote)
    }

    /// カート明細の商品をカタログから取得する
    async fn load_catalog(
        &self,
        cart: &CartSnapshot,
    ) -> Result<HashMap<ProductId, CatalogProduct>, ApplicationError> {
        let mut catalog = HashMap::new();
        for line in &cart.lines {
            if catalog.contains_key(&line.product_id) {
                continue;
            }
            if let Some(product) = self.catalog_store.find_product(line.product_id).await? {
                catalog.insert(product.id, product);
            }
        }
        Ok(catalog)
    }
}
