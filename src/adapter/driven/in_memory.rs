use crate::domain::model::{
    CartSnapshot, CatalogProduct, DeliveryZone, Holiday, OperatingPolicy, Order, OrderId, OrderNo,
    OrderStatus, ProductId,
};
use crate::domain::port::{CartStore, CatalogStore, OrderRepository, PolicyStore, RepositoryError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// インメモリ注文リポジトリ
/// テストと `STORAGE_BACKEND=memory` で使う。MySQL版と同じバージョン比較を行う
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.ordered_at().cmp(&a.ordered_at()));
    orders
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(RepositoryError::OperationFailed(format!(
                "注文はすでに登録されています: {}",
                order.id()
            )));
        }
        let mut stored = order.clone();
        stored.take_domain_events();
        orders.insert(order.id(), stored);
        Ok(())
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let current = orders.get(&order.id()).ok_or_else(|| {
            RepositoryError::OperationFailed(format!("注文が登録されていません: {}", order.id()))
        })?;

        // 読み込み後に他の更新がコミットされていれば拒否する
        if current.version() != order.version() {
            return Err(RepositoryError::Conflict {
                order_id: order.id(),
                expected: order.version(),
            });
        }

        let mut stored = order.clone();
        stored.take_domain_events();
        stored.mark_committed();
        orders.insert(order.id(), stored);
        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn find_by_order_no_and_phone(
        &self,
        order_no: &OrderNo,
        phone: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.order_no() == order_no && o.customer().phone() == phone)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await.values().cloned().collect();
        Ok(newest_first(orders))
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        let orders = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.status() == status)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    fn next_identity(&self) -> OrderId {
        OrderId::new()
    }
}

/// インメモリのカートストア
#[derive(Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<String, CartSnapshot>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// カートを登録（同じセッションキーは上書き）
    pub async fn put_cart(&self, cart: CartSnapshot) {
        self.carts
            .write()
            .await
            .insert(cart.session_key.clone(), cart);
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, session_key: &str) -> Result<CartSnapshot, RepositoryError> {
        Ok(self
            .carts
            .read()
            .await
            .get(session_key)
            .cloned()
            .unwrap_or_else(|| CartSnapshot {
                session_key: session_key.to_string(),
                lines: Vec::new(),
            }))
    }

    async fn clear(&self, session_key: &str) -> Result<(), RepositoryError> {
        self.carts.write().await.remove(session_key);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCatalogStore {
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_product(&self, product: CatalogProduct) {
        self.products.write().await.insert(product.id, product);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, RepositoryError> {
        Ok(self.products.read().await.get(&product_id).cloned())
    }
}

/// インメモリの営業設定ストア
/// 初期状態は既定の営業ポリシー、休業日・ゾーンなし
#[derive(Default)]
pub struct InMemoryPolicyStore {
    policy: RwLock<OperatingPolicy>,
    holidays: RwLock<Vec<Holiday>>,
    zones: RwLock<Vec<DeliveryZone>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_policy(&self, policy: OperatingPolicy) {
        *self.policy.write().await = policy;
    }

    pub async fn set_holidays(&self, holidays: Vec<Holiday>) {
        *self.holidays.write().await = holidays;
    }

    pub async fn set_zones(&self, zones: Vec<DeliveryZone>) {
        *self.zones.write().await = zones;
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn operating_policy(&self) -> Result<OperatingPolicy, RepositoryError> {
        Ok(self.policy.read().await.clone())
    }

    async fn holidays(&self) -> Result<Vec<Holiday>, RepositoryError> {
        Ok(self.holidays.read().await.clone())
    }

    async fn delivery_zones(&self) -> Result<Vec<DeliveryZone>, RepositoryError> {
        Ok(self.zones.read().await.clone())
    }
}
