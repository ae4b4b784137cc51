use crate::application::ApplicationError;
use crate::domain::model::{CustomerContact, Order, OrderId, OrderNo, OrderStatus, Refund};
use crate::domain::port::OrderRepository;
use std::sync::Arc;

/// 注文クエリサービス
/// 読み取り専用の注文操作を提供する
pub struct OrderQueryService {
    order_repository: Arc<dyn OrderRepository>,
}

impl OrderQueryService {
    /// 新しい注文クエリサービスを作成
    ///
    /// # Arguments
    /// * `order_repository` - 注文リポジトリ
    pub fn new(order_repository: Arc<dyn OrderRepository>) -> Self {
        Self { order_repository }
    }

    /// 注文IDで注文を取得
    ///
    /// # Returns
    /// * `Ok(Order)` - 注文が見つかった
    /// * `Err(ApplicationError::NotFound)` - 注文が見つからなかった
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ApplicationError> {
        self.order_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("注文が見つかりません: {}", id)))
    }

    /// 注文一覧を取得
    /// ステータス指定がなければすべて、注文日時の降順
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, ApplicationError> {
        let orders = match status {
            Some(status) => self.order_repository.find_by_status(status).await?,
            None => self.order_repository.find_all().await?,
        };
        Ok(orders)
    }

    /// 注文番号と電話番号で注文を照会
    /// 両方が一致した場合のみ返す（アカウントによる認可は行わない）
    pub async fn lookup(&self, order_no: &OrderNo, phone: &str) -> Result<Order, ApplicationError> {
        let phone = CustomerContact::normalize_phone(phone)?;
        self.order_repository
            .find_by_order_no_and_phone(order_no, &phone)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("注文が見つかりません: {}", order_no)))
    }

    /// 注文の返金一覧（新しい順）
    pub async fn refunds(&self, order_id: OrderId) -> Result<Vec<Refund>, ApplicationError> {
        let order = self.get_order(order_id).await?;
        let mut refunds = order.refunds().to_vec();
        refunds.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(refunds)
    }
}
