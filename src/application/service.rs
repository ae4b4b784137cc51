mod checkout_service;
mod order_query_service;

pub use checkout_service::CheckoutService;
pub use order_query_service::OrderQueryService;

use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    Actor, CustomerContact, DeliveryAddress, Money, NewOrder, Order, OrderId, OrderItem, OrderNo,
    OrderStatus, Refund, RefundMethod, ZoneQuery,
};
use crate::domain::port::{CartStore, CatalogStore, Clock, EventPublisher, OrderRepository};
use crate::domain::service::{
    AutoCancelPolicy, FulfillmentDecision, FulfillmentResolver, OrderStateMachine,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 顧客による取消の理由（未指定時）
pub const CUSTOMER_CANCEL_REASON: &str = "CUSTOMER_CANCEL_REQUEST";

/// 注文作成コマンド
#[derive(Debug, Clone, Default)]
pub struct PlaceOrderCommand {
    pub session_key: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub building: Option<String>,
    pub unit_no: Option<String>,
    pub dong_code: Option<String>,
    pub apartment_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub allow_substitution: bool,
    pub delivery_request_note: Option<String>,
}

/// 欠品処理の結果
#[derive(Debug, Clone)]
pub struct ShortageActionResult {
    pub order: Order,
    pub refund: Option<Refund>,
    pub uncharged_amount: Money,
    pub auto_canceled: bool,
}

/// 注文サービスの設定値
#[derive(Debug, Clone, Copy)]
pub struct OrderServiceSettings {
    /// 顧客が自分で取り消せる期間
    pub cancel_window: Duration,
    /// 返金累計による自動キャンセル（None で無効）
    pub auto_cancel: Option<AutoCancelPolicy>,
}

impl Default for OrderServiceSettings {
    fn default() -> Self {
        Self {
            cancel_window: Duration::minutes(30),
            auto_cancel: None,
        }
    }
}

/// 注文アプリケーションサービス
///
/// 各操作は「読み込み → ドメインでの変更 → 楽観ロックでの保存 → イベント発行」の順で行う。
/// 同じ注文への同時更新は保存時に片方だけが成功し、もう片方は `Conflict` になる。
pub struct OrderApplicationService {
    order_repository: Arc<dyn OrderRepository>,
    cart_store: Arc<dyn CartStore>,
    catalog_store: Arc<dyn CatalogStore>,
    checkout: Arc<CheckoutService>,
    event_publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    resolver: FulfillmentResolver,
    cancel_window: Duration,
}

impl OrderApplicationService {
    /// 新しいアプリケーションサービスを作成
    ///
    /// # Arguments
    /// * `order_repository` - 注文リポジトリ
    /// * `cart_store` - カートストア
    /// * `catalog_store` - カタログストア（代替品の参照）
    /// * `checkout` - 見積もりサービス
    /// * `event_publisher` - イベント発行
    /// * `clock` - 現在時刻
    /// * `settings` - 取消期限・自動キャンセルの設定
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        cart_store: Arc<dyn CartStore>,
        catalog_store: Arc<dyn CatalogStore>,
        checkout: Arc<CheckoutService>,
        event_publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        settings: OrderServiceSettings,
    ) -> Self {
        Self {
            order_repository,
            cart_store,
            catalog_store,
            checkout,
            event_publisher,
            clock,
            resolver: FulfillmentResolver::new(settings.auto_cancel),
            cancel_window: settings.cancel_window,
        }
    }

    /// カートから注文を作成
    ///
    /// # Arguments
    /// * `command` - 注文作成コマンド
    ///
    /// # Returns
    /// * `Ok(Order)` - 作成された注文
    /// * `Err(ApplicationError)` - 見積もりが無効（PolicyViolation）、入力不正、保存失敗
    #[instrument(skip_all, fields(session_key = %command.session_key))]
    pub async fn place_order(&self, command: PlaceOrderCommand) -> Result<Order, ApplicationError> {
        let zone_query = ZoneQuery::new(
            command.dong_code,
            command.apartment_name,
            command.latitude,
            command.longitude,
        )?;
        let customer = CustomerContact::new(command.customer_name, &command.customer_phone)?;

        let cart = self.cart_store.load(&command.session_key).await?;
        let quote = self
            .checkout
            .quote_cart(&cart, &zone_query, command.requested_slot_start)
            .await?;
        if !quote.valid {
            return Err(DomainError::PolicyViolation(quote.errors).into());
        }

        let address = DeliveryAddress::new(
            command.address_line1,
            command.address_line2,
            command.building,
            command.unit_no,
            zone_query,
        )?;

        let items = cart
            .lines
            .iter()
            .map(|line| {
                OrderItem::new(
                    line.product_id,
                    line.product_name.clone(),
                    line.unit_label.clone(),
                    line.qty,
                    line.unit_snapshot_price,
                    line.is_weight_item,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut order = Order::place(NewOrder {
            id: self.order_repository.next_identity(),
            customer,
            address,
            zone_id: quote.zone_id,
            items,
            delivery_fee: quote.delivery_fee,
            allow_substitution: command.allow_substitution,
            requested_slot_start: command.requested_slot_start,
            delivery_request_note: command.delivery_request_note,
            ordered_at: self.clock.now(),
            cancel_window: self.cancel_window,
        })?;

        self.order_repository.insert(&order).await?;
        info!(
            order_id = %order.id(),
            order_no = %order.order_no(),
            total_estimated = %order.total_estimated(),
            "注文を作成しました"
        );

        // 注文はコミット済みなので、カートの削除失敗は記録するだけ
        if let Err(e) = self.cart_store.clear(&command.session_key).await {
            warn!(error = %e, "カートの削除に失敗しました");
        }

        self.publish_events(&mut order).await;
        Ok(order)
    }

    /// 注文ステータスを変更
    ///
    /// # Arguments
    /// * `order_id` - 注文ID
    /// * `status` - 遷移先ステータス
    /// * `reason` - 変更理由
    /// * `actor` - 操作者
    ///
    /// # Returns
    /// * `Ok(Order)` - 変更後の注文
    /// * `Err(ApplicationError)` - 遷移不可、競合、保存失敗
    #[instrument(skip_all, fields(order_id = %order_id, status = %status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        reason: Option<String>,
        actor: Actor,
    ) -> Result<Order, ApplicationError> {
        let mut order = self.load_order(order_id).await?;
        let outcome = OrderStateMachine::transition(
            &mut order,
            status,
            &actor,
            reason,
            self.clock.now(),
        )?;

        if outcome.status_log.is_none() {
            return Ok(order);
        }

        self.commit(&mut order).await?;
        info!(
            to = %status,
            refund = ?outcome.refund.as_ref().map(|r| r.amount.to_string()),
            "注文ステータスを変更しました"
        );
        Ok(order)
    }

    /// 欠品処理を適用
    ///
    /// 明細の更新と返金の記録は1つの保存で反映される。
    ///
    /// # Arguments
    /// * `order_id` - 注文ID
    /// * `decision` - 欠品処理の指示
    /// * `actor` - 操作者
    ///
    /// # Returns
    /// * `Ok(ShortageActionResult)` - 更新後の注文と返金
    /// * `Err(ApplicationError)` - 検証失敗、競合、保存失敗
    #[instrument(
        skip_all,
        fields(order_id = %order_id, item_id = %decision.order_item_id, action = %decision.action)
    )]
    pub async fn apply_shortage_action(
        &self,
        order_id: OrderId,
        decision: FulfillmentDecision,
        actor: Actor,
    ) -> Result<ShortageActionResult, ApplicationError> {
        let mut order = self.load_order(order_id).await?;

        let substitute = match decision.substitution_product_id {
            Some(product_id) => Some(
                self.catalog_store
                    .find_product(product_id)
                    .await?
                    .ok_or_else(|| {
                        ApplicationError::NotFound(format!("商品が見つかりません: {}", product_id))
                    })?,
            ),
            None => None,
        };

        let outcome = self.resolver.apply(
            &mut order,
            &decision,
            substitute.as_ref(),
            &actor,
            self.clock.now(),
        )?;

        self.commit(&mut order).await?;
        info!(
            refund = ?outcome.refund.as_ref().map(|r| r.amount.to_string()),
            uncharged = %outcome.uncharged_amount,
            auto_canceled = outcome.auto_canceled,
            "欠品処理を適用しました"
        );

        Ok(ShortageActionResult {
            order,
            refund: outcome.refund,
            uncharged_amount: outcome.uncharged_amount,
            auto_canceled: outcome.auto_canceled,
        })
    }

    /// 手動で返金を記録
    ///
    /// # Arguments
    /// * `order_id` - 注文ID
    /// * `amount` - 返金額
    /// * `reason` - 返金理由
    /// * `method` - 返金方法
    /// * `actor` - 操作者
    ///
    /// # Returns
    /// * `Ok(Refund)` - 記録された返金
    /// * `Err(ApplicationError)` - 残高超過、競合、保存失敗
    #[instrument(skip_all, fields(order_id = %order_id, amount = %amount))]
    pub async fn create_refund(
        &self,
        order_id: OrderId,
        amount: Money,
        reason: String,
        method: RefundMethod,
        actor: Actor,
    ) -> Result<Refund, ApplicationError> {
        let mut order = self.load_order(order_id).await?;
        let refund = order.record_refund(amount, reason, method, actor.id(), self.clock.now())?;

        self.commit(&mut order).await?;
        info!(
            refund_id = %refund.id,
            remaining = %order.refundable_remaining(),
            "返金を記録しました"
        );
        Ok(refund)
    }

    /// 顧客による注文の取消
    ///
    /// 注文番号と電話番号の両方が一致する注文のみ対象とし、
    /// RECEIVED かつ取消期限内の場合だけキャンセルできる。
    #[instrument(skip_all, fields(order_no = %order_no))]
    pub async fn cancel_by_customer(
        &self,
        order_no: &OrderNo,
        phone: &str,
        reason: Option<String>,
    ) -> Result<Order, ApplicationError> {
        let phone = CustomerContact::normalize_phone(phone)?;
        let mut order = self
            .order_repository
            .find_by_order_no_and_phone(order_no, &phone)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("注文が見つかりません: {}", order_no)))?;

        let now = self.clock.now();
        if !order.is_cancelable_by_customer(now) {
            return Err(DomainError::OrderNotCancelable(format!(
                "注文 {} は取り消せません（ステータス: {}）",
                order_no,
                order.status()
            ))
            .into());
        }

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| CUSTOMER_CANCEL_REASON.to_string());
        OrderStateMachine::transition(
            &mut order,
            OrderStatus::Canceled,
            &Actor::customer(phone),
            Some(reason),
            now,
        )?;

        self.commit(&mut order).await?;
        info!(order_id = %order.id(), "顧客が注文を取り消しました");
        Ok(order)
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order, ApplicationError> {
        self.order_repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("注文が見つかりません: {}", order_id)))
    }

    /// 楽観ロックで保存し、成功したらイベントを発行する
    async fn commit(&self, order: &mut Order) -> Result<(), ApplicationError> {
        if let Err(e) = self.order_repository.save(order).await {
            let err = ApplicationError::from(e);
            if err.is_retriable() {
                warn!(order_id = %order.id(), error = %err, "同時更新と競合しました");
            }
            return Err(err);
        }
        order.mark_committed();
        self.publish_events(order).await;
        Ok(())
    }

    /// コミット済みの変更は発行失敗で取り消さない
    async fn publish_events(&self, order: &mut Order) {
        for event in order.take_domain_events() {
            if let Err(e) = self.event_publisher.publish(&event).await {
                warn!(
                    event_type = event.event_type(),
                    order_id = %event.order_id(),
                    error = %e,
                    "イベントの発行に失敗しました"
                );
            }
        }
    }
}
