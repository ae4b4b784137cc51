use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::model::{
    ActorType, Money, OrderId, OrderItemId, OrderNo, OrderStatus, RefundId,
};
use crate::domain::service::ShortageAction;

/// ドメインイベント列挙型
/// 集約の変更がコミットされた後に外部へ通知される
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// 注文が作成された
    OrderPlaced(OrderPlaced),
    /// 注文ステータスが変更された
    OrderStatusChanged(OrderStatusChanged),
    /// 欠品処理が適用された
    ShortageResolved(ShortageResolved),
    /// 返金が記録された
    RefundRecorded(RefundRecorded),
}

impl DomainEvent {
    /// イベント種別名
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderPlaced(_) => "order_placed",
            DomainEvent::OrderStatusChanged(_) => "order_status_changed",
            DomainEvent::ShortageResolved(_) => "shortage_resolved",
            DomainEvent::RefundRecorded(_) => "refund_recorded",
        }
    }

    /// 対象の注文ID
    pub fn order_id(&self) -> OrderId {
        match self {
            DomainEvent::OrderPlaced(e) => e.order_id,
            DomainEvent::OrderStatusChanged(e) => e.order_id,
            DomainEvent::ShortageResolved(e) => e.order_id,
            DomainEvent::RefundRecorded(e) => e.order_id,
        }
    }
}

/// 注文作成イベント
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_no: OrderNo,
    pub total_estimated: Money,
    pub occurred_at: DateTime<Utc>,
}

/// ステータス変更イベント
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub changed_by_type: ActorType,
    pub changed_by_id: String,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// 欠品処理イベント
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortageResolved {
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    pub action: ShortageAction,
    pub qty_fulfilled: u32,
    pub refund_amount: Money,
    /// 請求しなかった差額（代替品が高い場合）
    pub uncharged_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// 返金記録イベント
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundRecorded {
    pub order_id: OrderId,
    pub refund_id: RefundId,
    pub amount: Money,
    pub reason: String,
    pub processed_by: String,
    pub occurred_at: DateTime<Utc>,
}
