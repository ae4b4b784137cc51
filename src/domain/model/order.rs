use crate::domain::error::DomainError;
use crate::domain::event::{DomainEvent, OrderPlaced, OrderStatusChanged, RefundRecorded};
use crate::domain::model::{
    Actor, CustomerContact, DeliveryAddress, Money, OrderId, OrderItem, OrderItemId, OrderNo,
    OrderStatus, Refund, RefundLedger, RefundMethod, StatusLogId, ZoneId,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 初回ステータス履歴の理由
pub const ORDER_CREATED_REASON: &str = "ORDER_CREATED";

/// ステータス変更履歴（追記のみ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLog {
    pub id: StatusLogId,
    /// 初回の履歴のみ None
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: Actor,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 注文作成に必要な情報
/// 見積もり（配送料）は呼び出し側で検証済みであること
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer: CustomerContact,
    pub address: DeliveryAddress,
    pub zone_id: Option<ZoneId>,
    pub items: Vec<OrderItem>,
    pub delivery_fee: Money,
    pub allow_substitution: bool,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub delivery_request_note: Option<String>,
    pub ordered_at: DateTime<Utc>,
    pub cancel_window: Duration,
}

/// 永続化された注文の状態
/// リポジトリが `Order::reconstruct` に渡す
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub order_no: OrderNo,
    pub status: OrderStatus,
    pub customer: CustomerContact,
    pub address: DeliveryAddress,
    pub zone_id: Option<ZoneId>,
    pub items: Vec<OrderItem>,
    pub subtotal_estimated: Money,
    pub delivery_fee: Money,
    pub total_estimated: Money,
    pub total_final: Option<Money>,
    pub allow_substitution: bool,
    pub ordered_at: DateTime<Utc>,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub requested_slot_end: Option<DateTime<Utc>>,
    pub cancelable_until: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivery_request_note: Option<String>,
    pub refunds: Vec<Refund>,
    pub status_logs: Vec<StatusLog>,
    pub version: u64,
}

/// Order集約
///
/// 注文のライフサイクルと精算金額を管理する。
/// ステータスは `OrderStateMachine` 経由でのみ変更され、
/// 明細の数量・金額は `FulfillmentResolver` 経由でのみ変更される。
/// 返金はすべて内部の `RefundLedger` を通る。
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    order_no: OrderNo,
    status: OrderStatus,
    customer: CustomerContact,
    address: DeliveryAddress,
    zone_id: Option<ZoneId>,
    items: Vec<OrderItem>,
    subtotal_estimated: Money,
    delivery_fee: Money,
    total_estimated: Money,
    total_final: Option<Money>,
    allow_substitution: bool,
    ordered_at: DateTime<Utc>,
    requested_slot_start: Option<DateTime<Utc>>,
    requested_slot_end: Option<DateTime<Utc>>,
    cancelable_until: DateTime<Utc>,
    picked_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    delivery_request_note: Option<String>,
    ledger: RefundLedger,
    status_logs: Vec<StatusLog>,
    version: u64,
    domain_events: Vec<DomainEvent>,
}

impl Order {
    /// 新しい注文を作成
    /// 初期ステータスはRECEIVEDで、初回のステータス履歴を記録する
    pub fn place(new_order: NewOrder) -> Result<Self, DomainError> {
        if new_order.items.is_empty() {
            return Err(DomainError::Validation(
                "注文明細が空です".to_string(),
            ));
        }

        let subtotal_estimated: Money = new_order.items.iter().map(|i| i.line_estimated()).sum();
        let total_estimated = subtotal_estimated.add(&new_order.delivery_fee);
        let ordered_at = new_order.ordered_at;
        let order_no = OrderNo::generate(ordered_at);

        let initial_log = StatusLog {
            id: StatusLogId::new(),
            from_status: None,
            to_status: OrderStatus::Received,
            changed_by: Actor::system(),
            reason: Some(ORDER_CREATED_REASON.to_string()),
            created_at: ordered_at,
        };

        let event = DomainEvent::OrderPlaced(OrderPlaced {
            order_id: new_order.id,
            order_no: order_no.clone(),
            total_estimated,
            occurred_at: ordered_at,
        });

        Ok(Self {
            id: new_order.id,
            order_no,
            status: OrderStatus::Received,
            customer: new_order.customer,
            address: new_order.address,
            zone_id: new_order.zone_id,
            items: new_order.items,
            subtotal_estimated,
            delivery_fee: new_order.delivery_fee,
            total_estimated,
            total_final: None,
            allow_substitution: new_order.allow_substitution,
            ordered_at,
            requested_slot_start: new_order.requested_slot_start,
            requested_slot_end: new_order
                .requested_slot_start
                .map(|start| start + Duration::hours(1)),
            cancelable_until: ordered_at + new_order.cancel_window,
            picked_at: None,
            delivered_at: None,
            delivery_request_note: new_order.delivery_request_note,
            ledger: RefundLedger::new(),
            status_logs: vec![initial_log],
            version: 0,
            domain_events: vec![event],
        })
    }

    /// データベースから取得したデータで注文を再構築
    /// 保存データが不変条件を満たさない場合はエラー
    pub fn reconstruct(snapshot: OrderSnapshot) -> Result<Self, DomainError> {
        let ledger = RefundLedger::from_entries(snapshot.refunds);
        if ledger.refunded_total() > snapshot.total_estimated {
            return Err(DomainError::Validation(format!(
                "注文 {} の累計返金額が見積合計を超えています",
                snapshot.id
            )));
        }

        let items_total: Money = snapshot.items.iter().map(|i| i.line_estimated()).sum();
        if items_total != snapshot.subtotal_estimated {
            return Err(DomainError::Validation(format!(
                "注文 {} の小計が明細の合計と一致しません",
                snapshot.id
            )));
        }

        Ok(Self {
            id: snapshot.id,
            order_no: snapshot.order_no,
            status: snapshot.status,
            customer: snapshot.customer,
            address: snapshot.address,
            zone_id: snapshot.zone_id,
            items: snapshot.items,
            subtotal_estimated: snapshot.subtotal_estimated,
            delivery_fee: snapshot.delivery_fee,
            total_estimated: snapshot.total_estimated,
            total_final: snapshot.total_final,
            allow_substitution: snapshot.allow_substitution,
            ordered_at: snapshot.ordered_at,
            requested_slot_start: snapshot.requested_slot_start,
            requested_slot_end: snapshot.requested_slot_end,
            cancelable_until: snapshot.cancelable_until,
            picked_at: snapshot.picked_at,
            delivered_at: snapshot.delivered_at,
            delivery_request_note: snapshot.delivery_request_note,
            ledger,
            status_logs: snapshot.status_logs,
            version: snapshot.version,
            domain_events: Vec::new(),
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_no(&self) -> &OrderNo {
        &self.order_no
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn customer(&self) -> &CustomerContact {
        &self.customer
    }

    pub fn address(&self) -> &DeliveryAddress {
        &self.address
    }

    /// 適用された配送ゾーン（該当なしの場合は None）
    pub fn zone_id(&self) -> Option<ZoneId> {
        self.zone_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// 明細IDで明細を取得
    pub fn item(&self, item_id: OrderItemId) -> Result<&OrderItem, DomainError> {
        self.items
            .iter()
            .find(|i| i.id() == item_id)
            .ok_or(DomainError::ItemNotFound(item_id))
    }

    pub fn subtotal_estimated(&self) -> Money {
        self.subtotal_estimated
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    /// 作成時に確定した見積合計（以後変化しない）
    pub fn total_estimated(&self) -> Money {
        self.total_estimated
    }

    /// 終端ステータスに達するまで None
    pub fn total_final(&self) -> Option<Money> {
        self.total_final
    }

    pub fn allow_substitution(&self) -> bool {
        self.allow_substitution
    }

    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.ordered_at
    }

    pub fn requested_slot_start(&self) -> Option<DateTime<Utc>> {
        self.requested_slot_start
    }

    pub fn requested_slot_end(&self) -> Option<DateTime<Utc>> {
        self.requested_slot_end
    }

    pub fn cancelable_until(&self) -> DateTime<Utc> {
        self.cancelable_until
    }

    pub fn picked_at(&self) -> Option<DateTime<Utc>> {
        self.picked_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn delivery_request_note(&self) -> Option<&str> {
        self.delivery_request_note.as_deref()
    }

    pub fn refunds(&self) -> &[Refund] {
        self.ledger.entries()
    }

    pub fn refunded_total(&self) -> Money {
        self.ledger.refunded_total()
    }

    pub fn refundable_remaining(&self) -> Money {
        self.ledger.refundable_remaining(self.total_estimated)
    }

    pub fn status_logs(&self) -> &[StatusLog] {
        &self.status_logs
    }

    /// 楽観ロック用のバージョン（読み込み時点の値）
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 顧客本人による取消が可能か
    pub fn is_cancelable_by_customer(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Received && now <= self.cancelable_until
    }

    /// ドメインイベントを取得してクリア
    pub fn take_domain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.domain_events)
    }

    /// 返金額を記録できるか検証する（注文は変更しない）
    pub fn check_refund(&self, amount: Money) -> Result<(), DomainError> {
        self.ledger.check(self.total_estimated, amount)
    }

    /// 返金を記録する
    ///
    /// 欠品処理・キャンセル・手動返金のすべてがここを通り、
    /// 累計返金額が見積合計を超える返金は拒否される。
    /// 終端ステータスで精算済みの場合は最終金額を再計算する。
    pub fn record_refund(
        &mut self,
        amount: Money,
        reason: String,
        method: RefundMethod,
        processed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Refund, DomainError> {
        let refund = self.ledger.record(
            self.id,
            self.total_estimated,
            amount,
            reason,
            method,
            processed_by,
            now,
        )?;

        if self.total_final.is_some() {
            self.settle();
        }

        self.domain_events
            .push(DomainEvent::RefundRecorded(RefundRecorded {
                order_id: self.id,
                refund_id: refund.id,
                amount: refund.amount,
                reason: refund.reason.clone(),
                processed_by: refund.processed_by.clone(),
                occurred_at: now,
            }));

        Ok(refund)
    }

    /// ステータスを変更して履歴を追記する
    /// 遷移の可否は `OrderStateMachine` が検証済みであること
    pub(crate) fn apply_status_change(
        &mut self,
        to: OrderStatus,
        actor: &Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StatusLog {
        let from = self.status;
        self.status = to;

        match to {
            // 代替品確認から戻ったときは最初の開始時刻を残す
            OrderStatus::Picking => {
                self.picked_at.get_or_insert(now);
            }
            OrderStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        if to.is_terminal() {
            self.settle();
        }

        let log = StatusLog {
            id: StatusLogId::new(),
            from_status: Some(from),
            to_status: to,
            changed_by: actor.clone(),
            reason: reason.clone(),
            created_at: now,
        };
        self.status_logs.push(log.clone());

        self.domain_events
            .push(DomainEvent::OrderStatusChanged(OrderStatusChanged {
                order_id: self.id,
                from_status: from,
                to_status: to,
                changed_by_type: actor.actor_type(),
                changed_by_id: actor.id().to_string(),
                reason,
                occurred_at: now,
            }));

        log
    }

    /// 明細を可変で取得
    pub(crate) fn item_mut(&mut self, item_id: OrderItemId) -> Result<&mut OrderItem, DomainError> {
        self.items
            .iter_mut()
            .find(|i| i.id() == item_id)
            .ok_or(DomainError::ItemNotFound(item_id))
    }

    /// 明細金額の合計から小計を再計算
    pub(crate) fn recompute_subtotal(&mut self) {
        self.subtotal_estimated = self.items.iter().map(|i| i.line_estimated()).sum();
    }

    pub(crate) fn push_event(&mut self, event: DomainEvent) {
        self.domain_events.push(event);
    }

    /// 保存成功後にバージョンを進める
    pub(crate) fn mark_committed(&mut self) {
        self.version += 1;
    }

    /// 最終精算額 = 見積合計 - 累計返金額
    fn settle(&mut self) {
        self.total_final = Some(self.refundable_remaining());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ProductId, ZoneQuery};

    fn sample_order() -> Order {
        let items = vec![
            OrderItem::new(
                ProductId(1),
                "사과".to_string(),
                "1봉".to_string(),
                2,
                Money::won(5900),
                false,
            )
            .unwrap(),
            OrderItem::new(
                ProductId(2),
                "우유".to_string(),
                "1L".to_string(),
                1,
                Money::won(4200),
                false,
            )
            .unwrap(),
            OrderItem::new(
                ProductId(3),
                "삼겹살".to_string(),
                "500g".to_string(),
                2,
                Money::won(8900),
                true,
            )
            .unwrap(),
        ];
        Order::place(NewOrder {
            id: OrderId::new(),
            customer: CustomerContact::new("김민수".to_string(), "010-1234-5678").unwrap(),
            address: DeliveryAddress::new(
                "서울시 강남구 테헤란로 1".to_string(),
                None,
                None,
                None,
                ZoneQuery::default(),
            )
            .unwrap(),
            zone_id: None,
            items,
            delivery_fee: Money::zero(),
            allow_substitution: true,
            requested_slot_start: None,
            delivery_request_note: None,
            ordered_at: Utc::now(),
            cancel_window: Duration::minutes(30),
        })
        .unwrap()
    }

    #[test]
    fn test_place_computes_totals_and_initial_log() {
        let mut order = sample_order();
        assert_eq!(order.status(), OrderStatus::Received);
        assert_eq!(order.subtotal_estimated(), Money::won(33800));
        assert_eq!(order.total_estimated(), Money::won(33800));
        assert_eq!(order.total_final(), None);
        assert_eq!(order.status_logs().len(), 1);
        assert_eq!(order.status_logs()[0].from_status, None);
        assert_eq!(
            order.status_logs()[0].reason.as_deref(),
            Some(ORDER_CREATED_REASON)
        );
        assert!(order.order_no().as_str().starts_with("LM"));
        assert_eq!(order.take_domain_events().len(), 1);
    }

    #[test]
    fn test_place_without_items_fails() {
        let template = sample_order();
        let result = Order::place(NewOrder {
            id: OrderId::new(),
            customer: template.customer().clone(),
            address: template.address().clone(),
            zone_id: None,
            items: Vec::new(),
            delivery_fee: Money::won(3000),
            allow_substitution: false,
            requested_slot_start: None,
            delivery_request_note: None,
            ordered_at: Utc::now(),
            cancel_window: Duration::minutes(30),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_refund_is_capped_by_total_estimated() {
        let mut order = sample_order();
        order
            .record_refund(
                Money::won(30000),
                "고객 요청".to_string(),
                RefundMethod::CodAdjustment,
                "admin",
                Utc::now(),
            )
            .unwrap();
        let result = order.record_refund(
            Money::won(5000),
            "고객 요청".to_string(),
            RefundMethod::CodAdjustment,
            "admin",
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(DomainError::RefundExceedsRemaining { .. })
        ));
        assert_eq!(order.refundable_remaining(), Money::won(3800));
    }

    #[test]
    fn test_terminal_status_settles_total_final() {
        let mut order = sample_order();
        order
            .record_refund(
                Money::won(1000),
                "포장 불량".to_string(),
                RefundMethod::CodAdjustment,
                "admin",
                Utc::now(),
            )
            .unwrap();
        order.apply_status_change(OrderStatus::Canceled, &Actor::admin("admin"), None, Utc::now());
        assert_eq!(order.total_final(), Some(Money::won(32800)));
    }

    #[test]
    fn test_customer_cancel_window() {
        let order = sample_order();
        assert!(order.is_cancelable_by_customer(order.ordered_at()));
        assert!(!order.is_cancelable_by_customer(order.ordered_at() + Duration::minutes(31)));
    }
}
