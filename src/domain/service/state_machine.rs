use crate::domain::error::DomainError;
use crate::domain::model::{Actor, Order, OrderStatus, Refund, RefundMethod, StatusLog};
use chrono::{DateTime, Utc};

/// キャンセル時の自動返金の理由
pub const CANCEL_REFUND_REASON: &str = "order canceled";

/// ステータス遷移表
/// 終端ステータス（DELIVERED, CANCELED）は遷移先を持たない
const TRANSITIONS: &[(OrderStatus, &[OrderStatus])] = &[
    (
        OrderStatus::Received,
        &[OrderStatus::Picking, OrderStatus::Canceled],
    ),
    (
        OrderStatus::Picking,
        &[
            OrderStatus::SubstitutionPending,
            OrderStatus::OutForDelivery,
            OrderStatus::Canceled,
        ],
    ),
    (
        OrderStatus::SubstitutionPending,
        &[OrderStatus::Picking, OrderStatus::Canceled],
    ),
    (OrderStatus::OutForDelivery, &[OrderStatus::Delivered]),
    (OrderStatus::Delivered, &[]),
    (OrderStatus::Canceled, &[]),
];

/// 遷移の結果
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// 現在と同じステータスを指定した場合は None
    pub status_log: Option<StatusLog>,
    /// キャンセル時に記録された返金
    pub refund: Option<Refund>,
}

/// 注文ステータスの状態機械
///
/// ステータスの変更はすべてここを通る。遷移表にない遷移は
/// `InvalidTransition` で拒否され、成功した遷移は必ず履歴を残す。
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// 指定ステータスから遷移可能なステータス（名前順）
    pub fn allowed_next(status: OrderStatus) -> Vec<OrderStatus> {
        let mut next: Vec<OrderStatus> = TRANSITIONS
            .iter()
            .find(|(from, _)| *from == status)
            .map(|(_, to)| to.to_vec())
            .unwrap_or_default();
        next.sort_by_key(|s| s.as_str());
        next
    }

    /// 遷移が許可されているか
    pub fn is_transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
        TRANSITIONS
            .iter()
            .any(|(f, targets)| *f == from && targets.contains(&to))
    }

    /// 注文のステータスを遷移させる
    ///
    /// # Arguments
    /// * `order` - 対象の注文
    /// * `target` - 遷移先ステータス
    /// * `actor` - 操作者
    /// * `reason` - 変更理由
    /// * `now` - 変更日時
    ///
    /// # Returns
    /// * `Ok(TransitionOutcome)` - 遷移成功（同一ステータスなら何もしない）
    /// * `Err(DomainError::InvalidTransition)` - 遷移表にない遷移
    pub fn transition(
        order: &mut Order,
        target: OrderStatus,
        actor: &Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let from = order.status();
        if from == target {
            return Ok(TransitionOutcome {
                status_log: None,
                refund: None,
            });
        }

        if !Self::is_transition_allowed(from, target) {
            return Err(DomainError::InvalidTransition { from, to: target });
        }

        // キャンセルは未返金の残高をすべて返金する
        let refund = if target == OrderStatus::Canceled {
            let remaining = order.refundable_remaining();
            if remaining.is_zero() {
                None
            } else {
                Some(order.record_refund(
                    remaining,
                    CANCEL_REFUND_REASON.to_string(),
                    RefundMethod::CodAdjustment,
                    actor.id(),
                    now,
                )?)
            }
        } else {
            None
        };

        let status_log = order.apply_status_change(target, actor, reason, now);

        Ok(TransitionOutcome {
            status_log: Some(status_log),
            refund,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        CustomerContact, DeliveryAddress, Money, NewOrder, OrderId, OrderItem, ProductId,
        ZoneQuery,
    };
    use chrono::Duration;

    fn order_with_total(unit_price: u64) -> Order {
        Order::place(NewOrder {
            id: OrderId::new(),
            customer: CustomerContact::new("이영희".to_string(), "01098765432").unwrap(),
            address: DeliveryAddress::new(
                "서울시 마포구 1".to_string(),
                None,
                None,
                None,
                ZoneQuery::default(),
            )
            .unwrap(),
            zone_id: None,
            items: vec![OrderItem::new(
                ProductId(10),
                "두부".to_string(),
                "1모".to_string(),
                1,
                Money::won(unit_price),
                false,
            )
            .unwrap()],
            delivery_fee: Money::won(3000),
            allow_substitution: false,
            requested_slot_start: None,
            delivery_request_note: None,
            ordered_at: Utc::now(),
            cancel_window: Duration::minutes(30),
        })
        .unwrap()
    }

    #[test]
    fn test_allowed_next_is_sorted() {
        assert_eq!(
            OrderStateMachine::allowed_next(OrderStatus::Picking),
            vec![
                OrderStatus::Canceled,
                OrderStatus::OutForDelivery,
                OrderStatus::SubstitutionPending,
            ]
        );
        assert!(OrderStateMachine::allowed_next(OrderStatus::Delivered).is_empty());
        assert!(OrderStateMachine::allowed_next(OrderStatus::Canceled).is_empty());
    }

    #[test]
    fn test_received_to_delivered_is_rejected() {
        let mut order = order_with_total(12000);
        let result = OrderStateMachine::transition(
            &mut order,
            OrderStatus::Delivered,
            &Actor::admin("admin"),
            None,
            Utc::now(),
        );
        assert_eq!(
            result,
            Err(DomainError::InvalidTransition {
                from: OrderStatus::Received,
                to: OrderStatus::Delivered,
            })
        );
        assert_eq!(order.status(), OrderStatus::Received);
        assert_eq!(order.status_logs().len(), 1);
    }

    #[test]
    fn test_full_delivery_path_settles_total() {
        let mut order = order_with_total(12000);
        let admin = Actor::admin("admin");
        for status in [
            OrderStatus::Picking,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            OrderStateMachine::transition(&mut order, status, &admin, None, Utc::now()).unwrap();
        }
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.picked_at().is_some());
        assert!(order.delivered_at().is_some());
        assert_eq!(order.total_final(), Some(Money::won(15000)));
        assert_eq!(order.status_logs().len(), 4);
    }

    #[test]
    fn test_return_from_substitution_keeps_first_picked_at() {
        let mut order = order_with_total(12000);
        let admin = Actor::admin("admin");
        let started = Utc::now();
        OrderStateMachine::transition(&mut order, OrderStatus::Picking, &admin, None, started)
            .unwrap();
        let later = started + Duration::minutes(20);
        OrderStateMachine::transition(
            &mut order,
            OrderStatus::SubstitutionPending,
            &admin,
            None,
            later,
        )
        .unwrap();
        OrderStateMachine::transition(&mut order, OrderStatus::Picking, &admin, None, later)
            .unwrap();

        assert_eq!(order.picked_at(), Some(started));
        assert_eq!(order.status_logs().len(), 4);
    }

    #[test]
    fn test_cancel_refunds_remaining_balance() {
        let mut order = order_with_total(12000);
        let outcome = OrderStateMachine::transition(
            &mut order,
            OrderStatus::Canceled,
            &Actor::customer("01098765432"),
            Some("고객 취소".to_string()),
            Utc::now(),
        )
        .unwrap();
        let refund = outcome.refund.unwrap();
        assert_eq!(refund.amount, Money::won(15000));
        assert!(order.refundable_remaining().is_zero());
        assert_eq!(order.total_final(), Some(Money::zero()));
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut order = order_with_total(12000);
        let outcome = OrderStateMachine::transition(
            &mut order,
            OrderStatus::Received,
            &Actor::admin("admin"),
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(outcome.status_log.is_none());
        assert_eq!(order.status_logs().len(), 1);
    }

    #[test]
    fn test_terminal_status_cannot_regress() {
        let mut order = order_with_total(12000);
        let admin = Actor::admin("admin");
        OrderStateMachine::transition(&mut order, OrderStatus::Canceled, &admin, None, Utc::now())
            .unwrap();
        for target in OrderStatus::ALL {
            if target == OrderStatus::Canceled {
                continue;
            }
            assert!(OrderStateMachine::transition(&mut order, target, &admin, None, Utc::now())
                .is_err());
        }
    }
}
