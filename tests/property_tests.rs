use chrono::{Duration, FixedOffset, TimeZone, Utc};
use local_market_fulfillment::domain::error::DomainError;
use local_market_fulfillment::domain::model::{
    Actor, CartLine, CartSnapshot, CatalogProduct, CustomerContact, DeliveryAddress, DeliveryZone,
    FeeOverrides, GeoPoint, ItemStatus, Money, NewOrder, OperatingPolicy, Order, OrderId,
    OrderItem, OrderStatus, ProductId, RefundMethod, ZoneId, ZoneMatcher, ZoneQuery,
};
use local_market_fulfillment::domain::service::{
    CheckoutQuoteEngine, DeliveryZoneResolver, FulfillmentDecision, FulfillmentResolver,
    OrderStateMachine, QuoteContext, ShortageAction,
};
use proptest::prelude::*;
use std::collections::HashMap;

fn order_with_lines(lines: &[(u32, u64)], allow_substitution: bool) -> Order {
    let items = lines
        .iter()
        .enumerate()
        .map(|(i, (qty, price))| {
            OrderItem::new(
                ProductId(i as i64 + 1),
                format!("상품{}", i + 1),
                "1개".to_string(),
                *qty,
                Money::won(*price),
                false,
            )
            .unwrap()
        })
        .collect();

    Order::place(NewOrder {
        id: OrderId::new(),
        customer: CustomerContact::new("정하늘".to_string(), "01012345678").unwrap(),
        address: DeliveryAddress::new(
            "대전시 유성구 1".to_string(),
            None,
            None,
            None,
            ZoneQuery::default(),
        )
        .unwrap(),
        zone_id: None,
        items,
        delivery_fee: Money::won(3000),
        allow_substitution,
        requested_slot_start: None,
        delivery_request_note: None,
        ordered_at: Utc::now(),
        cancel_window: Duration::minutes(30),
    })
    .unwrap()
}

/// 指定ステータスまで正規の経路で進める
fn drive_to(order: &mut Order, status: OrderStatus) {
    let path: &[OrderStatus] = match status {
        OrderStatus::Received => &[],
        OrderStatus::Picking => &[OrderStatus::Picking],
        OrderStatus::SubstitutionPending => {
            &[OrderStatus::Picking, OrderStatus::SubstitutionPending]
        }
        OrderStatus::OutForDelivery => &[OrderStatus::Picking, OrderStatus::OutForDelivery],
        OrderStatus::Delivered => &[
            OrderStatus::Picking,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ],
        OrderStatus::Canceled => &[OrderStatus::Canceled],
    };
    for next in path {
        OrderStateMachine::transition(order, *next, &Actor::admin("admin"), None, Utc::now())
            .unwrap();
    }
}

fn any_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

// 金額のプロパティ
proptest! {
    /// 加算は交換法則を満たす
    #[test]
    fn test_money_addition_is_commutative(a in 0u64..10_000_000, b in 0u64..10_000_000) {
        prop_assert_eq!(Money::won(a).add(&Money::won(b)), Money::won(b).add(&Money::won(a)));
    }

    /// 減算は0未満にならない
    #[test]
    fn test_money_saturating_sub_never_negative(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let diff = Money::won(a).saturating_sub(&Money::won(b));
        prop_assert_eq!(diff, Money::won(a.saturating_sub(b)));
    }

    /// 乗算は分配法則を満たす
    #[test]
    fn test_money_multiplication_distributive(
        price in 1u64..100_000,
        x in 0u32..100,
        y in 0u32..100,
    ) {
        let money = Money::won(price);
        prop_assert_eq!(
            money.multiply(x + y),
            money.multiply(x).add(&money.multiply(y))
        );
    }
}

// 欠品処理のプロパティ
proptest! {
    /// 部分キャンセルは注文数未満のときだけ受け付け、差額をちょうど返金する
    #[test]
    fn test_partial_cancel_quantity_bounds(
        qty_ordered in 1u32..20,
        fulfilled in 0u32..40,
        price in 100u64..50_000,
    ) {
        let mut order = order_with_lines(&[(qty_ordered, price)], false);
        let before = order.clone();
        let decision = FulfillmentDecision {
            order_item_id: order.items()[0].id(),
            action: ShortageAction::PartialCancel,
            fulfilled_qty: Some(fulfilled),
            substitution_product_id: None,
            substitution_qty: None,
            reason: None,
        };

        let result = FulfillmentResolver::default().apply(
            &mut order,
            &decision,
            None,
            &Actor::admin("picker"),
            Utc::now(),
        );

        if fulfilled < qty_ordered {
            let outcome = result.unwrap();
            let item = &order.items()[0];
            prop_assert_eq!(item.qty_fulfilled(), fulfilled);
            prop_assert_eq!(item.status(), ItemStatus::PartialCanceled);
            prop_assert_eq!(
                outcome.refund.map(|r| r.amount).unwrap_or_else(Money::zero),
                Money::won(price).multiply(qty_ordered - fulfilled)
            );
            prop_assert_eq!(order.status(), OrderStatus::Picking);
        } else {
            let is_invalid_quantity = matches!(result, Err(DomainError::InvalidQuantity { .. }));
            prop_assert!(is_invalid_quantity);
            prop_assert_eq!(order, before);
        }
    }

    /// 累計返金額は見積合計を超えない
    #[test]
    fn test_refund_total_never_exceeds_total_estimated(
        amounts in prop::collection::vec(1u64..20_000, 1..12),
    ) {
        let mut order = order_with_lines(&[(2, 5900), (1, 4200)], false);
        let total = order.total_estimated();

        for amount in amounts {
            let before = order.refunded_total();
            let remaining = order.refundable_remaining();
            let result = order.record_refund(
                Money::won(amount),
                "adjustment".to_string(),
                RefundMethod::CodAdjustment,
                "admin",
                Utc::now(),
            );
            if Money::won(amount) <= remaining {
                prop_assert!(result.is_ok());
            } else {
                let exceeded = matches!(result, Err(DomainError::RefundExceedsRemaining { .. }));
                prop_assert!(exceeded);
                prop_assert_eq!(order.refunded_total(), before);
            }
            prop_assert!(order.refunded_total() <= total);
            prop_assert_eq!(
                order.refunded_total().add(&order.refundable_remaining()),
                total
            );
        }
    }

    /// 明細金額は欠品処理で増えない
    #[test]
    fn test_line_amount_never_increases(
        qty_ordered in 1u32..10,
        price in 100u64..20_000,
        sub_price in 100u64..40_000,
        sub_qty in 1u32..10,
    ) {
        prop_assume!(sub_qty <= qty_ordered);
        let mut order = order_with_lines(&[(qty_ordered, price)], true);
        let current = order.items()[0].line_estimated();
        let product = CatalogProduct {
            id: ProductId(99),
            name: "대체품".to_string(),
            unit_price: Money::won(sub_price),
            is_active: true,
            available_qty: 100,
            max_per_order: 10,
        };
        let decision = FulfillmentDecision {
            order_item_id: order.items()[0].id(),
            action: ShortageAction::Substitute,
            fulfilled_qty: None,
            substitution_product_id: Some(ProductId(99)),
            substitution_qty: Some(sub_qty),
            reason: None,
        };

        let outcome = FulfillmentResolver::default()
            .apply(&mut order, &decision, Some(&product), &Actor::admin("picker"), Utc::now())
            .unwrap();

        let computed = Money::won(sub_price).multiply(sub_qty);
        let charged = order.items()[0].line_estimated();
        prop_assert!(charged <= current);
        prop_assert_eq!(charged, std::cmp::min(computed, current));
        prop_assert_eq!(outcome.uncharged_amount, computed.saturating_sub(&current));
        prop_assert_eq!(order.refunded_total(), current.saturating_sub(&computed));
    }
}

// ステータス遷移のプロパティ
proptest! {
    /// 遷移表にない遷移は拒否され、注文は変わらない
    #[test]
    fn test_transition_graph_is_enforced(from in any_status(), to in any_status()) {
        let mut order = order_with_lines(&[(1, 20000)], false);
        drive_to(&mut order, from);
        let before = order.clone();

        let result = OrderStateMachine::transition(
            &mut order,
            to,
            &Actor::admin("admin"),
            None,
            Utc::now(),
        );

        if from == to {
            prop_assert!(result.unwrap().status_log.is_none());
            prop_assert_eq!(order.status_logs().len(), before.status_logs().len());
        } else if OrderStateMachine::allowed_next(from).contains(&to) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(order.status(), to);
            prop_assert_eq!(order.status_logs().len(), before.status_logs().len() + 1);
        } else {
            let is_invalid = matches!(
                result,
                Err(DomainError::InvalidTransition { from: f, to: t }) if f == from && t == to
            );
            prop_assert!(is_invalid);
            prop_assert_eq!(order, before);
        }
    }

    /// 終端ステータスは遷移先を持たず、最終金額が確定している
    #[test]
    fn test_terminal_states_are_settled(status in any_status()) {
        let mut order = order_with_lines(&[(3, 7000)], false);
        drive_to(&mut order, status);

        if status.is_terminal() {
            prop_assert!(OrderStateMachine::allowed_next(status).is_empty());
            prop_assert_eq!(order.total_final(), Some(order.refundable_remaining()));
        } else {
            prop_assert!(!OrderStateMachine::allowed_next(status).is_empty());
            prop_assert_eq!(order.total_final(), None);
        }
    }
}

// 配送ゾーン・見積もりのプロパティ
proptest! {
    /// アパートゾーンは洞・半径ゾーンより常に優先される
    #[test]
    fn test_apartment_zone_takes_priority(
        apartment_id in 1i64..1000,
        dong_id in 1i64..1000,
        radius_id in 1i64..1000,
        radius_m in 100u32..5000,
    ) {
        let center = GeoPoint::new(37.5, 127.0).unwrap();
        let zones = vec![
            DeliveryZone::new(
                ZoneId(radius_id),
                ZoneMatcher::Radius { center, radius_m },
                FeeOverrides::default(),
                true,
            ).unwrap(),
            DeliveryZone::new(
                ZoneId(dong_id),
                ZoneMatcher::Dong { dong_code: "1168010100".to_string() },
                FeeOverrides::default(),
                true,
            ).unwrap(),
            DeliveryZone::new(
                ZoneId(apartment_id),
                ZoneMatcher::Apartment { apartment_name: "래미안 1단지".to_string() },
                FeeOverrides::default(),
                true,
            ).unwrap(),
        ];
        let query = ZoneQuery::new(
            Some("1168010100".to_string()),
            Some("  래미안   1단지 ".to_string()),
            Some(37.5),
            Some(127.0),
        ).unwrap();

        let selected = DeliveryZoneResolver::select(&query, &zones).unwrap();
        prop_assert_eq!(selected.id, ZoneId(apartment_id));

        let without_apartment = ZoneQuery::new(
            Some("1168010100".to_string()),
            None,
            Some(37.5),
            Some(127.0),
        ).unwrap();
        let selected = DeliveryZoneResolver::select(&without_apartment, &zones).unwrap();
        prop_assert_eq!(selected.id, ZoneId(dong_id));
    }

    /// 配送料は無料配送の閾値以上で0、合計は小計+配送料
    #[test]
    fn test_quote_fee_and_total(qty in 1u32..20, price in 1000u64..10_000) {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = kst.with_ymd_and_hms(2024, 5, 2, 11, 0, 0).unwrap().with_timezone(&Utc);
        let policy = OperatingPolicy::default();
        let cart = CartSnapshot {
            session_key: "s".to_string(),
            lines: vec![CartLine {
                product_id: ProductId(1),
                product_name: "쌀".to_string(),
                unit_label: "1kg".to_string(),
                qty,
                unit_snapshot_price: Money::won(price),
                is_weight_item: false,
            }],
        };
        let catalog: HashMap<ProductId, CatalogProduct> = [(
            ProductId(1),
            CatalogProduct {
                id: ProductId(1),
                name: "쌀".to_string(),
                unit_price: Money::won(price),
                is_active: true,
                available_qty: 100,
                max_per_order: 20,
            },
        )]
        .into_iter()
        .collect();

        let quote = CheckoutQuoteEngine::new(kst).quote(
            &cart,
            &ZoneQuery::default(),
            None,
            QuoteContext { policy: &policy, holidays: &[], zones: &[], catalog: &catalog },
            now,
        );

        let subtotal = Money::won(price).multiply(qty);
        prop_assert_eq!(quote.subtotal, subtotal);
        if subtotal >= policy.free_delivery_threshold {
            prop_assert_eq!(quote.delivery_fee, Money::zero());
        } else {
            prop_assert_eq!(quote.delivery_fee, policy.base_delivery_fee);
        }
        prop_assert_eq!(quote.total_estimated, subtotal.add(&quote.delivery_fee));
        prop_assert_eq!(quote.valid, subtotal >= policy.min_order_amount);
    }

    /// 電話番号の区切り文字は照合に影響しない
    #[test]
    fn test_phone_normalization_ignores_separators(
        middle in 1000u32..10_000,
        last in 1000u32..10_000,
    ) {
        let plain = format!("010{}{}", middle, last);
        let dashed = format!("010-{}-{}", middle, last);
        let spaced = format!("010 {} {}", middle, last);

        let normalized = CustomerContact::normalize_phone(&plain).unwrap();
        prop_assert_eq!(CustomerContact::normalize_phone(&dashed).unwrap(), normalized.clone());
        prop_assert_eq!(CustomerContact::normalize_phone(&spaced).unwrap(), normalized);
    }
}
