use crate::domain::model::{
    is_closed_on, CartLine, CartSnapshot, CatalogProduct, DeliveryZone, Holiday, Money,
    OperatingPolicy, ProductId, ZoneId, ZoneQuery,
};
use crate::domain::service::DeliveryZoneResolver;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fmt;

/// 見積もりの検証エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteError {
    EmptyCart,
    StoreClosed,
    SlotUnavailable,
    CutoffPassed,
    HolidayClosed,
    /// 商品が見つからない、または販売停止中
    OutOfStock,
    MaxQtyExceeded,
    InsufficientStock,
    MinOrderNotMet,
}

impl QuoteError {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteError::EmptyCart => "EMPTY_CART",
            QuoteError::StoreClosed => "STORE_CLOSED",
            QuoteError::SlotUnavailable => "SLOT_UNAVAILABLE",
            QuoteError::CutoffPassed => "CUTOFF_PASSED",
            QuoteError::HolidayClosed => "HOLIDAY_CLOSED",
            QuoteError::OutOfStock => "OUT_OF_STOCK",
            QuoteError::MaxQtyExceeded => "MAX_QTY_EXCEEDED",
            QuoteError::InsufficientStock => "INSUFFICIENT_STOCK",
            QuoteError::MinOrderNotMet => "MIN_ORDER_NOT_MET",
        }
    }
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 見積もり結果（拘束力はない）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutQuote {
    pub valid: bool,
    pub errors: Vec<QuoteError>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_estimated: Money,
    pub min_order_amount: Money,
    pub free_delivery_threshold: Money,
    pub zone_id: Option<ZoneId>,
}

/// 見積もりの入力
#[derive(Debug, Clone, Copy)]
pub struct QuoteContext<'a> {
    pub policy: &'a OperatingPolicy,
    pub holidays: &'a [Holiday],
    pub zones: &'a [DeliveryZone],
    /// カート明細の商品（見つからない商品は含まれない）
    pub catalog: &'a HashMap<ProductId, CatalogProduct>,
}

/// 見積もりエンジン
///
/// 営業時間・締め時刻・休業日・明細の在庫・最低注文金額を検証し、
/// 違反はすべて `errors` に集める（途中で打ち切らない）。
/// 時刻の判定は店舗の現地時刻で行う。
#[derive(Debug, Clone, Copy)]
pub struct CheckoutQuoteEngine {
    store_offset: FixedOffset,
}

impl CheckoutQuoteEngine {
    pub fn new(store_offset: FixedOffset) -> Self {
        Self { store_offset }
    }

    pub fn store_offset(&self) -> FixedOffset {
        self.store_offset
    }

    /// 見積もりを計算する
    ///
    /// # Arguments
    /// * `cart` - カートのスナップショット
    /// * `address` - 配送先のゾーン判定キー
    /// * `requested_slot_start` - 希望配達時刻（None は当日の即時配達）
    /// * `context` - 営業ポリシー・休業日・配送ゾーン・カタログ
    /// * `now` - 現在時刻
    pub fn quote(
        &self,
        cart: &CartSnapshot,
        address: &ZoneQuery,
        requested_slot_start: Option<DateTime<Utc>>,
        context: QuoteContext<'_>,
        now: DateTime<Utc>,
    ) -> CheckoutQuote {
        let policy = context.policy;
        let mut errors = Vec::new();

        if cart.is_empty() {
            errors.push(QuoteError::EmptyCart);
        }

        let local_now = now.with_timezone(&self.store_offset);
        let today = local_now.date_naive();
        let cutoff_passed = local_now.time() >= policy.same_day_cutoff_time;

        match requested_slot_start {
            None => {
                if !policy.is_open_at(local_now.time()) {
                    errors.push(QuoteError::StoreClosed);
                }
                if cutoff_passed {
                    errors.push(QuoteError::CutoffPassed);
                }
                if is_closed_on(context.holidays, today) {
                    errors.push(QuoteError::HolidayClosed);
                }
            }
            Some(slot) => {
                let local_slot = slot.with_timezone(&self.store_offset);
                let slot_date = local_slot.date_naive();
                let days_ahead = (slot_date - today).num_days();

                // 過去・予約可能日数超過・営業時間外はまとめて1件
                if slot <= now
                    || days_ahead > i64::from(policy.allow_reservation_days)
                    || !policy.is_open_at(local_slot.time())
                {
                    errors.push(QuoteError::SlotUnavailable);
                }
                if slot_date == today && cutoff_passed {
                    errors.push(QuoteError::CutoffPassed);
                }
                if is_closed_on(context.holidays, slot_date) {
                    errors.push(QuoteError::HolidayClosed);
                }
            }
        }

        // 在庫を確認できた明細だけを小計に含める
        let mut subtotal = Money::zero();
        for line in &cart.lines {
            match Self::check_line(line, context.catalog) {
                Ok(()) => subtotal = subtotal.add(&line.line_total()),
                Err(error) if !errors.contains(&error) => errors.push(error),
                Err(_) => {}
            }
        }

        let zone = DeliveryZoneResolver::resolve(address, context.zones, policy);
        if subtotal < zone.min_order_amount {
            errors.push(QuoteError::MinOrderNotMet);
        }

        let delivery_fee = if subtotal >= zone.free_delivery_threshold {
            Money::zero()
        } else {
            zone.base_fee
        };

        CheckoutQuote {
            valid: errors.is_empty(),
            errors,
            subtotal,
            delivery_fee,
            total_estimated: subtotal.add(&delivery_fee),
            min_order_amount: zone.min_order_amount,
            free_delivery_threshold: zone.free_delivery_threshold,
            zone_id: zone.zone_id,
        }
    }

    /// カート明細をカタログと照合する
    fn check_line(
        line: &CartLine,
        catalog: &HashMap<ProductId, CatalogProduct>,
    ) -> Result<(), QuoteError> {
        let product = catalog
            .get(&line.product_id)
            .filter(|p| p.is_active)
            .ok_or(QuoteError::OutOfStock)?;
        if line.qty > product.max_per_order {
            return Err(QuoteError::MaxQtyExceeded);
        }
        if product.available_qty < line.qty {
            return Err(QuoteError::InsufficientStock);
        }
        Ok(())
    }
}
