use crate::application::service::ShortageActionResult;
use crate::domain::model::{Order, OrderItem, Refund, StatusLog};
use crate::domain::service::{CheckoutQuote, OrderStateMachine, QuoteError};
use chrono::{DateTime, Utc};
use serde::Serialize;

// 金額はすべて10進数の文字列で返す

/// 見積もり用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub valid: bool,
    pub errors: Vec<QuoteError>,
    pub subtotal: String,
    pub delivery_fee: String,
    pub total_estimated: String,
    pub min_order_amount: String,
    pub free_delivery_threshold: String,
    pub zone_id: Option<i64>,
}

impl QuoteResponse {
    pub fn from_quote(quote: &CheckoutQuote) -> Self {
        Self {
            valid: quote.valid,
            errors: quote.errors.clone(),
            subtotal: quote.subtotal.to_string(),
            delivery_fee: quote.delivery_fee.to_string(),
            total_estimated: quote.total_estimated.to_string(),
            min_order_amount: quote.min_order_amount.to_string(),
            free_delivery_threshold: quote.free_delivery_threshold.to_string(),
            zone_id: quote.zone_id.map(|z| z.0),
        }
    }
}

/// 注文前チェック用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<QuoteError>,
}

/// 注文作成用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub order_no: String,
    pub status: String,
    pub total_estimated: String,
    pub cancelable_until: DateTime<Utc>,
}

impl OrderCreatedResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id().to_string(),
            order_no: order.order_no().to_string(),
            status: order.status().to_string(),
            total_estimated: order.total_estimated().to_string(),
            cancelable_until: order.cancelable_until(),
        }
    }
}

/// 注文一覧用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub order_id: String,
    pub order_no: String,
    pub status: String,
    pub customer_name: String,
    pub total_estimated: String,
    pub total_final: Option<String>,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub ordered_at: DateTime<Utc>,
}

impl OrderSummaryResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id().to_string(),
            order_no: order.order_no().to_string(),
            status: order.status().to_string(),
            customer_name: order.customer().name().to_string(),
            total_estimated: order.total_estimated().to_string(),
            total_final: order.total_final().map(|m| m.to_string()),
            requested_slot_start: order.requested_slot_start(),
            ordered_at: order.ordered_at(),
        }
    }
}

/// 注文詳細用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub order_id: String,
    pub order_no: String,
    pub status: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: AddressResponse,
    pub zone_id: Option<i64>,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_estimated: String,
    pub delivery_fee: String,
    pub total_estimated: String,
    pub total_final: Option<String>,
    pub refunded_total: String,
    pub refundable_remaining: String,
    pub allow_substitution: bool,
    pub ordered_at: DateTime<Utc>,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub requested_slot_end: Option<DateTime<Utc>>,
    pub cancelable_until: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivery_request_note: Option<String>,
    pub refunds: Vec<RefundResponse>,
    pub status_logs: Vec<StatusLogResponse>,
    pub allowed_next: Vec<String>,
    pub version: u64,
}

/// 配送先住所用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub building: Option<String>,
    pub unit_no: Option<String>,
    pub dong_code: Option<String>,
    pub apartment_name: Option<String>,
}

/// 注文明細用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub order_item_id: String,
    pub product_id: i64,
    pub product_name: String,
    pub unit_label: String,
    pub qty_ordered: u32,
    pub qty_fulfilled: u32,
    pub unit_price_estimated: String,
    pub line_estimated: String,
    pub is_weight_item: bool,
    pub status: String,
    pub substitution_product_id: Option<i64>,
    pub substitution_product_name: Option<String>,
    pub substitution_unit_price: Option<String>,
    pub note: Option<String>,
}

/// 返金用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund_id: String,
    pub order_id: String,
    pub amount: String,
    pub reason: String,
    pub method: String,
    pub status: String,
    pub processed_at: DateTime<Utc>,
    pub processed_by: String,
}

/// ステータス履歴用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct StatusLogResponse {
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by_type: String,
    pub changed_by_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 欠品処理用のレスポンスDTO
#[derive(Debug, Serialize)]
pub struct ShortageActionResponse {
    pub order: OrderDetailResponse,
    pub refund: Option<RefundResponse>,
    pub uncharged_amount: String,
    pub auto_canceled: bool,
}

impl OrderDetailResponse {
    /// ドメインオブジェクトからOrderDetailResponseを作成
    pub fn from_order(order: &Order) -> Self {
        let address = order.address();
        let zone_query = address.zone_query();

        Self {
            order_id: order.id().to_string(),
            order_no: order.order_no().to_string(),
            status: order.status().to_string(),
            customer_name: order.customer().name().to_string(),
            customer_phone: order.customer().phone().to_string(),
            address: AddressResponse {
                address_line1: address.address_line1().to_string(),
                address_line2: address.address_line2().map(str::to_string),
                building: address.building().map(str::to_string),
                unit_no: address.unit_no().map(str::to_string),
                dong_code: zone_query.dong_code.clone(),
                apartment_name: zone_query.apartment_name.clone(),
            },
            zone_id: order.zone_id().map(|z| z.0),
            items: order.items().iter().map(OrderItemResponse::from_item).collect(),
            subtotal_estimated: order.subtotal_estimated().to_string(),
            delivery_fee: order.delivery_fee().to_string(),
            total_estimated: order.total_estimated().to_string(),
            total_final: order.total_final().map(|m| m.to_string()),
            refunded_total: order.refunded_total().to_string(),
            refundable_remaining: order.refundable_remaining().to_string(),
            allow_substitution: order.allow_substitution(),
            ordered_at: order.ordered_at(),
            requested_slot_start: order.requested_slot_start(),
            requested_slot_end: order.requested_slot_end(),
            cancelable_until: order.cancelable_until(),
            picked_at: order.picked_at(),
            delivered_at: order.delivered_at(),
            delivery_request_note: order.delivery_request_note().map(str::to_string),
            refunds: order.refunds().iter().map(RefundResponse::from_refund).collect(),
            status_logs: order
                .status_logs()
                .iter()
                .map(StatusLogResponse::from_log)
                .collect(),
            allowed_next: OrderStateMachine::allowed_next(order.status())
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
            version: order.version(),
        }
    }
}

impl OrderItemResponse {
    pub fn from_item(item: &OrderItem) -> Self {
        let substitution = item.substitution();
        Self {
            order_item_id: item.id().to_string(),
            product_id: item.product_id().0,
            product_name: item.product_name().to_string(),
            unit_label: item.unit_label().to_string(),
            qty_ordered: item.qty_ordered(),
            qty_fulfilled: item.qty_fulfilled(),
            unit_price_estimated: item.unit_price_estimated().to_string(),
            line_estimated: item.line_estimated().to_string(),
            is_weight_item: item.is_weight_item(),
            status: item.status().to_string(),
            substitution_product_id: substitution.map(|s| s.product_id.0),
            substitution_product_name: substitution.map(|s| s.product_name.clone()),
            substitution_unit_price: substitution.map(|s| s.unit_price.to_string()),
            note: item.note().map(str::to_string),
        }
    }
}

impl RefundResponse {
    pub fn from_refund(refund: &Refund) -> Self {
        Self {
            refund_id: refund.id.to_string(),
            order_id: refund.order_id.to_string(),
            amount: refund.amount.to_string(),
            reason: refund.reason.clone(),
            method: refund.method.as_str().to_string(),
            status: refund.status.as_str().to_string(),
            processed_at: refund.processed_at,
            processed_by: refund.processed_by.clone(),
        }
    }
}

impl StatusLogResponse {
    pub fn from_log(log: &StatusLog) -> Self {
        Self {
            from_status: log.from_status.map(|s| s.to_string()),
            to_status: log.to_status.to_string(),
            changed_by_type: log.changed_by.actor_type().as_str().to_string(),
            changed_by_id: log.changed_by.id().to_string(),
            reason: log.reason.clone(),
            created_at: log.created_at,
        }
    }
}

impl ShortageActionResponse {
    pub fn from_result(result: &ShortageActionResult) -> Self {
        Self {
            order: OrderDetailResponse::from_order(&result.order),
            refund: result.refund.as_ref().map(RefundResponse::from_refund),
            uncharged_amount: result.uncharged_amount.to_string(),
            auto_canceled: result.auto_canceled,
        }
    }
}
