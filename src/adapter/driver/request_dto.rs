use crate::application::service::PlaceOrderCommand;
use crate::domain::error::DomainError;
use crate::domain::model::{OrderItemId, ProductId, ZoneQuery};
use crate::domain::service::{FulfillmentDecision, ShortageAction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 見積もり用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub session_key: String,
    #[serde(default)]
    pub dong_code: Option<String>,
    #[serde(default)]
    pub apartment_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub requested_slot_start: Option<DateTime<Utc>>,
}

impl QuoteRequest {
    pub fn zone_query(&self) -> Result<ZoneQuery, DomainError> {
        ZoneQuery::new(
            self.dong_code.clone(),
            self.apartment_name.clone(),
            self.latitude,
            self.longitude,
        )
    }
}

/// 注文作成用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub session_key: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub unit_no: Option<String>,
    #[serde(default)]
    pub dong_code: Option<String>,
    #[serde(default)]
    pub apartment_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub requested_slot_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allow_substitution: bool,
    #[serde(default)]
    pub delivery_request_note: Option<String>,
}

impl From<CreateOrderRequest> for PlaceOrderCommand {
    fn from(request: CreateOrderRequest) -> Self {
        Self {
            session_key: request.session_key,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            address_line1: request.address_line1,
            address_line2: request.address_line2,
            building: request.building,
            unit_no: request.unit_no,
            dong_code: request.dong_code,
            apartment_name: request.apartment_name,
            latitude: request.latitude,
            longitude: request.longitude,
            requested_slot_start: request.requested_slot_start,
            allow_substitution: request.allow_substitution,
            delivery_request_note: request.delivery_request_note,
        }
    }
}

/// 注文照会用のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct LookupQueryParams {
    pub order_no: String,
    pub phone: String,
}

/// 顧客キャンセル用のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct CancelRequestParams {
    pub phone: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// 注文一覧取得用のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct OrdersQueryParams {
    pub status: Option<String>,
}

/// ステータス変更用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// 欠品処理用のリクエストDTO
/// 数量は負の値を検出できるよう符号付きで受け取る
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortageActionRequest {
    pub order_item_id: Uuid,
    pub action: String,
    #[serde(default)]
    pub fulfilled_qty: Option<i64>,
    #[serde(default)]
    pub substitution_product_id: Option<i64>,
    #[serde(default)]
    pub substitution_qty: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ShortageActionRequest {
    pub fn into_decision(self) -> Result<FulfillmentDecision, DomainError> {
        Ok(FulfillmentDecision {
            order_item_id: OrderItemId::from_uuid(self.order_item_id),
            action: ShortageAction::from_string(&self.action)?,
            fulfilled_qty: self.fulfilled_qty.map(quantity).transpose()?,
            substitution_product_id: self.substitution_product_id.map(ProductId),
            substitution_qty: self.substitution_qty.map(quantity).transpose()?,
            reason: self.reason.filter(|r| !r.trim().is_empty()),
        })
    }
}

fn quantity(value: i64) -> Result<u32, DomainError> {
    u32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("数量は0以上の整数である必要があります: {}", value)))
}

/// 返金作成用のリクエストDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRefundRequest {
    pub amount: Decimal,
    pub reason: String,
    #[serde(default)]
    pub method: Option<String>,
}
