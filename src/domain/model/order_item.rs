use crate::domain::error::DomainError;
use crate::domain::model::{Money, OrderItemId, ProductId};
use serde::{Deserialize, Serialize};

use std::fmt;

/// 注文明細の処理状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// 注文どおり
    Confirmed,
    /// 代替品に置き換え済み
    Substituted,
    /// 一部キャンセル
    PartialCanceled,
    /// 欠品
    OutOfStock,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Confirmed => "CONFIRMED",
            ItemStatus::Substituted => "SUBSTITUTED",
            ItemStatus::PartialCanceled => "PARTIAL_CANCELED",
            ItemStatus::OutOfStock => "OUT_OF_STOCK",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "CONFIRMED" => Ok(ItemStatus::Confirmed),
            "SUBSTITUTED" => Ok(ItemStatus::Substituted),
            "PARTIAL_CANCELED" => Ok(ItemStatus::PartialCanceled),
            "OUT_OF_STOCK" => Ok(ItemStatus::OutOfStock),
            _ => Err(DomainError::Validation(format!("無効な明細ステータス: {}", s))),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 明細に適用された代替品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
}

/// 注文明細
/// qty_fulfilled <= qty_ordered を常に保つ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    id: OrderItemId,
    product_id: ProductId,
    product_name: String,
    unit_label: String,
    qty_ordered: u32,
    qty_fulfilled: u32,
    unit_price_estimated: Money,
    line_estimated: Money,
    is_weight_item: bool,
    status: ItemStatus,
    substitution: Option<Substitution>,
    note: Option<String>,
}

impl OrderItem {
    /// カートの明細から新しい注文明細を作成
    /// 作成時は全量を処理予定とする
    pub fn new(
        product_id: ProductId,
        product_name: String,
        unit_label: String,
        qty_ordered: u32,
        unit_price_estimated: Money,
        is_weight_item: bool,
    ) -> Result<Self, DomainError> {
        if qty_ordered == 0 {
            return Err(DomainError::Validation(
                "注文数量は1以上である必要があります".to_string(),
            ));
        }
        Ok(Self {
            id: OrderItemId::new(),
            product_id,
            product_name,
            unit_label,
            qty_ordered,
            qty_fulfilled: qty_ordered,
            unit_price_estimated,
            line_estimated: unit_price_estimated.multiply(qty_ordered),
            is_weight_item,
            status: ItemStatus::Confirmed,
            substitution: None,
            note: None,
        })
    }

    /// 永続化されたデータから明細を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: OrderItemId,
        product_id: ProductId,
        product_name: String,
        unit_label: String,
        qty_ordered: u32,
        qty_fulfilled: u32,
        unit_price_estimated: Money,
        line_estimated: Money,
        is_weight_item: bool,
        status: ItemStatus,
        substitution: Option<Substitution>,
        note: Option<String>,
    ) -> Result<Self, DomainError> {
        if qty_fulfilled > qty_ordered {
            return Err(DomainError::InvalidQuantity {
                requested: qty_fulfilled,
                limit: qty_ordered,
            });
        }
        Ok(Self {
            id,
            product_id,
            product_name,
            unit_label,
            qty_ordered,
            qty_fulfilled,
            unit_price_estimated,
            line_estimated,
            is_weight_item,
            status,
            substitution,
            note,
        })
    }

    pub fn id(&self) -> OrderItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn unit_label(&self) -> &str {
        &self.unit_label
    }

    pub fn qty_ordered(&self) -> u32 {
        self.qty_ordered
    }

    pub fn qty_fulfilled(&self) -> u32 {
        self.qty_fulfilled
    }

    pub fn unit_price_estimated(&self) -> Money {
        self.unit_price_estimated
    }

    /// 現在の明細金額（請求対象額）
    pub fn line_estimated(&self) -> Money {
        self.line_estimated
    }

    /// 重量商品は見積額で精算し、実重量での確定はシステム外で行う
    pub fn is_weight_item(&self) -> bool {
        self.is_weight_item
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn substitution(&self) -> Option<&Substitution> {
        self.substitution.as_ref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// 現在届ける商品の単価（代替済みなら代替品の単価）
    pub fn effective_unit_price(&self) -> Money {
        self.substitution
            .as_ref()
            .map(|s| s.unit_price)
            .unwrap_or(self.unit_price_estimated)
    }

    /// 実際に届ける商品
    pub fn effective_product_id(&self) -> ProductId {
        self.substitution
            .as_ref()
            .map(|s| s.product_id)
            .unwrap_or(self.product_id)
    }

    /// 処理結果を明細に反映する
    /// 数量と金額の整合性はFulfillmentResolverが事前に検証済みであること
    pub(crate) fn apply_resolution(
        &mut self,
        qty_fulfilled: u32,
        line_estimated: Money,
        status: ItemStatus,
        substitution: Option<Substitution>,
        note: Option<String>,
    ) {
        debug_assert!(qty_fulfilled <= self.qty_ordered);
        self.qty_fulfilled = qty_fulfilled;
        self.line_estimated = line_estimated;
        self.status = status;
        self.substitution = substitution;
        if note.is_some() {
            self.note = note;
        }
    }
}
