// 外部コラボレーター（カート・カタログ）から受け取るスナップショット

use crate::domain::model::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// カートの明細（価格はカート投入時のスナップショット）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_label: String,
    pub qty: u32,
    pub unit_snapshot_price: Money,
    pub is_weight_item: bool,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_snapshot_price.multiply(self.qty)
    }
}

/// セッションに紐づくカート
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub session_key: String,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

/// カタログ上の商品（カート明細の在庫確認と代替品の確認に使う）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub is_active: bool,
    pub available_qty: u32,
    /// 1回の注文で買える上限数
    pub max_per_order: u32,
}
