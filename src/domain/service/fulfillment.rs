use crate::domain::error::DomainError;
use crate::domain::event::{DomainEvent, ShortageResolved};
use crate::domain::model::{
    Actor, CatalogProduct, ItemStatus, Money, Order, OrderItemId, OrderStatus, ProductId, Refund,
    RefundMethod, Substitution,
};
use crate::domain::service::OrderStateMachine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::fmt;

/// 欠品処理で RECEIVED の注文をピッキングに進めるときの理由
pub const SHORTAGE_PICKING_REASON: &str = "SHORTAGE_ACTION";
/// 返金累計が閾値を超えたときの自動キャンセル理由
pub const AUTO_CANCEL_REASON: &str = "REFUND_THRESHOLD_EXCEEDED";

/// スタッフが明細に対して行う欠品処理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortageAction {
    /// 代替品に置き換える
    Substitute,
    /// 一部だけ届ける
    PartialCancel,
    /// 欠品として全量取り消す
    OutOfStock,
}

impl ShortageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortageAction::Substitute => "SUBSTITUTE",
            ShortageAction::PartialCancel => "PARTIAL_CANCEL",
            ShortageAction::OutOfStock => "OUT_OF_STOCK",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "SUBSTITUTE" => Ok(ShortageAction::Substitute),
            "PARTIAL_CANCEL" => Ok(ShortageAction::PartialCancel),
            "OUT_OF_STOCK" => Ok(ShortageAction::OutOfStock),
            _ => Err(DomainError::Validation(format!("未知の欠品処理: {}", s))),
        }
    }

    /// 自動返金の既定の理由
    pub fn refund_reason(&self) -> &'static str {
        match self {
            ShortageAction::Substitute => "substitution price difference",
            ShortageAction::PartialCancel => "partial cancel",
            ShortageAction::OutOfStock => "out of stock",
        }
    }
}

impl fmt::Display for ShortageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 欠品処理の指示
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentDecision {
    pub order_item_id: OrderItemId,
    pub action: ShortageAction,
    pub fulfilled_qty: Option<u32>,
    pub substitution_product_id: Option<ProductId>,
    pub substitution_qty: Option<u32>,
    /// スタッフのメモ（明細のノートとして残す）
    pub reason: Option<String>,
}

/// 欠品処理の結果
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentOutcome {
    /// 明細金額が減った場合の返金
    pub refund: Option<Refund>,
    /// 代替品が高く、請求しなかった差額
    pub uncharged_amount: Money,
    /// 返金累計の閾値で自動キャンセルされたか
    pub auto_canceled: bool,
}

/// 自動キャンセルの閾値
/// 累計返金額が見積合計の `ratio` 以上になったらキャンセルする
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoCancelPolicy {
    ratio: Decimal,
}

impl AutoCancelPolicy {
    /// 比率は (0, 1] の範囲
    pub fn new(ratio: Decimal) -> Result<Self, DomainError> {
        if ratio <= Decimal::ZERO || ratio > Decimal::ONE {
            return Err(DomainError::Validation(format!(
                "自動キャンセルの比率は0より大きく1以下である必要があります: {}",
                ratio
            )));
        }
        Ok(Self { ratio })
    }

    pub fn ratio(&self) -> Decimal {
        self.ratio
    }

    fn is_exceeded(&self, order: &Order) -> bool {
        order.refunded_total() >= order.total_estimated().scale(self.ratio)
    }
}

/// 明細の更新内容（検証済み）
struct Resolution {
    qty_fulfilled: u32,
    computed_line: Money,
    status: ItemStatus,
    substitution: Option<Substitution>,
}

/// 欠品処理リゾルバー
///
/// 1回の処理で1つの明細を更新し、明細金額が減った分を返金台帳に記録する。
/// 明細金額は増えることがなく（着払いのため追加請求はしない）、
/// 増えるはずだった差額は `uncharged_amount` として報告するだけにとどめる。
/// すべての検証は注文を変更する前に行う。
#[derive(Debug, Clone, Default)]
pub struct FulfillmentResolver {
    auto_cancel: Option<AutoCancelPolicy>,
}

impl FulfillmentResolver {
    pub fn new(auto_cancel: Option<AutoCancelPolicy>) -> Self {
        Self { auto_cancel }
    }

    /// 欠品処理を適用する
    ///
    /// # Arguments
    /// * `order` - 対象の注文
    /// * `decision` - 欠品処理の指示
    /// * `substitute` - 代替品（SUBSTITUTE の場合にカタログから取得したもの）
    /// * `actor` - 操作者
    /// * `now` - 処理日時
    ///
    /// # Returns
    /// * `Ok(FulfillmentOutcome)` - 適用成功
    /// * `Err(DomainError)` - 検証失敗（注文は変更されない）
    pub fn apply(
        &self,
        order: &mut Order,
        decision: &FulfillmentDecision,
        substitute: Option<&CatalogProduct>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome, DomainError> {
        if order.status().is_terminal() {
            return Err(DomainError::Validation(format!(
                "{} の注文には欠品処理を適用できません",
                order.status()
            )));
        }

        let item = order.item(decision.order_item_id)?;
        let resolution = Self::resolve(order, decision, substitute)?;

        let current_line = item.line_estimated();
        let charged_line = std::cmp::min(resolution.computed_line, current_line);
        let refund_amount = current_line.saturating_sub(&charged_line);
        let uncharged_amount = resolution.computed_line.saturating_sub(&charged_line);

        if !refund_amount.is_zero() {
            order.check_refund(refund_amount)?;
        }

        // ここから先は検証済み
        if order.status() == OrderStatus::Received {
            OrderStateMachine::transition(
                order,
                OrderStatus::Picking,
                actor,
                Some(SHORTAGE_PICKING_REASON.to_string()),
                now,
            )?;
        }

        let qty_fulfilled = resolution.qty_fulfilled;
        order.item_mut(decision.order_item_id)?.apply_resolution(
            qty_fulfilled,
            charged_line,
            resolution.status,
            resolution.substitution,
            decision.reason.clone().filter(|r| !r.trim().is_empty()),
        );
        order.recompute_subtotal();

        let refund = if refund_amount.is_zero() {
            None
        } else {
            Some(order.record_refund(
                refund_amount,
                decision.action.refund_reason().to_string(),
                RefundMethod::CodAdjustment,
                actor.id(),
                now,
            )?)
        };

        order.push_event(DomainEvent::ShortageResolved(ShortageResolved {
            order_id: order.id(),
            order_item_id: decision.order_item_id,
            action: decision.action,
            qty_fulfilled,
            refund_amount,
            uncharged_amount,
            occurred_at: now,
        }));

        let auto_canceled = match self.auto_cancel {
            Some(policy)
                if policy.is_exceeded(order)
                    && OrderStateMachine::is_transition_allowed(
                        order.status(),
                        OrderStatus::Canceled,
                    ) =>
            {
                OrderStateMachine::transition(
                    order,
                    OrderStatus::Canceled,
                    &Actor::system(),
                    Some(AUTO_CANCEL_REASON.to_string()),
                    now,
                )?;
                true
            }
            _ => false,
        };

        Ok(FulfillmentOutcome {
            refund,
            uncharged_amount,
            auto_canceled,
        })
    }

    /// 指示を検証し、明細の更新内容を計算する
    fn resolve(
        order: &Order,
        decision: &FulfillmentDecision,
        substitute: Option<&CatalogProduct>,
    ) -> Result<Resolution, DomainError> {
        let item = order.item(decision.order_item_id)?;
        let qty_ordered = item.qty_ordered();

        match decision.action {
            ShortageAction::OutOfStock => Ok(Resolution {
                qty_fulfilled: 0,
                computed_line: Money::zero(),
                status: ItemStatus::OutOfStock,
                substitution: None,
            }),
            ShortageAction::PartialCancel => {
                let fulfilled = decision.fulfilled_qty.ok_or_else(|| {
                    DomainError::Validation("PARTIAL_CANCEL には fulfilled_qty が必要です".to_string())
                })?;
                // 全量は届けられず、処理済みの数量より増やすこともできない
                let limit = std::cmp::min(qty_ordered.saturating_sub(1), item.qty_fulfilled());
                if fulfilled > limit {
                    return Err(DomainError::InvalidQuantity {
                        requested: fulfilled,
                        limit,
                    });
                }
                Ok(Resolution {
                    qty_fulfilled: fulfilled,
                    computed_line: item.effective_unit_price().multiply(fulfilled),
                    status: ItemStatus::PartialCanceled,
                    substitution: item.substitution().cloned(),
                })
            }
            ShortageAction::Substitute => {
                if !order.allow_substitution() {
                    return Err(DomainError::InvalidSubstitution(
                        "顧客が代替品を許可していません".to_string(),
                    ));
                }
                let (product_id, qty) =
                    match (decision.substitution_product_id, decision.substitution_qty) {
                        (Some(product_id), Some(qty)) => (product_id, qty),
                        _ => {
                            return Err(DomainError::InvalidSubstitution(
                                "substitution_product_id と substitution_qty が必要です"
                                    .to_string(),
                            ))
                        }
                    };
                if qty == 0 {
                    return Err(DomainError::Validation(
                        "代替数量は1以上である必要があります".to_string(),
                    ));
                }
                if qty > item.qty_fulfilled() {
                    return Err(DomainError::InvalidQuantity {
                        requested: qty,
                        limit: item.qty_fulfilled(),
                    });
                }

                let product = substitute
                    .filter(|p| p.id == product_id)
                    .ok_or_else(|| {
                        DomainError::InvalidSubstitution(format!(
                            "代替商品 {} が見つかりません",
                            product_id
                        ))
                    })?;
                if !product.is_active {
                    return Err(DomainError::InvalidSubstitution(format!(
                        "代替商品 {} は販売されていません",
                        product_id
                    )));
                }
                if product.available_qty < qty {
                    return Err(DomainError::InvalidSubstitution(format!(
                        "代替商品 {} の在庫が不足しています",
                        product_id
                    )));
                }

                Ok(Resolution {
                    qty_fulfilled: qty,
                    computed_line: product.unit_price.multiply(qty),
                    status: ItemStatus::Substituted,
                    substitution: Some(Substitution {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        unit_price: product.unit_price,
                    }),
                })
            }
        }
    }
}
