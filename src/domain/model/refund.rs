use crate::domain::error::DomainError;
use crate::domain::model::{Money, OrderId, RefundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 返金方法
/// 着払い（COD）金額の調整のみをサポートする
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundMethod {
    CodAdjustment,
}

impl RefundMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundMethod::CodAdjustment => "COD_ADJUSTMENT",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "COD_ADJUSTMENT" => Ok(RefundMethod::CodAdjustment),
            _ => Err(DomainError::Validation(format!(
                "サポートされていない返金方法: {}",
                s
            ))),
        }
    }
}

/// 返金の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Approved,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Approved => "APPROVED",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "APPROVED" => Ok(RefundStatus::Approved),
            _ => Err(DomainError::Validation(format!("無効な返金ステータス: {}", s))),
        }
    }
}

/// 返金記録（追記のみ、編集・取消はしない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub order_id: OrderId,
    pub amount: Money,
    pub reason: String,
    pub method: RefundMethod,
    pub status: RefundStatus,
    pub processed_at: DateTime<Utc>,
    pub processed_by: String,
}

/// 返金台帳
///
/// 注文ごとの返金を追記専用で保持し、累計返金額が注文の見積合計を
/// 超えないことを保証する。欠品処理・全体キャンセル・手動返金の
/// いずれもこの `record` を通る。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefundLedger {
    entries: Vec<Refund>,
}

impl RefundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 永続化された返金記録から台帳を再構築
    pub fn from_entries(entries: Vec<Refund>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Refund] {
        &self.entries
    }

    /// 累計返金額
    pub fn refunded_total(&self) -> Money {
        self.entries.iter().map(|r| r.amount).sum()
    }

    /// 返金可能残高 = 見積合計 - 累計返金額
    pub fn refundable_remaining(&self, total_estimated: Money) -> Money {
        total_estimated.saturating_sub(&self.refunded_total())
    }

    /// 返金を記録できるか検証する（台帳は変更しない）
    pub fn check(&self, total_estimated: Money, amount: Money) -> Result<(), DomainError> {
        if amount.is_zero() {
            return Err(DomainError::Validation(
                "返金額は0より大きい必要があります".to_string(),
            ));
        }
        let remaining = self.refundable_remaining(total_estimated);
        if amount > remaining {
            return Err(DomainError::RefundExceedsRemaining {
                requested: amount,
                remaining,
            });
        }
        Ok(())
    }

    /// 返金を追記する
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        order_id: OrderId,
        total_estimated: Money,
        amount: Money,
        reason: String,
        method: RefundMethod,
        processed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Refund, DomainError> {
        self.check(total_estimated, amount)?;
        if reason.trim().is_empty() {
            return Err(DomainError::Validation("返金理由は空にできません".to_string()));
        }

        let refund = Refund {
            id: RefundId::new(),
            order_id,
            amount,
            reason,
            method,
            status: RefundStatus::Approved,
            processed_at: now,
            processed_by: processed_by.to_string(),
        };
        self.entries.push(refund.clone());
        Ok(refund)
    }
}
