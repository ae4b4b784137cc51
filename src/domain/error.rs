use crate::domain::model::{Money, OrderItemId, OrderStatus};
use crate::domain::service::QuoteError;

/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// 入力値の形式エラー（負の数量、必須項目の欠落、未知のアクションなど）
    #[error("Validation failed: {0}")]
    Validation(String),
    /// 遷移表に存在しないステータス遷移
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    /// 処理数量が許容上限を超える（注文数、または処理済みの数量）
    #[error("Invalid quantity: requested {requested}, limit {limit}")]
    InvalidQuantity { requested: u32, limit: u32 },
    /// 代替品の指定が不正
    #[error("Invalid substitution: {0}")]
    InvalidSubstitution(String),
    /// 返金額が返金可能残高を超える
    #[error("Refund exceeds remaining balance: requested {requested}, remaining {remaining}")]
    RefundExceedsRemaining { requested: Money, remaining: Money },
    /// 注文明細が見つからない
    #[error("Order item not found: {0}")]
    ItemNotFound(OrderItemId),
    /// 営業ポリシー違反（見積もりエラーの集約）
    #[error("Policy violation: {}", format_quote_errors(.0))]
    PolicyViolation(Vec<QuoteError>),
    /// 顧客キャンセル不可（ピッキング開始後、または取消可能期限切れ）
    #[error("Order not cancelable: {0}")]
    OrderNotCancelable(String),
}

impl DomainError {
    /// APIで返す安定したエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            DomainError::InvalidSubstitution(_) => "INVALID_SUBSTITUTION",
            DomainError::RefundExceedsRemaining { .. } => "REFUND_EXCEEDS_REMAINING",
            DomainError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            DomainError::PolicyViolation(_) => "POLICY_VIOLATION",
            DomainError::OrderNotCancelable(_) => "ORDER_NOT_CANCELABLE",
        }
    }
}

fn format_quote_errors(errors: &[QuoteError]) -> String {
    errors
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
