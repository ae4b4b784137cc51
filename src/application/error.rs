use crate::domain::error::DomainError;
use crate::domain::port::RepositoryError;

/// アプリケーション層のエラー型
/// ドメインエラー、リポジトリエラー、競合をラップする
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// ドメインエラー（ビジネスルール違反）
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
    /// リポジトリエラー（永続化の失敗）
    #[error("Repository error: {0}")]
    RepositoryError(RepositoryError),
    /// 同じ注文への同時更新に負けた（再取得して再試行できる）
    #[error("Conflict: {0}")]
    Conflict(String),
    /// エンティティが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApplicationError {
    /// APIで返す安定したエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::DomainError(err) => err.code(),
            ApplicationError::RepositoryError(_) => "STORAGE_ERROR",
            ApplicationError::Conflict(_) => "CONFLICT",
            ApplicationError::NotFound(_) => "NOT_FOUND",
        }
    }

    /// 呼び出し側が自動で再試行してよいか
    pub fn is_retriable(&self) -> bool {
        matches!(self, ApplicationError::Conflict(_))
    }
}

// 楽観ロックの競合だけは Conflict として扱う
impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { .. } => ApplicationError::Conflict(err.to_string()),
            other => ApplicationError::RepositoryError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OrderId;

    #[test]
    fn test_version_conflict_maps_to_conflict() {
        let err: ApplicationError = RepositoryError::Conflict {
            order_id: OrderId::new(),
            expected: 3,
        }
        .into();
        assert_eq!(err.code(), "CONFLICT");
        assert!(err.is_retriable());
    }

    #[test]
    fn test_domain_code_is_passed_through() {
        let err: ApplicationError = DomainError::Validation("x".to_string()).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(!err.is_retriable());
    }
}
