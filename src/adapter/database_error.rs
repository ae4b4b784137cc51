use crate::domain::port::RepositoryError;

/// データベースエラー型
/// sqlx の操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatabaseError {
    /// データベース接続エラー
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    /// SQLクエリエラー
    #[error("Database query error: {0}")]
    QueryError(String),
    /// マイグレーションエラー
    #[error("Migration error: {0}")]
    MigrationError(String),
    /// 保存済みの行がドメインの値に変換できない
    #[error("Corrupted row: {0}")]
    CorruptedRow(String),
}

/// DatabaseErrorからRepositoryErrorへの変換
impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionError(msg) => RepositoryError::ConnectionFailed(msg),
            DatabaseError::QueryError(msg) | DatabaseError::MigrationError(msg) => {
                RepositoryError::OperationFailed(msg)
            }
            DatabaseError::CorruptedRow(msg) => RepositoryError::FetchFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_maps_to_connection_failed() {
        let err: RepositoryError = DatabaseError::ConnectionError("refused".to_string()).into();
        assert_eq!(err, RepositoryError::ConnectionFailed("refused".to_string()));
    }

    #[test]
    fn test_corrupted_row_maps_to_fetch_failed() {
        let err: RepositoryError = DatabaseError::CorruptedRow("status".to_string()).into();
        assert_eq!(err, RepositoryError::FetchFailed("status".to_string()));
    }
}
