// MySqlRow から列を取り出す共通処理
// 読み込めない列は CorruptedRow として FetchFailed に変換する

use crate::adapter::database_error::DatabaseError;
use crate::domain::model::Money;
use crate::domain::port::RepositoryError;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Row};

pub(super) fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(name).map_err(|e| {
        RepositoryError::from(DatabaseError::CorruptedRow(format!(
            "列 {} の読み込みに失敗しました: {}",
            name, e
        )))
    })
}

pub(super) fn money(row: &MySqlRow, name: &str) -> Result<Money, RepositoryError> {
    Money::new(column::<Decimal>(row, name)?)
        .map_err(|e| RepositoryError::FetchFailed(format!("{} が不正です: {}", name, e)))
}

pub(super) fn optional_money(row: &MySqlRow, name: &str) -> Result<Option<Money>, RepositoryError> {
    column::<Option<Decimal>>(row, name)?
        .map(Money::new)
        .transpose()
        .map_err(|e| RepositoryError::FetchFailed(format!("{} が不正です: {}", name, e)))
}
