use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};
use tracing::info;

/// マイグレーションファイル（実行順）
const MIGRATIONS: [(&str, &str); 10] = [
    (
        "001_create_orders_table",
        include_str!("../../migrations/001_create_orders_table.sql"),
    ),
    (
        "002_create_order_items_table",
        include_str!("../../migrations/002_create_order_items_table.sql"),
    ),
    (
        "003_create_order_status_logs_table",
        include_str!("../../migrations/003_create_order_status_logs_table.sql"),
    ),
    (
        "004_create_refunds_table",
        include_str!("../../migrations/004_create_refunds_table.sql"),
    ),
    (
        "005_create_store_policies_table",
        include_str!("../../migrations/005_create_store_policies_table.sql"),
    ),
    (
        "006_create_holidays_table",
        include_str!("../../migrations/006_create_holidays_table.sql"),
    ),
    (
        "007_create_delivery_zones_table",
        include_str!("../../migrations/007_create_delivery_zones_table.sql"),
    ),
    (
        "008_create_products_table",
        include_str!("../../migrations/008_create_products_table.sql"),
    ),
    (
        "009_create_carts_table",
        include_str!("../../migrations/009_create_carts_table.sql"),
    ),
    (
        "010_create_cart_items_table",
        include_str!("../../migrations/010_create_cart_items_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, migration_sql) in MIGRATIONS {
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{}: {}", name, e)))?;
            info!(migration = name, "マイグレーションを適用しました");
        }
        Ok(())
    }
}
