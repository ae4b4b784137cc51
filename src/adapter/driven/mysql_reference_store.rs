// 注文の外側で管理される参照データ（カート・カタログ・営業設定）の読み込み
// 書き込みはカート削除のみ

use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{
    CartLine, CartSnapshot, CatalogProduct, DeliveryZone, FeeOverrides, GeoPoint, Holiday,
    OperatingPolicy, ProductId, ZoneId, ZoneMatcher,
};
use crate::domain::port::{CartStore, CatalogStore, PolicyStore, RepositoryError};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool};

use super::row::{column, money, optional_money};

/// MySQLのカートストア
pub struct MySqlCartStore {
    pool: Pool<MySql>,
}

impl MySqlCartStore {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for MySqlCartStore {
    async fn load(&self, session_key: &str) -> Result<CartSnapshot, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                ci.product_id, p.name, p.unit_label, ci.qty, ci.unit_price_snapshot,
                p.is_weight_item
            FROM carts c
            JOIN cart_items ci ON ci.cart_id = c.id
            JOIN products p ON p.id = ci.product_id
            WHERE c.session_key = ?
            ORDER BY ci.id
            "#,
        )
        .bind(session_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("カートの取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            lines.push(CartLine {
                product_id: ProductId(column(row, "product_id")?),
                product_name: column(row, "name")?,
                unit_label: column(row, "unit_label")?,
                qty: column(row, "qty")?,
                unit_snapshot_price: money(row, "unit_price_snapshot")?,
                is_weight_item: column(row, "is_weight_item")?,
            });
        }

        Ok(CartSnapshot {
            session_key: session_key.to_string(),
            lines,
        })
    }

    async fn clear(&self, session_key: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE ci FROM cart_items ci
            JOIN carts c ON ci.cart_id = c.id
            WHERE c.session_key = ?
            "#,
        )
        .bind(session_key)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("カートの削除に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}

/// MySQLのカタログストア
pub struct MySqlCatalogStore {
    pool: Pool<MySql>,
}

impl MySqlCatalogStore {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for MySqlCatalogStore {
    async fn find_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, is_active, available_qty, max_per_order
            FROM products
            WHERE id = ?
            "#,
        )
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("商品の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        row.map(|row| {
            Ok(CatalogProduct {
                id: ProductId(column(&row, "id")?),
                name: column(&row, "name")?,
                unit_price: money(&row, "price")?,
                is_active: column(&row, "is_active")?,
                available_qty: column(&row, "available_qty")?,
                max_per_order: column(&row, "max_per_order")?,
            })
        })
        .transpose()
    }
}

/// MySQLの営業設定ストア
pub struct MySqlPolicyStore {
    pool: Pool<MySql>,
}

impl MySqlPolicyStore {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for MySqlPolicyStore {
    async fn operating_policy(&self) -> Result<OperatingPolicy, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                open_time, close_time, same_day_cutoff_time, min_order_amount,
                base_delivery_fee, free_delivery_threshold, allow_reservation_days
            FROM store_policies
            ORDER BY id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("営業ポリシーの取得に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;

        // 未設定なら既定値
        let Some(row) = row else {
            return Ok(OperatingPolicy::default());
        };

        OperatingPolicy::new(
            column::<NaiveTime>(&row, "open_time")?,
            column::<NaiveTime>(&row, "close_time")?,
            column::<NaiveTime>(&row, "same_day_cutoff_time")?,
            money(&row, "min_order_amount")?,
            money(&row, "base_delivery_fee")?,
            money(&row, "free_delivery_threshold")?,
            column(&row, "allow_reservation_days")?,
        )
        .map_err(|e| RepositoryError::FetchFailed(format!("営業ポリシーが不正です: {}", e)))
    }

    async fn holidays(&self) -> Result<Vec<Holiday>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT holiday_date, reason, is_closed
            FROM holidays
            ORDER BY holiday_date
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("休業日の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        rows.iter()
            .map(|row| {
                Ok(Holiday {
                    holiday_date: column::<NaiveDate>(row, "holiday_date")?,
                    reason: column(row, "reason")?,
                    is_closed: column(row, "is_closed")?,
                })
            })
            .collect()
    }

    async fn delivery_zones(&self) -> Result<Vec<DeliveryZone>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, zone_type, apartment_name, dong_code, center_lat, center_lng, radius_m,
                min_order_amount, base_fee, free_delivery_threshold, is_active
            FROM delivery_zones
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("配送ゾーンの取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        rows.iter().map(build_zone).collect()
    }
}

fn build_zone(row: &MySqlRow) -> Result<DeliveryZone, RepositoryError> {
    let id = ZoneId(column(row, "id")?);
    let zone_type: String = column(row, "zone_type")?;

    // キーが欠けている行は new() の検証で弾く
    let matcher = match zone_type.as_str() {
        "APARTMENT" => ZoneMatcher::Apartment {
            apartment_name: column::<Option<String>>(row, "apartment_name")?.unwrap_or_default(),
        },
        "DONG" => ZoneMatcher::Dong {
            dong_code: column::<Option<String>>(row, "dong_code")?.unwrap_or_default(),
        },
        "RADIUS" => {
            let (Some(lat), Some(lng)) = (
                column::<Option<f64>>(row, "center_lat")?,
                column::<Option<f64>>(row, "center_lng")?,
            ) else {
                return Err(RepositoryError::FetchFailed(format!(
                    "RADIUSゾーン {} に中心座標がありません",
                    id
                )));
            };
            ZoneMatcher::Radius {
                center: GeoPoint::new(lat, lng).map_err(|e| {
                    RepositoryError::FetchFailed(format!("ゾーン {} の中心座標が不正です: {}", id, e))
                })?,
                radius_m: column::<Option<u32>>(row, "radius_m")?.unwrap_or_default(),
            }
        }
        other => {
            return Err(RepositoryError::FetchFailed(format!(
                "未知のゾーン種別です: {}",
                other
            )))
        }
    };

    let overrides = FeeOverrides {
        min_order_amount: optional_money(row, "min_order_amount")?,
        base_fee: optional_money(row, "base_fee")?,
        free_delivery_threshold: optional_money(row, "free_delivery_threshold")?,
    };

    DeliveryZone::new(id, matcher, overrides, column(row, "is_active")?)
        .map_err(|e| RepositoryError::FetchFailed(format!("ゾーン {} が不正です: {}", id, e)))
}
