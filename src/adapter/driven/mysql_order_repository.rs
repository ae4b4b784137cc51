use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{
    Actor, ActorType, CustomerContact, DeliveryAddress, ItemStatus, Order, OrderId,
    OrderItem, OrderItemId, OrderNo, OrderSnapshot, OrderStatus, ProductId, Refund, RefundId,
    RefundMethod, RefundStatus, StatusLog, StatusLogId, Substitution, ZoneId, ZoneQuery,
};
use crate::domain::port::{OrderRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Transaction};
use std::collections::HashSet;

use super::row::{column, money, optional_money};

const ORDER_COLUMNS: &str = r#"
    id, order_no, status, customer_name, customer_phone,
    address_line1, address_line2, building, unit_no, dong_code, apartment_name, latitude, longitude,
    zone_id, subtotal_estimated, delivery_fee, total_estimated, total_final, allow_substitution,
    ordered_at, requested_slot_start, requested_slot_end, cancelable_until, picked_at, delivered_at,
    delivery_request_note, version
"#;

/// MySQL注文リポジトリ
/// 注文・明細・ステータス履歴・返金を1トランザクションで保存する
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySqlOrderRepositoryを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// 注文行から集約を組み立てる（明細・履歴・返金は追加で読み込む）
    async fn build_orders_from_rows(&self, rows: Vec<MySqlRow>) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.build_order(&row).await?);
        }
        Ok(orders)
    }

    async fn build_order(&self, row: &MySqlRow) -> Result<Order, RepositoryError> {
        let id_str: String = column(row, "id")?;
        let id = OrderId::from_string(&id_str).map_err(|e| corrupted("注文ID", e))?;

        let items = self.load_items(&id_str).await?;
        let status_logs = self.load_status_logs(&id_str).await?;
        let refunds = self.load_refunds(&id_str, id).await?;

        let status = OrderStatus::from_string(&column::<String>(row, "status")?)
            .map_err(|e| corrupted("注文ステータス", e))?;
        let customer = CustomerContact::new(
            column(row, "customer_name")?,
            &column::<String>(row, "customer_phone")?,
        )
        .map_err(|e| corrupted("顧客情報", e))?;

        let zone_query = ZoneQuery::new(
            column(row, "dong_code")?,
            column(row, "apartment_name")?,
            column(row, "latitude")?,
            column(row, "longitude")?,
        )
        .map_err(|e| corrupted("ゾーン判定キー", e))?;
        let address = DeliveryAddress::new(
            column(row, "address_line1")?,
            column(row, "address_line2")?,
            column(row, "building")?,
            column(row, "unit_no")?,
            zone_query,
        )
        .map_err(|e| corrupted("配送先住所", e))?;

        let snapshot = OrderSnapshot {
            id,
            order_no: OrderNo::from_string(column::<String>(row, "order_no")?),
            status,
            customer,
            address,
            zone_id: column::<Option<i64>>(row, "zone_id")?.map(ZoneId),
            items,
            subtotal_estimated: money(row, "subtotal_estimated")?,
            delivery_fee: money(row, "delivery_fee")?,
            total_estimated: money(row, "total_estimated")?,
            total_final: optional_money(row, "total_final")?,
            allow_substitution: column(row, "allow_substitution")?,
            ordered_at: column(row, "ordered_at")?,
            requested_slot_start: column(row, "requested_slot_start")?,
            requested_slot_end: column(row, "requested_slot_end")?,
            cancelable_until: column(row, "cancelable_until")?,
            picked_at: column(row, "picked_at")?,
            delivered_at: column(row, "delivered_at")?,
            delivery_request_note: column(row, "delivery_request_note")?,
            refunds,
            status_logs,
            version: column(row, "version")?,
        };

        Order::reconstruct(snapshot).map_err(|e| {
            RepositoryError::FetchFailed(format!("注文集約の再構築に失敗しました: {}", e))
        })
    }

    async fn load_items(&self, order_id: &str) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, product_id, product_name, unit_label, qty_ordered, qty_fulfilled,
                unit_price_estimated, line_estimated, is_weight_item, status,
                substitution_product_id, substitution_product_name, substitution_unit_price, note
            FROM order_items
            WHERE order_id = ?
            ORDER BY line_no
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("注文明細の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = OrderItemId::from_string(&column::<String>(row, "id")?)
                .map_err(|e| corrupted("明細ID", e))?;
            let status = ItemStatus::from_string(&column::<String>(row, "status")?)
                .map_err(|e| corrupted("明細ステータス", e))?;

            let substitution = match (
                column::<Option<i64>>(row, "substitution_product_id")?,
                column::<Option<String>>(row, "substitution_product_name")?,
                optional_money(row, "substitution_unit_price")?,
            ) {
                (Some(product_id), Some(product_name), Some(unit_price)) => Some(Substitution {
                    product_id: ProductId(product_id),
                    product_name,
                    unit_price,
                }),
                _ => None,
            };

            let item = OrderItem::reconstruct(
                id,
                ProductId(column(row, "product_id")?),
                column(row, "product_name")?,
                column(row, "unit_label")?,
                column(row, "qty_ordered")?,
                column(row, "qty_fulfilled")?,
                money(row, "unit_price_estimated")?,
                money(row, "line_estimated")?,
                column(row, "is_weight_item")?,
                status,
                substitution,
                column(row, "note")?,
            )
            .map_err(|e| corrupted("注文明細", e))?;
            items.push(item);
        }
        Ok(items)
    }

    async fn load_status_logs(&self, order_id: &str) -> Result<Vec<StatusLog>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_status, to_status, changed_by_type, changed_by_id, reason, created_at
            FROM order_status_logs
            WHERE order_id = ?
            ORDER BY seq
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("ステータス履歴の取得に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in &rows {
            let from_status = column::<Option<String>>(row, "from_status")?
                .map(|s| OrderStatus::from_string(&s))
                .transpose()
                .map_err(|e| corrupted("変更前ステータス", e))?;
            let to_status = OrderStatus::from_string(&column::<String>(row, "to_status")?)
                .map_err(|e| corrupted("変更後ステータス", e))?;
            let actor_type = ActorType::from_string(&column::<String>(row, "changed_by_type")?)
                .map_err(|e| corrupted("操作者種別", e))?;

            logs.push(StatusLog {
                id: StatusLogId::from_string(&column::<String>(row, "id")?)
                    .map_err(|e| corrupted("ステータス履歴ID", e))?,
                from_status,
                to_status,
                changed_by: Actor::new(actor_type, column::<String>(row, "changed_by_id")?),
                reason: column(row, "reason")?,
                created_at: column(row, "created_at")?,
            });
        }
        Ok(logs)
    }

    async fn load_refunds(
        &self,
        order_id_str: &str,
        order_id: OrderId,
    ) -> Result<Vec<Refund>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, amount, reason, method, status, processed_at, processed_by
            FROM refunds
            WHERE order_id = ?
            ORDER BY seq
            "#,
        )
        .bind(order_id_str)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("返金記録の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        let mut refunds = Vec::with_capacity(rows.len());
        for row in &rows {
            refunds.push(Refund {
                id: RefundId::from_string(&column::<String>(row, "id")?)
                    .map_err(|e| corrupted("返金ID", e))?,
                order_id,
                amount: money(row, "amount")?,
                reason: column(row, "reason")?,
                method: RefundMethod::from_string(&column::<String>(row, "method")?)
                    .map_err(|e| corrupted("返金方法", e))?,
                status: RefundStatus::from_string(&column::<String>(row, "status")?)
                    .map_err(|e| corrupted("返金ステータス", e))?,
                processed_at: column(row, "processed_at")?,
                processed_by: column(row, "processed_by")?,
            });
        }
        Ok(refunds)
    }

    async fn begin(&self) -> Result<Transaction<'static, MySql>, RepositoryError> {
        self.pool
            .begin()
            .await
            .map_err(|e| {
                DatabaseError::ConnectionError(format!(
                    "トランザクションの開始に失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)
    }

    async fn fetch_orders(
        &self,
        filter: &str,
        binds: &[String],
    ) -> Result<Vec<MySqlRow>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM orders {} ORDER BY ordered_at DESC",
            ORDER_COLUMNS, filter
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("注文の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.begin().await?;
        let address = order.address();
        let zone_query = address.zone_query();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_no, status, customer_name, customer_phone,
                address_line1, address_line2, building, unit_no, dong_code, apartment_name,
                latitude, longitude, zone_id, subtotal_estimated, delivery_fee, total_estimated,
                total_final, allow_substitution, ordered_at, requested_slot_start,
                requested_slot_end, cancelable_until, picked_at, delivered_at,
                delivery_request_note, version
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(order.id().to_string())
        .bind(order.order_no().as_str())
        .bind(order.status().as_str())
        .bind(order.customer().name())
        .bind(order.customer().phone())
        .bind(address.address_line1())
        .bind(address.address_line2())
        .bind(address.building())
        .bind(address.unit_no())
        .bind(zone_query.dong_code.as_deref())
        .bind(zone_query.apartment_name.as_deref())
        .bind(zone_query.location.map(|p| p.latitude))
        .bind(zone_query.location.map(|p| p.longitude))
        .bind(order.zone_id().map(|z| z.0))
        .bind(order.subtotal_estimated().amount())
        .bind(order.delivery_fee().amount())
        .bind(order.total_estimated().amount())
        .bind(order.total_final().map(|m| m.amount()))
        .bind(order.allow_substitution())
        .bind(order.ordered_at())
        .bind(order.requested_slot_start())
        .bind(order.requested_slot_end())
        .bind(order.cancelable_until())
        .bind(order.picked_at())
        .bind(order.delivered_at())
        .bind(order.delivery_request_note())
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("注文の保存に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        for (line_no, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, line_no, product_id, product_name, unit_label,
                    qty_ordered, qty_fulfilled, unit_price_estimated, line_estimated,
                    is_weight_item, status, substitution_product_id,
                    substitution_product_name, substitution_unit_price, note
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item.id().to_string())
            .bind(order.id().to_string())
            .bind(line_no as u32)
            .bind(item.product_id().0)
            .bind(item.product_name())
            .bind(item.unit_label())
            .bind(item.qty_ordered())
            .bind(item.qty_fulfilled())
            .bind(item.unit_price_estimated().amount())
            .bind(item.line_estimated().amount())
            .bind(item.is_weight_item())
            .bind(item.status().as_str())
            .bind(item.substitution().map(|s| s.product_id.0))
            .bind(item.substitution().map(|s| s.product_name.clone()))
            .bind(item.substitution().map(|s| s.unit_price.amount()))
            .bind(item.note())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("注文明細の保存に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;
        }

        append_history(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!(
                    "トランザクションのコミットに失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.begin().await?;

        // 読み込み時のバージョンと一致する場合のみ更新し、バージョンを進める
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?, subtotal_estimated = ?, total_final = ?,
                picked_at = ?, delivered_at = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(order.status().as_str())
        .bind(order.subtotal_estimated().amount())
        .bind(order.total_final().map(|m| m.amount()))
        .bind(order.picked_at())
        .bind(order.delivered_at())
        .bind(order.id().to_string())
        .bind(order.version())
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("注文の更新に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| {
                    DatabaseError::QueryError(format!(
                        "トランザクションのロールバックに失敗しました: {}",
                        e
                    ))
                })
                .map_err(RepositoryError::from)?;
            return Err(RepositoryError::Conflict {
                order_id: order.id(),
                expected: order.version(),
            });
        }

        for item in order.items() {
            sqlx::query(
                r#"
                UPDATE order_items
                SET qty_fulfilled = ?, line_estimated = ?, status = ?,
                    substitution_product_id = ?, substitution_product_name = ?,
                    substitution_unit_price = ?, note = ?
                WHERE id = ?
                "#,
            )
            .bind(item.qty_fulfilled())
            .bind(item.line_estimated().amount())
            .bind(item.status().as_str())
            .bind(item.substitution().map(|s| s.product_id.0))
            .bind(item.substitution().map(|s| s.product_name.clone()))
            .bind(item.substitution().map(|s| s.unit_price.amount()))
            .bind(item.note())
            .bind(item.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("注文明細の更新に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;
        }

        append_history(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!(
                    "トランザクションのコミットに失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let rows = self
            .fetch_orders("WHERE id = ?", &[order_id.to_string()])
            .await?;
        Ok(self.build_orders_from_rows(rows).await?.into_iter().next())
    }

    async fn find_by_order_no_and_phone(
        &self,
        order_no: &OrderNo,
        phone: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let rows = self
            .fetch_orders(
                "WHERE order_no = ? AND customer_phone = ?",
                &[order_no.to_string(), phone.to_string()],
            )
            .await?;
        Ok(self.build_orders_from_rows(rows).await?.into_iter().next())
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = self.fetch_orders("", &[]).await?;
        self.build_orders_from_rows(rows).await
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        let rows = self
            .fetch_orders("WHERE status = ?", &[status.as_str().to_string()])
            .await?;
        self.build_orders_from_rows(rows).await
    }

    fn next_identity(&self) -> OrderId {
        OrderId::new()
    }
}

/// ステータス履歴と返金を追記する
/// 保存済みの行は更新・削除せず、まだない行だけを記録順に挿入する（`seq` が順序を保つ）
async fn append_history(
    tx: &mut Transaction<'static, MySql>,
    order: &Order,
) -> Result<(), RepositoryError> {
    let order_id = order.id().to_string();
    let stored_logs = stored_ids(tx, "order_status_logs", &order_id).await?;
    let stored_refunds = stored_ids(tx, "refunds", &order_id).await?;

    for log in unsaved(order.status_logs(), &stored_logs, |log| log.id.to_string()) {
        sqlx::query(
            r#"
            INSERT INTO order_status_logs (
                id, order_id, from_status, to_status, changed_by_type, changed_by_id,
                reason, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.id.to_string())
        .bind(&order_id)
        .bind(log.from_status.map(|s| s.as_str()))
        .bind(log.to_status.as_str())
        .bind(log.changed_by.actor_type().as_str())
        .bind(log.changed_by.id())
        .bind(log.reason.as_deref())
        .bind(log.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("ステータス履歴の保存に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;
    }

    for refund in unsaved(order.refunds(), &stored_refunds, |refund| refund.id.to_string()) {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, order_id, amount, reason, method, status, processed_at, processed_by
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(refund.id.to_string())
        .bind(&order_id)
        .bind(refund.amount.amount())
        .bind(&refund.reason)
        .bind(refund.method.as_str())
        .bind(refund.status.as_str())
        .bind(refund.processed_at)
        .bind(&refund.processed_by)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("返金記録の保存に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;
    }

    Ok(())
}

/// 保存済みでない行を記録順のまま返す
fn unsaved<'a, T>(
    rows: &'a [T],
    stored: &'a HashSet<String>,
    id: impl Fn(&T) -> String + 'a,
) -> impl Iterator<Item = &'a T> + 'a {
    rows.iter().filter(move |row| !stored.contains(&id(row)))
}

/// 注文に紐づく保存済みの行IDを取得する
/// `table` は固定のテーブル名のみを渡すこと
async fn stored_ids(
    tx: &mut Transaction<'static, MySql>,
    table: &'static str,
    order_id: &str,
) -> Result<HashSet<String>, RepositoryError> {
    let rows = sqlx::query(&format!("SELECT id FROM {} WHERE order_id = ?", table))
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("{} の取得に失敗しました: {}", table, e)))
        .map_err(RepositoryError::from)?;

    rows.iter().map(|row| column::<String>(row, "id")).collect()
}

fn corrupted(what: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::FetchFailed(format!("{}の解析に失敗しました: {}", what, err))
}
