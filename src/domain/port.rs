// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::event::DomainEvent;
use crate::domain::model::{
    CartSnapshot, CatalogProduct, DeliveryZone, Holiday, OperatingPolicy, Order, OrderId,
    OrderNo, OrderStatus, ProductId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    /// 楽観ロックの競合（他の更新が先にコミットされた）
    #[error("Concurrent modification of order {order_id}: expected version {expected}")]
    Conflict { order_id: OrderId, expected: u64 },
}

/// 注文リポジトリトレイト
/// 注文集約の永続化を抽象化する
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 新しい注文を登録する
    ///
    /// # Arguments
    /// * `order` - 作成直後の注文
    ///
    /// # Returns
    /// * `Ok(())` - 登録成功
    /// * `Err(RepositoryError)` - 登録失敗
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    /// 既存の注文を保存する
    ///
    /// 保存済みのバージョンが `order.version()` と一致する場合のみ書き込み、
    /// バージョンを1つ進める。返金・ステータス履歴は追記のみ。
    ///
    /// # Arguments
    /// * `order` - 保存する注文
    ///
    /// # Returns
    /// * `Ok(())` - 保存成功
    /// * `Err(RepositoryError::Conflict)` - 他の更新と競合した
    /// * `Err(RepositoryError)` - 保存失敗
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// 注文IDで注文を検索する
    ///
    /// # Arguments
    /// * `order_id` - 検索する注文ID
    ///
    /// # Returns
    /// * `Ok(Some(Order))` - 注文が見つかった
    /// * `Ok(None)` - 注文が見つからなかった
    /// * `Err(RepositoryError)` - 検索失敗
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// 注文番号と電話番号で注文を検索する
    /// 電話番号は正規化済みであること
    async fn find_by_order_no_and_phone(
        &self,
        order_no: &OrderNo,
        phone: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// すべての注文を取得する
    /// 注文日時の降順で並べて返す
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// 指定されたステータスの注文を取得する
    /// 注文日時の降順で並べて返す
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError>;

    /// 新しい一意の注文IDを生成する
    fn next_identity(&self) -> OrderId;
}

/// カートストア（セッション単位のカート）
#[async_trait]
pub trait CartStore: Send + Sync {
    /// セッションキーでカートを取得する
    /// カートが存在しない場合は空のカートを返す
    async fn load(&self, session_key: &str) -> Result<CartSnapshot, RepositoryError>;

    /// 注文作成後にカートを空にする
    async fn clear(&self, session_key: &str) -> Result<(), RepositoryError>;
}

/// カタログストア（代替品の価格・在庫の参照）
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<CatalogProduct>, RepositoryError>;
}

/// 営業ポリシー・休業日・配送ゾーンの設定ストア
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// 営業ポリシーを取得する（未設定なら既定値）
    async fn operating_policy(&self) -> Result<OperatingPolicy, RepositoryError>;

    async fn holidays(&self) -> Result<Vec<Holiday>, RepositoryError>;

    /// 配送ゾーンを取得する（無効なゾーンも含む）
    async fn delivery_zones(&self) -> Result<Vec<DeliveryZone>, RepositoryError>;
}

/// イベント発行エラー
#[derive(Debug, thiserror::Error)]
pub enum EventPublishError {
    #[error("Event publishing failed: {0}")]
    PublishingFailed(String),
}

/// イベント発行トレイト
/// コミット後のドメインイベントを外部（通知など）へ送る
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventPublishError>;
}

/// 現在時刻の取得
/// 営業時間・取消期限の判定に使う
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
