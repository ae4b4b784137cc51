use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// UUIDベースの識別子を定義するマクロ
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// 新しい一意の識別子を生成
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// UUIDから作成
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// 文字列から作成
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                let uuid = Uuid::parse_str(s)?;
                Ok(Self(uuid))
            }

            /// 内部のUUIDを取得
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

uuid_identifier!(
    /// 注文の一意識別子
    OrderId
);
uuid_identifier!(
    /// 注文明細の一意識別子
    OrderItemId
);
uuid_identifier!(
    /// 返金記録の一意識別子
    RefundId
);
uuid_identifier!(
    /// ステータス履歴の一意識別子
    StatusLogId
);

/// 商品ID（カタログ側で採番される）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 配送ゾーンID（同一優先度内では大きいIDが新しい設定として優先される）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub i64);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 顧客向けの注文番号
/// 形式: LM + UTCの YYYYMMDDHHMMSS + 3桁の乱数
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNo(String);

impl OrderNo {
    /// 注文日時から注文番号を生成
    pub fn generate(ordered_at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().as_u128() % 900 + 100;
        Self(format!("LM{}{}", ordered_at.format("%Y%m%d%H%M%S"), suffix))
    }

    /// 既存の注文番号を復元
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 金額の小数点以下の最大桁数（金額カラムは NUMERIC(12,2)）
pub const MONEY_SCALE: u32 = 2;

/// 金額を表す値オブジェクト
/// 単一の現地通貨のみを扱い、負の値は持たない
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// 10進数から作成
    /// 負の金額と小数点以下3桁以上の金額はエラー
    pub fn new(amount: Decimal) -> Result<Self, DomainError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::Validation(format!(
                "金額は0以上である必要があります: {}",
                amount
            )));
        }
        let amount = amount.normalize();
        if amount.scale() > MONEY_SCALE {
            return Err(DomainError::Validation(format!(
                "金額の小数点以下は{}桁までです: {}",
                MONEY_SCALE, amount
            )));
        }
        Ok(Self(amount))
    }

    /// 整数のウォン金額を作成
    pub fn won(amount: u64) -> Self {
        Self(Decimal::from(amount))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// 金額を取得
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// 金額を加算
    pub fn add(&self, other: &Money) -> Money {
        Money(self.0 + other.0)
    }

    /// 金額を減算（結果が負になる場合は0）
    pub fn saturating_sub(&self, other: &Money) -> Money {
        if other.0 >= self.0 {
            Money::zero()
        } else {
            Money(self.0 - other.0)
        }
    }

    /// 金額を乗算
    pub fn multiply(&self, factor: u32) -> Money {
        Money(self.0 * Decimal::from(factor))
    }

    /// 比率を掛ける（自動キャンセル閾値の計算用）
    pub fn scale(&self, ratio: Decimal) -> Money {
        Money((self.0 * ratio).max(Decimal::ZERO))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Money::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc.add(&m))
    }
}

/// 注文のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 受付済み（作成直後）
    Received,
    /// ピッキング中
    Picking,
    /// 代替品の確認待ち
    SubstitutionPending,
    /// 配達中
    OutForDelivery,
    /// 配達完了（終端）
    Delivered,
    /// キャンセル済み（終端）
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Received,
        OrderStatus::Picking,
        OrderStatus::SubstitutionPending,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Picking => "PICKING",
            OrderStatus::SubstitutionPending => "SUBSTITUTION_PENDING",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// 文字列からOrderStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("無効な注文ステータス: {}", s)))
    }

    /// 終端ステータスかどうか
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 操作者の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    System,
    Admin,
    Customer,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::System => "SYSTEM",
            ActorType::Admin => "ADMIN",
            ActorType::Customer => "CUSTOMER",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "SYSTEM" => Ok(ActorType::System),
            "ADMIN" => Ok(ActorType::Admin),
            "CUSTOMER" => Ok(ActorType::Customer),
            _ => Err(DomainError::Validation(format!("無効な操作者種別: {}", s))),
        }
    }
}

/// 状態変更・返金を行った操作者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    actor_type: ActorType,
    id: String,
}

impl Actor {
    pub fn new(actor_type: ActorType, id: impl Into<String>) -> Self {
        Self {
            actor_type,
            id: id.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(ActorType::System, "system")
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(ActorType::Admin, id)
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self::new(ActorType::Customer, id)
    }

    pub fn actor_type(&self) -> ActorType {
        self.actor_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// 顧客の連絡先
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    name: String,
    phone: String,
}

impl CustomerContact {
    /// 新しい連絡先を作成
    /// 電話番号はハイフン・空白を除いた数字のみで保持する
    pub fn new(name: String, phone: &str) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("顧客名は空にできません".to_string()));
        }
        let phone = Self::normalize_phone(phone)?;
        Ok(Self {
            name: name.trim().to_string(),
            phone,
        })
    }

    /// 電話番号を正規化（照会時にも同じ規則を使う）
    pub fn normalize_phone(phone: &str) -> Result<String, DomainError> {
        let digits: String = phone
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if !(9..=11).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::Validation(format!(
                "電話番号は9〜11桁の数字である必要があります: {}",
                phone
            )));
        }
        Ok(digits)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }
}

/// 緯度経度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::Validation(format!(
                "座標が範囲外です: ({}, {})",
                latitude, longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// 大円距離（メートル、ハバーサイン公式）
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = (other.latitude - self.latitude).to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// ゾーン判定に使う住所のキー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneQuery {
    pub dong_code: Option<String>,
    pub apartment_name: Option<String>,
    pub location: Option<GeoPoint>,
}

impl ZoneQuery {
    /// 緯度経度は両方指定するか両方省略する
    pub fn new(
        dong_code: Option<String>,
        apartment_name: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Self, DomainError> {
        let location = match (latitude, longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)?),
            (None, None) => None,
            _ => {
                return Err(DomainError::Validation(
                    "緯度と経度は両方指定する必要があります".to_string(),
                ))
            }
        };
        Ok(Self {
            dong_code: dong_code.filter(|s| !s.trim().is_empty()),
            apartment_name: apartment_name.filter(|s| !s.trim().is_empty()),
            location,
        })
    }
}

/// アパート名の正規化
/// 前後の空白を除き、連続する空白を1つにまとめ、小文字にそろえる
pub fn normalize_apartment_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 配送先住所を表す値オブジェクト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    address_line1: String,
    address_line2: Option<String>,
    building: Option<String>,
    unit_no: Option<String>,
    zone_query: ZoneQuery,
}

impl DeliveryAddress {
    /// 新しい配送先住所を作成
    /// address_line1は必須
    pub fn new(
        address_line1: String,
        address_line2: Option<String>,
        building: Option<String>,
        unit_no: Option<String>,
        zone_query: ZoneQuery,
    ) -> Result<Self, DomainError> {
        if address_line1.trim().is_empty() {
            return Err(DomainError::Validation("住所1は空にできません".to_string()));
        }
        Ok(Self {
            address_line1,
            address_line2,
            building,
            unit_no,
            zone_query,
        })
    }

    pub fn address_line1(&self) -> &str {
        &self.address_line1
    }

    pub fn address_line2(&self) -> Option<&str> {
        self.address_line2.as_deref()
    }

    pub fn building(&self) -> Option<&str> {
        self.building.as_deref()
    }

    pub fn unit_no(&self) -> Option<&str> {
        self.unit_no.as_deref()
    }

    pub fn zone_query(&self) -> &ZoneQuery {
        &self.zone_query
    }
}
