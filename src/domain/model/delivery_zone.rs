use crate::domain::error::DomainError;
use crate::domain::model::{normalize_apartment_name, GeoPoint, Money, ZoneId, ZoneQuery};
use serde::{Deserialize, Serialize};

use std::fmt;

/// ゾーンの種別（判定優先度の高い順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    Apartment,
    Dong,
    Radius,
}

impl ZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneType::Apartment => "APARTMENT",
            ZoneType::Dong => "DONG",
            ZoneType::Radius => "RADIUS",
        }
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ゾーンの判定キー
/// 種別ごとに必要な項目だけを持つ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "zone_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneMatcher {
    Apartment { apartment_name: String },
    Dong { dong_code: String },
    Radius { center: GeoPoint, radius_m: u32 },
}

impl ZoneMatcher {
    pub fn zone_type(&self) -> ZoneType {
        match self {
            ZoneMatcher::Apartment { .. } => ZoneType::Apartment,
            ZoneMatcher::Dong { .. } => ZoneType::Dong,
            ZoneMatcher::Radius { .. } => ZoneType::Radius,
        }
    }

    /// 住所がこのゾーンに該当するか
    pub fn matches(&self, query: &ZoneQuery) -> bool {
        match self {
            ZoneMatcher::Apartment { apartment_name } => query
                .apartment_name
                .as_deref()
                .is_some_and(|name| {
                    normalize_apartment_name(name) == normalize_apartment_name(apartment_name)
                }),
            ZoneMatcher::Dong { dong_code } => query
                .dong_code
                .as_deref()
                .is_some_and(|code| code.trim() == dong_code.trim()),
            ZoneMatcher::Radius { center, radius_m } => query
                .location
                .is_some_and(|location| center.distance_m(&location) <= f64::from(*radius_m)),
        }
    }
}

/// ゾーン単位で上書きできる料金設定
/// None の項目は営業ポリシーの既定値を使う
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeOverrides {
    pub min_order_amount: Option<Money>,
    pub base_fee: Option<Money>,
    pub free_delivery_threshold: Option<Money>,
}

/// 配送ゾーン
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryZone {
    pub id: ZoneId,
    pub matcher: ZoneMatcher,
    pub overrides: FeeOverrides,
    pub is_active: bool,
}

impl DeliveryZone {
    pub fn new(
        id: ZoneId,
        matcher: ZoneMatcher,
        overrides: FeeOverrides,
        is_active: bool,
    ) -> Result<Self, DomainError> {
        match &matcher {
            ZoneMatcher::Apartment { apartment_name } if apartment_name.trim().is_empty() => {
                return Err(DomainError::Validation(
                    "APARTMENTゾーンにはアパート名が必要です".to_string(),
                ));
            }
            ZoneMatcher::Dong { dong_code } if dong_code.trim().is_empty() => {
                return Err(DomainError::Validation(
                    "DONGゾーンには洞コードが必要です".to_string(),
                ));
            }
            ZoneMatcher::Radius { radius_m, .. } if *radius_m == 0 => {
                return Err(DomainError::Validation(
                    "RADIUSゾーンの半径は1m以上である必要があります".to_string(),
                ));
            }
            _ => {}
        }
        Ok(Self {
            id,
            matcher,
            overrides,
            is_active,
        })
    }

    pub fn zone_type(&self) -> ZoneType {
        self.matcher.zone_type()
    }

    /// 半径ゾーンの半径（それ以外は None）
    pub fn radius_m(&self) -> Option<u32> {
        match self.matcher {
            ZoneMatcher::Radius { radius_m, .. } => Some(radius_m),
            _ => None,
        }
    }
}
