use crate::domain::error::DomainError;
use crate::domain::model::Money;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// 店舗の営業ポリシー（シングルトン）
/// 時刻はすべて店舗の現地時刻
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingPolicy {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub same_day_cutoff_time: NaiveTime,
    pub min_order_amount: Money,
    pub base_delivery_fee: Money,
    pub free_delivery_threshold: Money,
    pub allow_reservation_days: u32,
}

impl OperatingPolicy {
    pub fn new(
        open_time: NaiveTime,
        close_time: NaiveTime,
        same_day_cutoff_time: NaiveTime,
        min_order_amount: Money,
        base_delivery_fee: Money,
        free_delivery_threshold: Money,
        allow_reservation_days: u32,
    ) -> Result<Self, DomainError> {
        if open_time >= close_time {
            return Err(DomainError::Validation(
                "開店時刻は閉店時刻より前である必要があります".to_string(),
            ));
        }
        Ok(Self {
            open_time,
            close_time,
            same_day_cutoff_time,
            min_order_amount,
            base_delivery_fee,
            free_delivery_threshold,
            allow_reservation_days,
        })
    }

    /// 営業時間内か（開店・閉店時刻を含む）
    pub fn is_open_at(&self, time: NaiveTime) -> bool {
        self.open_time <= time && time <= self.close_time
    }
}

impl Default for OperatingPolicy {
    /// 初期導入時の既定値（09:00-21:00、当日締め19:00）
    fn default() -> Self {
        Self {
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            close_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default(),
            same_day_cutoff_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
            min_order_amount: Money::won(15000),
            base_delivery_fee: Money::won(3000),
            free_delivery_threshold: Money::won(40000),
            allow_reservation_days: 2,
        }
    }
}

/// 休業日
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub holiday_date: NaiveDate,
    pub reason: Option<String>,
    pub is_closed: bool,
}

/// 指定日が休業日か
pub fn is_closed_on(holidays: &[Holiday], date: NaiveDate) -> bool {
    holidays
        .iter()
        .any(|h| h.is_closed && h.holiday_date == date)
}
