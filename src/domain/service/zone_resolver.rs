use crate::domain::model::{DeliveryZone, Money, OperatingPolicy, ZoneId, ZoneQuery, ZoneType};
use serde::Serialize;

use std::cmp::Reverse;

/// 判定の優先順位
const ZONE_PRIORITY: [ZoneType; 3] = [ZoneType::Apartment, ZoneType::Dong, ZoneType::Radius];

/// ゾーン判定の結果（実際に適用される料金設定）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedZone {
    /// 該当ゾーンがない場合は None（ポリシーの既定値を適用）
    pub zone_id: Option<ZoneId>,
    pub zone_type: Option<ZoneType>,
    pub min_order_amount: Money,
    pub base_fee: Money,
    pub free_delivery_threshold: Money,
}

/// 配送ゾーンリゾルバー
/// 副作用のない純粋な関数として実装する
pub struct DeliveryZoneResolver;

impl DeliveryZoneResolver {
    /// 住所に適用されるゾーンを選ぶ
    ///
    /// APARTMENT → DONG → RADIUS の順に評価し、有効なゾーンが1つでも
    /// 該当した最初の階層から1つを選ぶ。同じ階層に複数ある場合、
    /// RADIUS は半径が最小のもの、それ以外はIDが最大のものを選ぶ。
    pub fn select<'a>(query: &ZoneQuery, zones: &'a [DeliveryZone]) -> Option<&'a DeliveryZone> {
        ZONE_PRIORITY.iter().find_map(|tier| {
            let candidates = zones
                .iter()
                .filter(|z| z.is_active && z.zone_type() == *tier && z.matcher.matches(query));
            match tier {
                ZoneType::Radius => {
                    candidates.min_by_key(|z| (z.radius_m().unwrap_or(u32::MAX), Reverse(z.id)))
                }
                _ => candidates.max_by_key(|z| z.id),
            }
        })
    }

    /// 住所と営業ポリシーから料金設定を求める
    /// ゾーンで未設定の項目はポリシーの既定値で補う
    pub fn resolve(
        query: &ZoneQuery,
        zones: &[DeliveryZone],
        policy: &OperatingPolicy,
    ) -> ResolvedZone {
        match Self::select(query, zones) {
            Some(zone) => ResolvedZone {
                zone_id: Some(zone.id),
                zone_type: Some(zone.zone_type()),
                min_order_amount: zone
                    .overrides
                    .min_order_amount
                    .unwrap_or(policy.min_order_amount),
                base_fee: zone.overrides.base_fee.unwrap_or(policy.base_delivery_fee),
                free_delivery_threshold: zone
                    .overrides
                    .free_delivery_threshold
                    .unwrap_or(policy.free_delivery_threshold),
            },
            None => ResolvedZone {
                zone_id: None,
                zone_type: None,
                min_order_amount: policy.min_order_amount,
                base_fee: policy.base_delivery_fee,
                free_delivery_threshold: policy.free_delivery_threshold,
            },
        }
    }
}
