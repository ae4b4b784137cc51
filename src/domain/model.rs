// ドメインモデル（エンティティと値オブジェクト）

mod cart;
mod delivery_zone;
mod order;
mod order_item;
mod policy;
mod refund;
pub(crate) mod value_objects;

pub use value_objects::{
    OrderId, OrderItemId, RefundId, StatusLogId,
    ProductId, ZoneId, OrderNo,
    Money,
    OrderStatus,
    Actor, ActorType,
    CustomerContact,
    GeoPoint, ZoneQuery, DeliveryAddress,
    normalize_apartment_name,
};

pub use cart::{CartLine, CartSnapshot, CatalogProduct};
pub use delivery_zone::{DeliveryZone, FeeOverrides, ZoneMatcher, ZoneType};
pub use order::{NewOrder, Order, OrderSnapshot, StatusLog, ORDER_CREATED_REASON};
pub use order_item::{ItemStatus, OrderItem, Substitution};
pub use policy::{is_closed_on, Holiday, OperatingPolicy};
pub use refund::{Refund, RefundLedger, RefundMethod, RefundStatus};
