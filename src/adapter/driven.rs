// 駆動される側アダプター（リポジトリ・ストア実装など）

mod clock;
mod event_publisher;
mod in_memory;
mod mysql_order_repository;
mod mysql_reference_store;
mod row;

pub use clock::{FixedClock, SystemClock};
pub use event_publisher::TracingEventPublisher;
pub use in_memory::{
    InMemoryCartStore, InMemoryCatalogStore, InMemoryOrderRepository, InMemoryPolicyStore,
};
pub use mysql_order_repository::MySqlOrderRepository;
pub use mysql_reference_store::{MySqlCartStore, MySqlCatalogStore, MySqlPolicyStore};
