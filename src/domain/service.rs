// ドメインサービス
// 注文の状態遷移・欠品処理・配送ゾーン判定・見積もりのルールを実装

mod fulfillment;
mod quote_engine;
mod state_machine;
mod zone_resolver;

pub use fulfillment::{
    AutoCancelPolicy, FulfillmentDecision, FulfillmentOutcome, FulfillmentResolver,
    ShortageAction, AUTO_CANCEL_REASON, SHORTAGE_PICKING_REASON,
};
pub use quote_engine::{CheckoutQuote, CheckoutQuoteEngine, QuoteContext, QuoteError};
pub use state_machine::{OrderStateMachine, TransitionOutcome, CANCEL_REFUND_REASON};
pub use zone_resolver::{DeliveryZoneResolver, ResolvedZone};
