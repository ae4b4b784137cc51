use crate::domain::event::DomainEvent;
use crate::domain::port::{EventPublishError, EventPublisher};
use async_trait::async_trait;
use tracing::info;

/// トレーシングイベント発行者
/// ドメインイベントをJSONにしてログへ出力する（通知サービスの代わり）
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    /// 新しいトレーシングイベント発行者を作成
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventPublishError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| EventPublishError::PublishingFailed(e.to_string()))?;
        info!(
            target: "domain_event",
            event_type = event.event_type(),
            order_id = %event.order_id(),
            payload = %payload,
            "ドメインイベントを発行しました"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::RefundRecorded;
    use crate::domain::model::{Money, OrderId, RefundId};
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_succeeds() {
        let publisher = TracingEventPublisher::new();
        let event = DomainEvent::RefundRecorded(RefundRecorded {
            order_id: OrderId::new(),
            refund_id: RefundId::new(),
            amount: Money::won(1200),
            reason: "partial cancel".to_string(),
            processed_by: "admin".to_string(),
            occurred_at: Utc::now(),
        });
        assert!(publisher.publish(&event).await.is_ok());
    }
}
