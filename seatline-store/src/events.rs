use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{info, error};

use seatline_core::{BookingEvent, BookingEventPublisher, CoreError, CoreResult};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Lifecycle events go to `booking.*` topics keyed by booking id, so one
/// booking's events stay ordered within a partition.
#[async_trait]
impl BookingEventPublisher for EventProducer {
    async fn publish(&self, event: &BookingEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(event).map_err(CoreError::internal)?;
        EventProducer::publish(self, event.topic(), &event.booking_id().to_string(), &payload)
            .await
            .map_err(CoreError::transient)
    }
}
