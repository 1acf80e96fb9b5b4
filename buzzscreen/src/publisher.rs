//! Publishing of track-event messages to the message bus.
use std::sync::Arc;

use async_trait::async_trait;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use primitives::{auth::header_name, Auth, Clock};
use thiserror::Error;
use uuid::Uuid;

use crate::event::EventMessage;

/// Persistent messages survive a broker restart.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("message bus: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("serializing the message: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `message` with the identity of `auth` as message headers.
    async fn publish(
        &self,
        routing_key: &str,
        auth: &Auth,
        message: &EventMessage,
    ) -> Result<(), PublishError>;
}

/// Publishes to a single exchange of an AMQP broker.
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
    clock: Arc<dyn Clock>,
}

impl AmqpPublisher {
    pub async fn connect(
        url: &str,
        exchange: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PublishError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        Ok(Self {
            channel,
            exchange: exchange.into(),
            clock,
        })
    }
}

/// The identity of `auth` as AMQP headers, the ids as integers.
fn identity_headers(auth: &Auth) -> FieldTable {
    let mut headers = FieldTable::default();

    headers.insert(
        ShortString::from(header_name::APP_ID),
        AMQPValue::LongLongInt(auth.app_id),
    );
    headers.insert(
        ShortString::from(header_name::ACCOUNT_ID),
        AMQPValue::LongLongInt(auth.account_id),
    );
    headers.insert(
        ShortString::from(header_name::PUBLISHER_USER_ID),
        AMQPValue::LongString(LongString::from(auth.publisher_user_id.clone())),
    );
    headers.insert(
        ShortString::from(header_name::IFA),
        AMQPValue::LongString(LongString::from(auth.ifa.clone())),
    );

    headers
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(
        &self,
        routing_key: &str,
        auth: &Auth,
        message: &EventMessage,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(message)?;

        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
            .with_timestamp(self.clock.now().timestamp().max(0) as u64)
            .with_headers(identity_headers(auth));

        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?
            .await?;

        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryPublisher;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every published message as `(routing key, auth, message)`.
    #[derive(Debug, Default)]
    pub struct MemoryPublisher {
        published: Mutex<Vec<(String, Auth, EventMessage)>>,
    }

    impl MemoryPublisher {
        pub fn published(&self) -> Vec<(String, Auth, EventMessage)> {
            self.published
                .lock()
                .expect("Should not be poisoned")
                .clone()
        }
    }

    #[async_trait]
    impl Publisher for MemoryPublisher {
        async fn publish(
            &self,
            routing_key: &str,
            auth: &Auth,
            message: &EventMessage,
        ) -> Result<(), PublishError> {
            self.published
                .lock()
                .expect("Should not be poisoned")
                .push((routing_key.to_string(), auth.clone(), message.clone()));

            Ok(())
        }
    }
}
