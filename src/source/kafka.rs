//! Kafka record source.

use std::time::Duration;

use log::debug;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;

use crate::config::BrokerConfig;
use crate::error::{Error, Result};
use crate::source::{Record, RecordSource};

pub struct KafkaSource {
    consumer: BaseConsumer,
}

impl KafkaSource {
    /// Connect and subscribe to the configured topics under the configured
    /// consumer group. Offsets auto-commit, which is what ties broker
    /// acknowledgment to poll rather than to disk persistence.
    pub fn connect(config: &BrokerConfig) -> Result<Self> {
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap.as_str())
            .set("group.id", config.group_id.as_str())
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|err| Error::Broker(err.to_string()))?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|err| Error::Broker(err.to_string()))?;

        debug!("subscribed to {topics:?} as group {}", config.group_id);
        Ok(Self { consumer })
    }
}

impl RecordSource for KafkaSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Record>> {
        match self.consumer.poll(timeout) {
            None => Ok(None),
            Some(Ok(message)) => Ok(Some(Record {
                stream: message.topic().to_string(),
                payload: message.payload().unwrap_or_default().to_vec(),
            })),
            Some(Err(err)) => Err(Error::Broker(err.to_string())),
        }
    }
}
