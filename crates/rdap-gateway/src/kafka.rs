// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete [`EventSink`] backed by a Kafka producer. Kept in the binary
//! crate so `rdap-core` never depends on a specific bus transport.

use std::time::Duration;

use async_trait::async_trait;
use rdap_core::error::GatewayError;
use rdap_core::events::EventSink;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};

pub struct KafkaEventSink {
    producer: FutureProducer,
}

impl KafkaEventSink {
    pub fn new(brokers: &str) -> Result<Self, anyhow::Error> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl EventSink for KafkaEventSink {
    async fn publish(&self, topic: &str, partition_key: &str, payload: Vec<u8>) -> Result<(), GatewayError> {
        let record = FutureRecord::to(topic).key(partition_key).payload(&payload);
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map(|_| ())
            .map_err(|(err, _)| GatewayError::Network(err.to_string()))
    }
}
