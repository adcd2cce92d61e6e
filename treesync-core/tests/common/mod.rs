#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use treesync_core::contract::{
    BoxError, InboundMessage, ObjectFetcher, OutcomeChannel, QueueTransport,
};

/// Object store fake: serves bytes from a map and records every fetch in order.
#[derive(Default)]
pub struct InMemoryStore {
    objects: HashMap<String, Vec<u8>>,
    broken: Vec<String>,
    fetched: Mutex<Vec<(String, PathBuf)>>,
}

impl InMemoryStore {
    pub fn with_object(mut self, key: &str, bytes: &[u8]) -> Self {
        self.objects.insert(key.to_owned(), bytes.to_vec());
        self
    }

    /// Object exists but every transfer of it faults.
    pub fn with_broken_object(mut self, key: &str) -> Self {
        self.objects.insert(key.to_owned(), Vec::new());
        self.broken.push(key.to_owned());
        self
    }

    pub fn fetched_keys(&self) -> Vec<String> {
        self.fetched.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectFetcher for InMemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, BoxError> {
        Ok(self.objects.contains_key(key))
    }

    async fn fetch(&self, key: &str, local_path: &Path) -> Result<(), BoxError> {
        self.fetched
            .lock()
            .unwrap()
            .push((key.to_owned(), local_path.to_path_buf()));
        if self.broken.iter().any(|b| b == key) {
            return Err(format!("connection reset while reading {key}").into());
        }
        let bytes = self.objects.get(key).ok_or("object vanished")?;
        tokio::fs::write(local_path, bytes).await?;
        Ok(())
    }
}

/// Channel fake recording every notification.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeChannel for RecordingChannel {
    async fn send(&self, text: &str) -> Result<(), BoxError> {
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

/// Queue fake delivering a fixed list of messages and recording acknowledgments.
#[derive(Default)]
pub struct ScriptedQueue {
    pending: Mutex<Vec<InboundMessage>>,
    pub acknowledged: Mutex<Vec<String>>,
    pub transport_errors: Mutex<Vec<String>>,
}

impl ScriptedQueue {
    pub fn new(messages: Vec<InboundMessage>) -> Self {
        let mut pending = messages;
        pending.reverse();
        Self {
            pending: Mutex::new(pending),
            ..Default::default()
        }
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueTransport for ScriptedQueue {
    async fn receive(&self) -> Result<Option<InboundMessage>, BoxError> {
        Ok(self.pending.lock().unwrap().pop())
    }

    async fn acknowledge(&self, message_id: &str) -> Result<(), BoxError> {
        self.acknowledged.lock().unwrap().push(message_id.to_owned());
        Ok(())
    }

    fn report_transport_error(&self, description: &str) {
        self.transport_errors
            .lock()
            .unwrap()
            .push(description.to_owned());
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
