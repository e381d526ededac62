//! Destinations for engine output.

use std::sync::mpsc::Sender;

use tracing::{info, warn};

use crate::message::EngineMessage;

pub trait MessageSink {
    fn send(&mut self, message: EngineMessage);
}

/// Drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn send(&mut self, _message: EngineMessage) {}
}

#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<EngineMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<EngineMessage>) -> Self {
        Self { tx }
    }
}

impl MessageSink for ChannelSink {
    fn send(&mut self, message: EngineMessage) {
        if self.tx.send(message).is_err() {
            warn!("engine output dropped: receiver disconnected");
        }
    }
}

/// Keeps every message; used by scripts and tests.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub messages: Vec<EngineMessage>,
}

impl CollectSink {
    pub fn outputs(&self) -> impl Iterator<Item = &hk_core::Value> {
        self.messages.iter().filter_map(|m| match m {
            EngineMessage::Output(v) => Some(v),
            _ => None,
        })
    }

    pub fn take(&mut self) -> Vec<EngineMessage> {
        std::mem::take(&mut self.messages)
    }
}

impl MessageSink for CollectSink {
    fn send(&mut self, message: EngineMessage) {
        self.messages.push(message);
    }
}

/// Writes output through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn send(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Output(value) => info!(%value, "output"),
            EngineMessage::Failure(failure) => warn!(%failure, "command failed"),
            other => info!(?other, "engine"),
        }
    }
}
