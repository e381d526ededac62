//! Messages exchanged between a user interface and the engine thread.

use hk_core::Value;
use hk_curve::CommandMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Failure;

/// UI -> engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum UiMessage {
    Command(CommandMessage),
    /// Answer to a `Request` with the same id.
    Response { id: Uuid, value: Value },
    /// Stop the engine loop.
    Close,
}

impl UiMessage {
    pub fn command(message: CommandMessage) -> Self {
        UiMessage::Command(message)
    }
}

/// Engine -> UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineMessage {
    Output(Value),
    Request(Request),
    Success,
    /// The command asked the engine to shut down.
    Exit,
    Failure(Failure),
}

impl EngineMessage {
    /// Success, Exit and Failure end a command's output.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            EngineMessage::Success | EngineMessage::Exit | EngineMessage::Failure(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    Boolean,
    String,
    Float,
    Selection(Vec<String>),
    /// Index of a data point
    Point,
}

/// A question a running command needs answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub prompt: String,
    pub kind: RequestKind,
    pub default: Value,
}
