//! Per-command channel to the user: output, prompts, cancellation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use hk_core::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CommandResult, Failure};
use crate::message::{EngineMessage, Request, RequestKind, UiMessage};
use crate::sink::MessageSink;

/// Shared flag a UI sets to abandon a pending prompt.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

const POLL: Duration = Duration::from_millis(50);

pub struct CommandIo<'a> {
    sink: &'a mut dyn MessageSink,
    inbox: Option<&'a Receiver<UiMessage>>,
    pending: VecDeque<UiMessage>,
    cancel: CancelToken,
    timeout: Duration,
    exit_requested: bool,
}

impl<'a> CommandIo<'a> {
    pub fn new(
        sink: &'a mut dyn MessageSink,
        inbox: Option<&'a Receiver<UiMessage>>,
        cancel: CancelToken,
        timeout: Duration,
    ) -> Self {
        Self {
            sink,
            inbox,
            pending: VecDeque::new(),
            cancel,
            timeout,
            exit_requested: false,
        }
    }

    /// No UI attached: prompts return their defaults.
    pub fn detached(sink: &'a mut dyn MessageSink) -> Self {
        Self::new(sink, None, CancelToken::new(), Duration::ZERO)
    }

    pub fn emit(&mut self, value: impl Into<Value>) {
        self.sink.send(EngineMessage::Output(value.into()));
    }

    /// Ask the UI a question and block until it answers, the token is
    /// cancelled or the timeout passes.
    ///
    /// Commands arriving meanwhile are queued and handed back to the engine
    /// loop afterwards.
    pub fn request(
        &mut self,
        prompt: impl Into<String>,
        kind: RequestKind,
        default: Value,
    ) -> CommandResult<Value> {
        let Some(inbox) = self.inbox else {
            return Ok(default);
        };
        let id = Uuid::new_v4();
        self.sink.send(EngineMessage::Request(Request {
            id,
            prompt: prompt.into(),
            kind,
            default: default.clone(),
        }));
        let deadline = Instant::now() + self.timeout;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Failure::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Failure::Timeout {
                    seconds: self.timeout.as_secs_f64(),
                });
            }
            match inbox.recv_timeout(POLL.min(deadline - now)) {
                Ok(UiMessage::Response { id: got, value }) if got == id => {
                    debug!(%id, "prompt answered");
                    return Ok(if value.is_null() { default } else { value });
                }
                Ok(UiMessage::Response { id: got, .. }) => {
                    warn!(%got, expected = %id, "ignoring stale response");
                }
                Ok(message @ UiMessage::Command(_)) => self.pending.push_back(message),
                Ok(UiMessage::Close) => {
                    self.pending.push_back(UiMessage::Close);
                    return Err(Failure::Cancelled);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(Failure::Cancelled),
            }
        }
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Messages that arrived while a prompt was open.
    pub fn into_pending(self) -> VecDeque<UiMessage> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;
    use crate::sink::CollectSink;

    #[test]
    fn detached_prompts_take_default() {
        let mut sink = CollectSink::default();
        let mut io = CommandIo::detached(&mut sink);
        let v = io.request("continue?", RequestKind::Boolean, Value::Bool(true)).unwrap();
        assert_eq!(v, Value::Bool(true));
        assert!(sink.messages.is_empty());
    }

    #[test]
    fn timeout_fails_prompt() {
        let (_tx, rx) = channel();
        let mut sink = CollectSink::default();
        let mut io = CommandIo::new(&mut sink, Some(&rx), CancelToken::new(), Duration::from_millis(20));
        let err = io.request("x", RequestKind::Float, Value::Null).unwrap_err();
        assert!(matches!(err, Failure::Timeout { .. }));
    }

    #[test]
    fn commands_during_prompt_are_queued() {
        let (tx, rx) = channel();
        tx.send(UiMessage::Command(hk_curve::CommandMessage::new("version", Default::default())))
            .unwrap();
        tx.send(UiMessage::Close).unwrap();
        let mut sink = CollectSink::default();
        let mut io = CommandIo::new(&mut sink, Some(&rx), CancelToken::new(), Duration::from_secs(5));
        assert_eq!(
            io.request("x", RequestKind::String, Value::Null).unwrap_err(),
            Failure::Cancelled
        );
        assert_eq!(io.into_pending().len(), 2);
    }
}
