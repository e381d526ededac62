//! The worker side of the UI/engine channel pair.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hk_core::Value;
use hk_curve::CommandMessage;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Failure;
use crate::hooke::Hooke;
use crate::io::{CancelToken, CommandIo};
use crate::message::{EngineMessage, UiMessage};
use crate::sink::{ChannelSink, MessageSink};

pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs commands one at a time against an owned `Hooke`.
pub struct CommandEngine {
    hooke: Hooke,
    cancel: CancelToken,
    prompt_timeout: Duration,
}

impl CommandEngine {
    /// Prompt timeout comes from `config.prompt timeout` (seconds).
    pub fn new(hooke: Hooke) -> Self {
        let prompt_timeout = hooke
            .setting("config", "prompt timeout")
            .as_f64()
            .filter(|s| s.is_finite() && *s > 0.0)
            .map_or(DEFAULT_PROMPT_TIMEOUT, Duration::from_secs_f64);
        Self {
            hooke,
            cancel: CancelToken::new(),
            prompt_timeout,
        }
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn hooke(&self) -> &Hooke {
        &self.hooke
    }

    pub fn hooke_mut(&mut self) -> &mut Hooke {
        &mut self.hooke
    }

    pub fn into_hooke(self) -> Hooke {
        self.hooke
    }

    /// Consume messages until `Close` (or the UI hangs up) and hand the
    /// state back.
    pub fn run(mut self, inbox: Receiver<UiMessage>, sink: &mut dyn MessageSink) -> Hooke {
        let mut pending: VecDeque<UiMessage> = VecDeque::new();
        loop {
            let message = match pending.pop_front() {
                Some(m) => m,
                None => match inbox.recv() {
                    Ok(m) => m,
                    Err(_) => {
                        warn!("UI channel closed without Close");
                        break;
                    }
                },
            };
            match message {
                UiMessage::Close => {
                    info!("engine closing");
                    break;
                }
                UiMessage::Response { id, .. } => {
                    warn!(%id, "response with no open prompt");
                }
                UiMessage::Command(command) => {
                    let later = self.execute_with(&command, sink, Some(&inbox));
                    pending.extend(later);
                }
            }
        }
        self.hooke
    }

    /// Run one command with no UI to answer prompts.
    pub fn execute(&mut self, message: &CommandMessage, sink: &mut dyn MessageSink) -> EngineMessage {
        let mut last = EngineMessage::Success;
        let mut recorder = Recorder { inner: sink, last: &mut last };
        self.execute_with(message, &mut recorder, None);
        last
    }

    /// Run one command, always ending with exactly one terminal message.
    /// Returns messages that arrived during prompts.
    fn execute_with(
        &mut self,
        message: &CommandMessage,
        sink: &mut dyn MessageSink,
        inbox: Option<&Receiver<UiMessage>>,
    ) -> VecDeque<UiMessage> {
        let hooke = &mut self.hooke;
        let (result, exit, pending) = {
            let mut io = CommandIo::new(sink, inbox, self.cancel.clone(), self.prompt_timeout);
            let result = panic::catch_unwind(AssertUnwindSafe(|| hooke.dispatch(message, &mut io)));
            let exit = io.exit_requested();
            (result, exit, io.into_pending())
        };
        self.cancel.reset();
        let terminal = match result {
            Ok(Ok(())) if exit => EngineMessage::Exit,
            Ok(Ok(())) => EngineMessage::Success,
            Ok(Err(failure)) => {
                log_failure(&message.command, &failure);
                EngineMessage::Failure(failure)
            }
            Err(payload) => {
                let what = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                let failure = Failure::uncaught(format!("panic: {what}"));
                log_failure(&message.command, &failure);
                EngineMessage::Failure(failure)
            }
        };
        sink.send(terminal);
        pending
    }
}

fn log_failure(command: &str, failure: &Failure) {
    match failure {
        Failure::UncaughtException { exception, traceback } => {
            error!(command, %exception, "uncaught exception\n{traceback}");
        }
        other => warn!(command, failure = %other, "command failed"),
    }
}

/// Forwards messages and remembers the terminal one.
struct Recorder<'s, 'l> {
    inner: &'s mut dyn MessageSink,
    last: &'l mut EngineMessage,
}

impl MessageSink for Recorder<'_, '_> {
    fn send(&mut self, message: EngineMessage) {
        if message.is_final() {
            *self.last = message.clone();
        }
        self.inner.send(message);
    }
}

/// UI-side end of an engine running on its own thread.
pub struct EngineHandle {
    tx: Sender<UiMessage>,
    pub rx: Receiver<EngineMessage>,
    cancel: CancelToken,
    handle: JoinHandle<Hooke>,
}

impl EngineHandle {
    pub fn spawn(engine: CommandEngine) -> Self {
        let (tx, inbox) = channel();
        let (out, rx) = channel();
        let cancel = engine.cancel_token();
        let handle = thread::spawn(move || {
            let mut sink = ChannelSink::new(out);
            engine.run(inbox, &mut sink)
        });
        Self { tx, rx, cancel, handle }
    }

    pub fn send(&self, message: CommandMessage) -> bool {
        self.tx.send(UiMessage::Command(message)).is_ok()
    }

    pub fn respond(&self, id: Uuid, value: Value) -> bool {
        self.tx.send(UiMessage::Response { id, value }).is_ok()
    }

    /// Abandon the prompt the running command is waiting on.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the engine and take the state back. `None` if the engine thread
    /// died.
    pub fn close(self) -> Option<Hooke> {
        let _ = self.tx.send(UiMessage::Close);
        self.handle.join().ok()
    }
}
