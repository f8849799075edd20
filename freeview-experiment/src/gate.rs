//! Participant-paced progression between trials.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Escape,
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    Button,
    Key(Key),
}

impl UserInput {
    /// Button, Space and Enter move on; every other key is ignored
    pub fn advances(&self) -> bool {
        matches!(
            self,
            UserInput::Button | UserInput::Key(Key::Space) | UserInput::Key(Key::Enter)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Start,
    NextTrial { next: usize, total: usize },
}

#[async_trait]
pub trait ProgressGate: Send + Sync {
    /// Resolves with the advancing input, or `None` once the input source
    /// is gone.
    async fn wait(&self, prompt: Prompt) -> Option<UserInput>;
}

/// Gate fed through a [`GateHandle`]
#[derive(Debug)]
pub struct ChannelGate {
    rx: Mutex<mpsc::UnboundedReceiver<UserInput>>,
}

#[derive(Debug, Clone)]
pub struct GateHandle {
    tx: mpsc::UnboundedSender<UserInput>,
}

impl GateHandle {
    /// Returns false once the gate has been dropped
    pub fn press(&self, input: UserInput) -> bool {
        self.tx.send(input).is_ok()
    }
}

impl ChannelGate {
    pub fn new() -> (Self, GateHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx: Mutex::new(rx) }, GateHandle { tx })
    }
}

#[async_trait]
impl ProgressGate for ChannelGate {
    async fn wait(&self, prompt: Prompt) -> Option<UserInput> {
        let mut rx = self.rx.lock().await;
        // Input given before the prompt appeared does not count
        while rx.try_recv().is_ok() {}
        debug!("waiting at {prompt:?}");
        loop {
            let input = rx.recv().await?;
            if input.advances() {
                return Some(input);
            }
        }
    }
}

/// Advances immediately, for unattended runs
#[derive(Debug, Default)]
pub struct AutoGate;

#[async_trait]
impl ProgressGate for AutoGate {
    async fn wait(&self, _prompt: Prompt) -> Option<UserInput> {
        Some(UserInput::Button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn ignores_other_keys() {
        let (gate, handle) = ChannelGate::new();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.press(UserInput::Key(Key::Other('x')));
            handle.press(UserInput::Key(Key::Escape));
            handle.press(UserInput::Key(Key::Enter));
        });
        assert_eq!(
            gate.wait(Prompt::Start).await,
            Some(UserInput::Key(Key::Enter))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_input_is_discarded() {
        let (gate, handle) = ChannelGate::new();
        handle.press(UserInput::Button);
        let waiting = tokio::spawn(async move {
            gate.wait(Prompt::NextTrial { next: 2, total: 3 }).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiting.is_finished());
        handle.press(UserInput::Key(Key::Space));
        assert_eq!(waiting.await.unwrap(), Some(UserInput::Key(Key::Space)));
    }

    #[tokio::test]
    async fn closed_gate_yields_none() {
        let (gate, handle) = ChannelGate::new();
        drop(handle);
        assert_eq!(gate.wait(Prompt::Start).await, None);
    }
}
