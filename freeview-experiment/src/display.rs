use async_trait::async_trait;
use freeview_core::{PlacedStimulus, Viewport};
use freeview_render::LayoutResult;
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DisplayError(pub String);

/// What the rendering surface is asked to draw for one trial
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub trial_number: usize,
    pub layout: LayoutResult,
    pub stimuli: Vec<PlacedStimulus>,
}

#[async_trait]
pub trait StimulusDisplay: Send + Sync {
    fn viewport(&self) -> Viewport;
    async fn show(&self, frame: &Frame) -> Result<(), DisplayError>;
    async fn clear(&self);
    /// Status line such as "Ready!" or upload progress
    fn status(&self, _message: &str) {}
}

/// Headless surface with a fixed (but resizable) viewport
#[derive(Debug)]
pub struct NullDisplay {
    viewport: Mutex<Viewport>,
    frames: Mutex<Vec<Frame>>,
}

impl NullDisplay {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Mutex::new(viewport),
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn resize(&self, viewport: Viewport) {
        *self.viewport.lock() = viewport;
    }

    /// Frames shown so far
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }
}

#[async_trait]
impl StimulusDisplay for NullDisplay {
    fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    async fn show(&self, frame: &Frame) -> Result<(), DisplayError> {
        debug!(
            "trial {}: showing {} stimuli at {}x{}",
            frame.trial_number,
            frame.stimuli.len(),
            frame.layout.size.width,
            frame.layout.size.height
        );
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    async fn clear(&self) {}

    fn status(&self, message: &str) {
        debug!("status: {message}");
    }
}
