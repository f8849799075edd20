use freeview_core::PointerSample;
use parking_lot::Mutex;

/// Pointer tracking. Only the sequencer toggles it; input sources push
/// samples from anywhere.
pub trait PointerCapture: Send + Sync {
    fn enable(&self);
    fn disable(&self);
    fn is_enabled(&self) -> bool;
    /// Appends a tagged milestone at the last known pointer position.
    /// Ignored while disabled.
    fn mark(&self, timestamp_ms: f64, tag: &str);
    /// Takes every buffered sample, leaving the buffer empty
    fn drain(&self) -> Vec<PointerSample>;
    /// Ends a trial: appends the closing milestone even if capture was
    /// already disabled, then disables and drains in one step.
    fn close(&self, timestamp_ms: f64, tag: &str) -> Vec<PointerSample>;
}

/// Capture that records nothing
#[derive(Debug, Default)]
pub struct NoopCapture;

impl PointerCapture for NoopCapture {
    fn enable(&self) {}
    fn disable(&self) {}
    fn is_enabled(&self) -> bool {
        false
    }
    fn mark(&self, _timestamp_ms: f64, _tag: &str) {}
    fn drain(&self) -> Vec<PointerSample> {
        Vec::new()
    }
    fn close(&self, _timestamp_ms: f64, _tag: &str) -> Vec<PointerSample> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    enabled: bool,
    last: (f32, f32),
    samples: Vec<PointerSample>,
}

/// In-memory capture buffer. Flag and buffer share one lock, so a drain
/// never races a push across a trial boundary.
#[derive(Debug, Default)]
pub struct BufferedCapture {
    state: Mutex<CaptureState>,
}

impl BufferedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pointer position. Returns false (and drops the sample)
    /// while capture is disabled; the position is still remembered.
    pub fn push(&self, timestamp_ms: f64, x: f32, y: f32) -> bool {
        let mut state = self.state.lock();
        state.last = (x, y);
        if !state.enabled {
            return false;
        }
        state.samples.push(PointerSample::at(timestamp_ms, x, y));
        true
    }

    pub fn buffered(&self) -> usize {
        self.state.lock().samples.len()
    }
}

impl PointerCapture for BufferedCapture {
    fn enable(&self) {
        self.state.lock().enabled = true;
    }

    fn disable(&self) {
        self.state.lock().enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    fn mark(&self, timestamp_ms: f64, tag: &str) {
        let mut state = self.state.lock();
        if state.enabled {
            let (x, y) = state.last;
            state
                .samples
                .push(PointerSample::tagged(timestamp_ms, x, y, tag));
        }
    }

    fn drain(&self) -> Vec<PointerSample> {
        std::mem::take(&mut self.state.lock().samples)
    }

    fn close(&self, timestamp_ms: f64, tag: &str) -> Vec<PointerSample> {
        let mut state = self.state.lock();
        state.enabled = false;
        let (x, y) = state.last;
        state
            .samples
            .push(PointerSample::tagged(timestamp_ms, x, y, tag));
        std::mem::take(&mut state.samples)
    }
}
