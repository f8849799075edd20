//! Stimulus placement for the four-quadrant display.
//!
//! [`place`] sizes the stimuli from the viewport, anchors one footprint per
//! quadrant slightly inward of the true quadrant centre, and then checks all
//! six footprint pairs. A layout that overlaps or leaves the viewport is
//! discarded in favour of a small fixed-size fallback derived from the
//! viewport alone.

use freeview_core::{Footprint, Point, Quadrant, Size, Viewport};
use tracing::{debug, warn};

/// Fraction of viewport width / height given to one stimulus
pub const SIZE_RATIO_PERCENT: (u32, u32) = (25, 32);
pub const MIN_SIZE: Size = Size::new(250, 180);
pub const MAX_SIZE: Size = Size::new(500, 380);
/// Target width:height
pub const ASPECT: (u32, u32) = (380, 260);
/// How far anchors are pulled from the viewport centre toward the true
/// quadrant centre (1.0 = quadrant centre)
pub const INWARD_PULL: f32 = 0.7;
pub const EDGE_MARGIN: f32 = 20.0;
pub const SAFETY_MARGIN: f32 = 10.0;
pub const FALLBACK_SIZE: Size = Size::new(120, 80);
/// Smallest viewport for which the fallback is guaranteed overlap-free
pub const MIN_VIEWPORT: Viewport = Viewport::new(320, 240);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub viewport: Viewport,
    pub size: Size,
    /// Top-left corners, indexed by [`Quadrant::index`]
    pub positions: [Point; 4],
    pub mode: LayoutMode,
}

impl LayoutResult {
    pub fn position(&self, quadrant: Quadrant) -> Point {
        self.positions[quadrant.index()]
    }

    pub fn footprint(&self, quadrant: Quadrant) -> Footprint {
        Footprint::new(self.position(quadrant), self.size)
    }

    pub fn footprints(&self) -> [(Quadrant, Footprint); 4] {
        Quadrant::ALL.map(|q| (q, self.footprint(q)))
    }

    pub fn overlapping_pairs(&self) -> Vec<(Quadrant, Quadrant)> {
        let footprints = self.footprints();
        let mut pairs = Vec::new();
        for (i, (qa, a)) in footprints.iter().enumerate() {
            for (qb, b) in &footprints[i + 1..] {
                if a.overlaps(b, SAFETY_MARGIN) {
                    pairs.push((*qa, *qb));
                }
            }
        }
        pairs
    }

    pub fn is_within_viewport(&self) -> bool {
        self.footprints()
            .iter()
            .all(|(_, f)| f.is_within(self.viewport))
    }

    pub fn is_fallback(&self) -> bool {
        self.mode == LayoutMode::Fallback
    }
}

pub fn place(viewport: Viewport) -> LayoutResult {
    let size = stimulus_size(viewport);
    let primary = LayoutResult {
        viewport,
        size,
        positions: anchored_positions(viewport, size),
        mode: LayoutMode::Primary,
    };

    let overlaps = primary.overlapping_pairs();
    if overlaps.is_empty() && primary.is_within_viewport() {
        debug!(
            "layout {}: {}x{} stimuli at {:?}",
            viewport, size.width, size.height, primary.positions
        );
        return primary;
    }

    warn!(
        "layout {}: primary placement rejected ({} overlapping pairs), using fallback",
        viewport,
        overlaps.len()
    );
    fallback(viewport)
}

/// Stimulus size for a viewport: proportional, clamped, then shrunk along
/// the longer side to the target aspect.
pub fn stimulus_size(viewport: Viewport) -> Size {
    let mut width = (viewport.width * SIZE_RATIO_PERCENT.0 / 100).clamp(MIN_SIZE.width, MAX_SIZE.width);
    let mut height =
        (viewport.height * SIZE_RATIO_PERCENT.1 / 100).clamp(MIN_SIZE.height, MAX_SIZE.height);

    if width * ASPECT.1 > height * ASPECT.0 {
        width = height * ASPECT.0 / ASPECT.1;
    } else {
        height = width * ASPECT.1 / ASPECT.0;
    }
    Size::new(width, height)
}

fn anchored_positions(viewport: Viewport, size: Size) -> [Point; 4] {
    let (cx, cy) = viewport.center();
    let dx = cx * INWARD_PULL * 0.5;
    let dy = cy * INWARD_PULL * 0.5;
    let (w, h) = (size.width as f32, size.height as f32);
    let max_x = viewport.width as f32 - w - EDGE_MARGIN;
    let max_y = viewport.height as f32 - h - EDGE_MARGIN;

    Quadrant::ALL.map(|q| {
        let anchor_x = if q.is_left() { cx - dx } else { cx + dx };
        let anchor_y = if q.is_top() { cy - dy } else { cy + dy };
        Point::new(
            (anchor_x - w / 2.0).min(max_x).max(EDGE_MARGIN),
            (anchor_y - h / 2.0).min(max_y).max(EDGE_MARGIN),
        )
    })
}

/// Quadrant-centre placement at [`FALLBACK_SIZE`]
pub fn fallback(viewport: Viewport) -> LayoutResult {
    let (cx, cy) = viewport.center();
    let half_w = FALLBACK_SIZE.width as f32 / 2.0;
    let half_h = FALLBACK_SIZE.height as f32 / 2.0;

    let positions = Quadrant::ALL.map(|q| {
        let centre_x = if q.is_left() { cx / 2.0 } else { cx + cx / 2.0 };
        let centre_y = if q.is_top() { cy / 2.0 } else { cy + cy / 2.0 };
        Point::new(
            (centre_x - half_w).floor().max(0.0),
            (centre_y - half_h).floor().max(0.0),
        )
    });

    LayoutResult {
        viewport,
        size: FALLBACK_SIZE,
        positions,
        mode: LayoutMode::Fallback,
    }
}

/// Remembers the last viewport and flags resizes large enough to warrant
/// recomputing the layout before the next display.
#[derive(Debug, Clone)]
pub struct LayoutTracker {
    last: Viewport,
    threshold: u32,
}

impl LayoutTracker {
    pub fn new(initial: Viewport) -> Self {
        Self {
            last: initial,
            threshold: 100,
        }
    }

    pub fn current(&self) -> Viewport {
        self.last
    }

    /// Returns true (and records the new viewport) when either dimension
    /// moved by more than 100 px.
    pub fn observe(&mut self, viewport: Viewport) -> bool {
        let significant = self.last.width.abs_diff(viewport.width) > self.threshold
            || self.last.height.abs_diff(viewport.height) > self.threshold;
        if significant {
            debug!("viewport changed {} -> {}", self.last, viewport);
            self.last = viewport;
        }
        significant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALIBRATION: [(u32, u32); 7] = [
        (375, 667),
        (667, 375),
        (768, 1024),
        (1024, 768),
        (1280, 720),
        (1920, 1080),
        (2560, 1440),
    ];

    #[test]
    fn calibration_viewports_never_overlap() {
        for (w, h) in CALIBRATION {
            let layout = place(Viewport::new(w, h));
            assert!(
                layout.overlapping_pairs().is_empty(),
                "{w}x{h}: {:?}",
                layout.overlapping_pairs()
            );
            assert!(layout.is_within_viewport(), "{w}x{h}");
        }
    }

    #[test]
    fn desktop_sizes_use_primary_layout() {
        let layout = place(Viewport::new(1920, 1080));
        assert_eq!(layout.mode, LayoutMode::Primary);
        assert_eq!(layout.size, Size::new(480, 328));
        assert_eq!(layout.position(Quadrant::TopLeft), Point::new(384.0, 187.0));

        let layout = place(Viewport::new(1024, 768));
        assert_eq!(layout.mode, LayoutMode::Primary);
        assert_eq!(layout.size, Size::new(256, 175));
    }

    #[test]
    fn narrow_phone_falls_back() {
        let layout = place(Viewport::new(375, 667));
        assert_eq!(layout.mode, LayoutMode::Fallback);
        assert_eq!(layout.size, FALLBACK_SIZE);
        assert_eq!(layout.position(Quadrant::TopLeft), Point::new(33.0, 126.0));
        assert_eq!(layout.position(Quadrant::BottomRight), Point::new(221.0, 460.0));
    }

    #[test]
    fn size_respects_bounds_and_aspect() {
        let size = stimulus_size(Viewport::new(2560, 1440));
        assert_eq!(size, Size::new(500, 342));
        let size = stimulus_size(Viewport::new(320, 240));
        assert!(size.width >= 250 || size.height >= 180);
        assert!(size.width * ASPECT.1 <= size.height * ASPECT.0 + ASPECT.0);
    }

    #[test]
    fn fallback_never_negative() {
        let layout = fallback(Viewport::new(100, 60));
        assert!(layout.positions.iter().all(|p| p.x >= 0.0 && p.y >= 0.0));
    }

    #[test]
    fn tracker_ignores_small_resizes() {
        let mut tracker = LayoutTracker::new(Viewport::new(1280, 720));
        assert!(!tracker.observe(Viewport::new(1300, 760)));
        assert!(tracker.observe(Viewport::new(1920, 760)));
        assert_eq!(tracker.current(), Viewport::new(1920, 760));
    }
}
