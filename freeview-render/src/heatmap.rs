use freeview_core::{Footprint, PointerSample, Viewport};
use tiny_skia::{
    Color, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Stroke, Transform,
};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum HeatmapError {
    #[error("viewport {0} has no drawable area")]
    EmptyViewport(Viewport),
    #[error("could not allocate {width}x{height} pixmap")]
    Allocation { width: u32, height: u32 },
    #[error("png encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone)]
pub struct HeatmapStyle {
    /// Output is scaled down so it is never wider than this
    pub max_width: u32,
    /// Kernel radius in viewport pixels
    pub radius: f32,
    pub background: [u8; 3],
    pub outline: [u8; 4],
    pub outline_width: f32,
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self {
            max_width: 960,
            radius: 40.0,
            background: [24, 24, 24],
            outline: [255, 255, 255, 200],
            outline_width: 2.0,
        }
    }
}

/// Renders pointer density over stimulus outlines for one trial
#[derive(Debug, Clone, Default)]
pub struct HeatmapRenderer {
    style: HeatmapStyle,
}

impl HeatmapRenderer {
    pub fn new(style: HeatmapStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &HeatmapStyle {
        &self.style
    }

    /// A trial with no samples still renders: background and outlines only.
    pub fn render(
        &self,
        viewport: Viewport,
        footprints: &[Footprint],
        samples: &[PointerSample],
    ) -> Result<Pixmap, HeatmapError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(HeatmapError::EmptyViewport(viewport));
        }

        let scale = (self.style.max_width as f32 / viewport.width as f32).min(1.0);
        let width = ((viewport.width as f32 * scale).round() as u32).max(1);
        let height = ((viewport.height as f32 * scale).round() as u32).max(1);

        let mut pm = Pixmap::new(width, height).ok_or(HeatmapError::Allocation { width, height })?;
        let [r, g, b] = self.style.background;
        pm.fill(Color::from_rgba8(r, g, b, 255));

        let density = self.density(width, height, scale, samples);
        blend_density(&mut pm, &density);
        self.stroke_outlines(&mut pm, footprints, scale);

        debug!(
            "heatmap {}x{} from {} samples",
            width,
            height,
            samples.len()
        );
        Ok(pm)
    }

    pub fn render_png(
        &self,
        viewport: Viewport,
        footprints: &[Footprint],
        samples: &[PointerSample],
    ) -> Result<Vec<u8>, HeatmapError> {
        self.render(viewport, footprints, samples)?
            .encode_png()
            .map_err(|e| HeatmapError::Encode(e.to_string()))
    }

    /// Gaussian splat per position sample, normalized to [0, 1]
    fn density(&self, width: u32, height: u32, scale: f32, samples: &[PointerSample]) -> Vec<f32> {
        let mut grid = vec![0.0f32; (width * height) as usize];
        let radius = (self.style.radius * scale).max(1.0);
        let two_sigma_sq = 2.0 * (radius / 2.0).powi(2);
        let reach = radius.ceil() as i64;

        for s in samples.iter().filter(|s| !s.is_event()) {
            let cx = s.x * scale;
            let cy = s.y * scale;
            let x0 = (cx.floor() as i64 - reach).max(0);
            let x1 = (cx.floor() as i64 + reach).min(width as i64 - 1);
            let y0 = (cy.floor() as i64 - reach).max(0);
            let y1 = (cy.floor() as i64 + reach).min(height as i64 - 1);

            for y in y0..=y1 {
                for x in x0..=x1 {
                    let dx = x as f32 + 0.5 - cx;
                    let dy = y as f32 + 0.5 - cy;
                    let d2 = dx * dx + dy * dy;
                    if d2 > radius * radius {
                        continue;
                    }
                    grid[y as usize * width as usize + x as usize] += (-d2 / two_sigma_sq).exp();
                }
            }
        }

        let max = grid.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            grid.iter_mut().for_each(|v| *v /= max);
        }
        grid
    }

    fn stroke_outlines(&self, pm: &mut Pixmap, footprints: &[Footprint], scale: f32) {
        let [r, g, b, a] = self.style.outline;
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;
        let stroke = Stroke {
            width: self.style.outline_width,
            ..Stroke::default()
        };

        for f in footprints {
            let Some(rect) =
                Rect::from_xywh(f.x * scale, f.y * scale, f.width * scale, f.height * scale)
            else {
                continue;
            };
            let path = PathBuilder::from_rect(rect);
            pm.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}

/// Blue to red through cyan, green and yellow
fn ramp(t: f32) -> [u8; 3] {
    const STOPS: [[f32; 3]; 5] = [
        [0.0, 0.0, 255.0],
        [0.0, 255.0, 255.0],
        [0.0, 255.0, 0.0],
        [255.0, 255.0, 0.0],
        [255.0, 0.0, 0.0],
    ];
    let t = t.clamp(0.0, 1.0) * (STOPS.len() - 1) as f32;
    let i = (t.floor() as usize).min(STOPS.len() - 2);
    let f = t - i as f32;
    let lerp = |c: usize| (STOPS[i][c] + (STOPS[i + 1][c] - STOPS[i][c]) * f) as u8;
    [lerp(0), lerp(1), lerp(2)]
}

fn blend_density(pm: &mut Pixmap, density: &[f32]) {
    let dst = pm.pixels_mut();
    for (px, &v) in dst.iter_mut().zip(density) {
        if v <= 0.01 {
            continue;
        }
        let [cr, cg, cb] = ramp(v);
        let a_lin = (v * 0.85).clamp(0.0, 1.0);
        let sa = (a_lin * 255.0) as u8;
        let inv = 1.0 - a_lin;

        // Porter-Duff over in premultiplied space
        let r = ((cr as f32 * a_lin) as u8).saturating_add((px.red() as f32 * inv) as u8);
        let g = ((cg as f32 * a_lin) as u8).saturating_add((px.green() as f32 * inv) as u8);
        let b = ((cb as f32 * a_lin) as u8).saturating_add((px.blue() as f32 * inv) as u8);
        let a = sa.saturating_add((px.alpha() as f32 * inv) as u8);

        // Channels never exceed alpha on an opaque background
        if let Some(c) = PremultipliedColorU8::from_rgba(r.min(a), g.min(a), b.min(a), a) {
            *px = c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freeview_core::{Point, Size};

    fn outline() -> Vec<Footprint> {
        vec![Footprint::new(Point::new(100.0, 100.0), Size::new(200, 150))]
    }

    #[test]
    fn no_samples_renders_blank_background() {
        let renderer = HeatmapRenderer::default();
        let pm = renderer
            .render(Viewport::new(640, 480), &[], &[])
            .unwrap();
        assert_eq!((pm.width(), pm.height()), (640, 480));
        let corner = pm.pixel(5, 5).unwrap();
        assert_eq!((corner.red(), corner.green(), corner.blue()), (24, 24, 24));
    }

    #[test]
    fn wide_viewports_are_scaled_down() {
        let renderer = HeatmapRenderer::default();
        let pm = renderer
            .render(Viewport::new(1920, 1080), &outline(), &[])
            .unwrap();
        assert_eq!(pm.width(), 960);
        assert_eq!(pm.height(), 540);
    }

    #[test]
    fn samples_heat_their_neighbourhood() {
        let renderer = HeatmapRenderer::default();
        let samples: Vec<_> = (0..20)
            .map(|i| PointerSample::at(i as f64 * 16.0, 320.0, 240.0))
            .collect();
        let pm = renderer
            .render(Viewport::new(640, 480), &[], &samples)
            .unwrap();
        let hot = pm.pixel(320, 240).unwrap();
        assert!(hot.red() > 200, "{hot:?}");
        let cold = pm.pixel(10, 10).unwrap();
        assert_eq!(cold.red(), 24);
    }

    #[test]
    fn event_tags_do_not_add_heat() {
        let renderer = HeatmapRenderer::default();
        let samples = vec![PointerSample::tagged(0.0, 50.0, 50.0, "trial_start_T1_image")];
        let pm = renderer
            .render(Viewport::new(200, 200), &[], &samples)
            .unwrap();
        assert_eq!(pm.pixel(50, 50).unwrap().red(), 24);
    }

    #[test]
    fn empty_viewport_is_rejected() {
        let renderer = HeatmapRenderer::default();
        assert!(matches!(
            renderer.render(Viewport::new(0, 100), &[], &[]),
            Err(HeatmapError::EmptyViewport(_))
        ));
    }

    #[test]
    fn png_has_signature() {
        let png = HeatmapRenderer::default()
            .render_png(Viewport::new(64, 48), &[], &[])
            .unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
