//! Pressure/tilt-aware stroke rasterizer for the stencil buffer.
//!
//! A stroke is one pointer interaction: `begin` stamps a dot, `extend` draws one
//! round-capped segment per input sample, `end`/`cancel` hands back a
//! [`StrokeCommit`] so the whole gesture becomes a single history entry.

use egui::{Pos2, Rect, pos2};

use crate::components::tools::{EraserSettings, PencilSettings, Tool, ToolsPanel};
use crate::raster::RasterImage;

/// Identifies the pointer that owns a captured gesture.
pub type PointerId = u64;

/// One input reading, already mapped to stencil pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSample {
    pub pos: Pos2,
    /// 0..=1, 0 when the device does not report pressure.
    pub pressure: f32,
    /// Degrees.
    pub tilt_x: f32,
    pub tilt_y: f32,
}

impl StrokeSample {
    /// Sample from a device without pressure or tilt (mouse, touchpad).
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            pos: pos2(x, y),
            pressure: 0.0,
            tilt_x: 0.0,
            tilt_y: 0.0,
        }
    }

    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_tilt(mut self, tilt_x: f32, tilt_y: f32) -> Self {
        self.tilt_x = tilt_x;
        self.tilt_y = tilt_y;
        self
    }

    pub fn tilt(&self) -> f32 {
        self.tilt_x.abs().max(self.tilt_y.abs())
    }
}

/// Zero pressure means "not reported" and reads as half pressure.
pub fn effective_pressure(pressure: f32) -> f32 {
    if pressure <= 0.0 || !pressure.is_finite() {
        0.5
    } else {
        pressure.min(1.0)
    }
}

/// Pencil radius: power-curve pressure response, widened past 20 degrees of tilt.
pub fn pencil_radius(pencil: &PencilSettings, sample: &StrokeSample) -> f32 {
    let p = effective_pressure(sample.pressure);
    let mut radius = (pencil.size * p.powf(1.5) * 2.5).max(0.5);
    let tilt = sample.tilt();
    if tilt > 20.0 {
        radius *= 1.0 + tilt / 90.0;
    }
    radius
}

pub fn eraser_radius(eraser: &EraserSettings, sample: &StrokeSample) -> f32 {
    let p = effective_pressure(sample.pressure);
    (eraser.size + p * 20.0).max(1.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    /// Clears destination alpha by source coverage.
    DestinationOut,
}

/// Mutable paint state shared by every segment of a stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintContext {
    pub composite: Composite,
    pub global_alpha: f32,
    pub color: [u8; 3],
}

impl Default for PaintContext {
    fn default() -> Self {
        Self {
            composite: Composite::SourceOver,
            global_alpha: 1.0,
            color: [0, 0, 0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Brush {
    Pencil(PencilSettings),
    Eraser(EraserSettings),
}

impl Brush {
    fn configure(&self, ctx: &mut PaintContext) {
        match self {
            Brush::Pencil(p) => {
                ctx.composite = Composite::SourceOver;
                ctx.color = p.color;
                ctx.global_alpha = (p.opacity_percent / 100.0).clamp(0.0, 1.0);
            }
            Brush::Eraser(_) => {
                ctx.composite = Composite::DestinationOut;
                ctx.global_alpha = 1.0;
            }
        }
    }

    fn radius(&self, sample: &StrokeSample) -> f32 {
        match self {
            Brush::Pencil(p) => pencil_radius(p, sample),
            Brush::Eraser(e) => eraser_radius(e, sample),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Idle,
    Drawing {
        pointer: PointerId,
        brush: Brush,
        last: Pos2,
        samples: usize,
        bounds: Option<Rect>,
    },
}

/// Emitted when a stroke finishes. The caller snapshots the buffer into history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeCommit {
    pub pointer: PointerId,
    pub tool: Tool,
    pub samples: usize,
    /// Pixel-space area the stroke touched, `None` if it missed the buffer.
    pub bounds: Option<Rect>,
}

#[derive(Debug)]
pub struct StrokeEngine {
    phase: Phase,
    ctx: PaintContext,
}

impl Default for StrokeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeEngine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            ctx: PaintContext::default(),
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.phase, Phase::Drawing { .. })
    }

    /// Pointer holding the capture, if any.
    pub fn captured_pointer(&self) -> Option<PointerId> {
        match self.phase {
            Phase::Drawing { pointer, .. } => Some(pointer),
            Phase::Idle => None,
        }
    }

    pub fn context(&self) -> &PaintContext {
        &self.ctx
    }

    /// Start a stroke and stamp the initial dot. Returns `false` (and does
    /// nothing) unless the active tool paints and no other gesture is captured.
    pub fn begin(
        &mut self,
        pointer: PointerId,
        tools: &ToolsPanel,
        sample: StrokeSample,
        target: &mut RasterImage,
    ) -> bool {
        if self.is_drawing() {
            return false;
        }
        let brush = match tools.active() {
            Tool::Pencil => Brush::Pencil(tools.pencil),
            Tool::Eraser => Brush::Eraser(tools.eraser),
            Tool::None | Tool::Pan => return false,
        };
        self.phase = Phase::Drawing {
            pointer,
            brush,
            last: sample.pos,
            samples: 0,
            bounds: None,
        };
        self.extend(pointer, &[sample], target);
        true
    }

    /// Draw one segment per sample, in order. Samples from a pointer that does
    /// not own the stroke are ignored. Returns how many samples were drawn.
    pub fn extend(&mut self, pointer: PointerId, samples: &[StrokeSample], target: &mut RasterImage) -> usize {
        let Phase::Drawing {
            pointer: owner,
            brush,
            last,
            samples: count,
            bounds,
        } = &mut self.phase
        else {
            return 0;
        };
        if *owner != pointer {
            return 0;
        }

        for sample in samples {
            brush.configure(&mut self.ctx);
            let radius = brush.radius(sample);
            if let Some(touched) = stroke_segment(target, *last, sample.pos, radius, &self.ctx) {
                *bounds = Some(match *bounds {
                    Some(b) => b.union(touched),
                    None => touched,
                });
            }
            *last = sample.pos;
            *count += 1;
        }
        samples.len()
    }

    /// Pointer-up: release capture, reset paint state, report the commit.
    pub fn end(&mut self, pointer: PointerId) -> Option<StrokeCommit> {
        let Phase::Drawing {
            pointer: owner,
            brush,
            samples,
            bounds,
            ..
        } = self.phase
        else {
            return None;
        };
        if owner != pointer {
            return None;
        }
        self.phase = Phase::Idle;
        self.ctx.global_alpha = 1.0;
        self.ctx.composite = Composite::SourceOver;
        Some(StrokeCommit {
            pointer,
            tool: match brush {
                Brush::Pencil(_) => Tool::Pencil,
                Brush::Eraser(_) => Tool::Eraser,
            },
            samples,
            bounds,
        })
    }

    /// Pointer-cancel. Whatever was already drawn is kept and committed.
    pub fn cancel(&mut self, pointer: PointerId) -> Option<StrokeCommit> {
        self.end(pointer)
    }

    /// Drop any in-progress stroke without reporting it (buffer replaced underneath).
    pub fn abandon(&mut self) {
        self.phase = Phase::Idle;
        self.ctx.global_alpha = 1.0;
        self.ctx.composite = Composite::SourceOver;
    }
}

/// Rasterize a round-capped segment of the given radius. Coverage falls off
/// over one pixel at the edge. Returns the clipped pixel rect that was visited.
pub fn stroke_segment(
    target: &mut RasterImage,
    from: Pos2,
    to: Pos2,
    radius: f32,
    ctx: &PaintContext,
) -> Option<Rect> {
    let (w, h) = target.dimensions();
    if w == 0 || h == 0 || radius <= 0.0 {
        return None;
    }

    let reach = radius + 1.0;
    let min_x = (from.x.min(to.x) - reach).floor().max(0.0) as u32;
    let min_y = (from.y.min(to.y) - reach).floor().max(0.0) as u32;
    let max_x = (from.x.max(to.x) + reach).ceil().min(w as f32);
    let max_y = (from.y.max(to.y) + reach).ceil().min(h as f32);
    if max_x <= min_x as f32 || max_y <= min_y as f32 {
        return None;
    }
    let (max_x, max_y) = (max_x as u32, max_y as u32);

    let seg = to - from;
    let len_sq = seg.length_sq();
    let pixels = target.pixels_mut();

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = pos2(x as f32 + 0.5, y as f32 + 0.5);
            let t = if len_sq > f32::EPSILON {
                ((p - from).dot(seg) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dist = p.distance(from + seg * t);
            let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let px = pixels.get_pixel_mut(x, y);
            px.0 = composite(px.0, coverage, ctx);
        }
    }

    Some(Rect::from_min_max(
        pos2(min_x as f32, min_y as f32),
        pos2(max_x as f32, max_y as f32),
    ))
}

fn composite(dst: [u8; 4], coverage: f32, ctx: &PaintContext) -> [u8; 4] {
    let sa = coverage * ctx.global_alpha;
    let da = dst[3] as f32 / 255.0;
    match ctx.composite {
        Composite::DestinationOut => {
            let out_a = da * (1.0 - sa);
            [dst[0], dst[1], dst[2], (out_a * 255.0).round() as u8]
        }
        Composite::SourceOver => {
            let out_a = sa + da * (1.0 - sa);
            if out_a <= 0.0 {
                return dst;
            }
            let mix = |s: u8, d: u8| {
                ((s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a)
                    .round()
                    .clamp(0.0, 255.0) as u8
            };
            [
                mix(ctx.color[0], dst[0]),
                mix(ctx.color[1], dst[1]),
                mix(ctx.color[2], dst[2]),
                (out_a * 255.0).round() as u8,
            ]
        }
    }
}
