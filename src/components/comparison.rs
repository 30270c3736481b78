//! Before/after comparison of the original photo and the editable stencil.
//!
//! The surface owns only presentation state (mode, divider, opacity, zoom,
//! scroll) and the current pointer gesture. It never holds pixels: it lays out
//! two read-only views of buffers owned by the session and reports what a
//! pointer gesture means as a [`SurfaceEvent`].

use egui::{Pos2, Rect, Vec2, pos2, vec2};

use crate::components::stroke::{PointerId, StrokeSample};
use crate::components::tools::Tool;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;

/// Screen width of the divider line.
pub const DIVIDER_WIDTH: f32 = 4.0;
/// Screen diameter of the divider grip.
pub const GRIP_SIZE: f32 = 32.0;
/// Extra screen pixels either side of the divider that still grab it.
const DIVIDER_GRAB_SLOP: f32 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Split,
    Overlay,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub mode: ViewMode,
    /// 0-100, percent of the stack width showing the stencil.
    pub split_position: f32,
    /// 0-100, applied to whichever layer is on top in overlay mode.
    pub overlay_opacity: f32,
    pub stencil_on_top: bool,
    pub zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            mode: ViewMode::Split,
            split_position: 50.0,
            overlay_opacity: 50.0,
            stencil_on_top: false,
            zoom: 1.0,
        }
    }
}

/// The single gesture the surface is tracking. Mutually exclusive by construction.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Interaction {
    #[default]
    None,
    Drawing {
        pointer: PointerId,
    },
    Panning {
        pointer: PointerId,
        start: Pos2,
        start_scroll: Vec2,
    },
    Sliding {
        pointer: PointerId,
    },
}

impl Interaction {
    pub fn pointer(&self) -> Option<PointerId> {
        match *self {
            Interaction::None => None,
            Interaction::Drawing { pointer }
            | Interaction::Panning { pointer, .. }
            | Interaction::Sliding { pointer } => Some(pointer),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Original,
    Stencil,
}

/// Where and how one layer is drawn this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerPlacement {
    pub layer: Layer,
    /// Screen rect of the image content (object-contain inside the stack).
    pub rect: Rect,
    /// Screen clip, in the stack's box.
    pub clip: Rect,
    /// 0..=1
    pub opacity: f32,
    pub interactive: bool,
}

/// What a pointer gesture means to the session. Stroke samples are already in
/// stencil pixel space.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    BeginStroke { pointer: PointerId, sample: StrokeSample },
    ExtendStroke { pointer: PointerId, samples: Vec<StrokeSample> },
    EndStroke { pointer: PointerId },
    Panned { scroll: Vec2 },
    SplitMoved(f32),
}

#[derive(Clone, Debug)]
pub struct ComparisonSurface {
    view: ViewState,
    interaction: Interaction,
    scroll: Vec2,
    viewport: Rect,
    image_size: Vec2,
    seen_generation: u64,
}

impl Default for ComparisonSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonSurface {
    pub fn new() -> Self {
        Self {
            view: ViewState::default(),
            interaction: Interaction::None,
            scroll: Vec2::ZERO,
            viewport: Rect::NOTHING,
            image_size: Vec2::ZERO,
            seen_generation: 0,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.view.mode = mode;
    }

    pub fn set_split_position(&mut self, percent: f32) {
        self.view.split_position = clamp_percent(percent);
    }

    pub fn set_overlay_opacity(&mut self, percent: f32) {
        self.view.overlay_opacity = clamp_percent(percent);
    }

    pub fn set_stencil_on_top(&mut self, on_top: bool) {
        self.view.stencil_on_top = on_top;
    }

    /// Swap z-order in overlay mode. Pixels are not touched.
    pub fn swap_layers(&mut self) {
        self.view.stencil_on_top = !self.view.stencil_on_top;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.view.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        self.scroll = self.clamp_scroll(self.scroll);
    }

    /// Called with the session's generation counter every frame. A new value
    /// restores the default before/after split. Zoom is kept.
    pub fn on_generation(&mut self, counter: u64) -> bool {
        if counter == 0 || counter == self.seen_generation {
            return false;
        }
        self.seen_generation = counter;
        self.view.mode = ViewMode::Split;
        self.view.split_position = 50.0;
        self.view.stencil_on_top = false;
        true
    }

    /// Update the on-screen container and the stencil buffer size.
    pub fn set_viewport(&mut self, viewport: Rect, image_size: [u32; 2]) {
        self.viewport = viewport;
        self.image_size = vec2(image_size[0] as f32, image_size[1] as f32);
        self.scroll = self.clamp_scroll(self.scroll);
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    // ========================================================================
    // LAYOUT
    // ========================================================================

    /// The layered stack: container-sized, scaled by zoom about its top-left,
    /// shifted by the scroll offset.
    pub fn stack_rect(&self) -> Rect {
        Rect::from_min_size(self.viewport.min - self.scroll, self.viewport.size() * self.view.zoom)
    }

    /// Image content rect, fitted inside the stack without distortion.
    pub fn image_rect(&self) -> Rect {
        let stack = self.stack_rect();
        if self.image_size.x <= 0.0 || self.image_size.y <= 0.0 {
            return Rect::from_min_size(stack.min, Vec2::ZERO);
        }
        let scale = (stack.width() / self.image_size.x).min(stack.height() / self.image_size.y);
        let size = self.image_size * scale;
        Rect::from_center_size(stack.center(), size)
    }

    pub fn divider_x(&self) -> f32 {
        let stack = self.stack_rect();
        stack.min.x + stack.width() * self.view.split_position / 100.0
    }

    pub fn stencil_clip(&self) -> Rect {
        let stack = self.stack_rect();
        Rect::from_min_max(stack.min, pos2(self.divider_x(), stack.max.y))
    }

    pub fn original_clip(&self) -> Rect {
        let stack = self.stack_rect();
        Rect::from_min_max(pos2(self.divider_x(), stack.min.y), stack.max)
    }

    /// Divider line. Screen-constant width at any zoom.
    pub fn divider_rect(&self) -> Rect {
        let stack = self.stack_rect();
        Rect::from_center_size(
            pos2(self.divider_x(), stack.center().y),
            vec2(DIVIDER_WIDTH, stack.height()),
        )
    }

    /// Round grip in the middle of the divider. Screen-constant size at any zoom.
    pub fn grip_rect(&self) -> Rect {
        Rect::from_center_size(self.divider_rect().center(), Vec2::splat(GRIP_SIZE))
    }

    fn hits_divider(&self, pos: Pos2) -> bool {
        self.view.mode == ViewMode::Split
            && (self.divider_rect().expand2(vec2(DIVIDER_GRAB_SLOP, 0.0)).contains(pos)
                || self.grip_rect().contains(pos))
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> [LayerPlacement; 2] {
        let rect = self.image_rect();
        let stack = self.stack_rect();
        match self.view.mode {
            ViewMode::Split => [
                LayerPlacement {
                    layer: Layer::Original,
                    rect,
                    clip: self.original_clip(),
                    opacity: 1.0,
                    interactive: false,
                },
                LayerPlacement {
                    layer: Layer::Stencil,
                    rect,
                    clip: self.stencil_clip(),
                    opacity: 1.0,
                    interactive: true,
                },
            ],
            ViewMode::Overlay => {
                let (bottom, top) = if self.view.stencil_on_top {
                    (Layer::Original, Layer::Stencil)
                } else {
                    (Layer::Stencil, Layer::Original)
                };
                [
                    LayerPlacement {
                        layer: bottom,
                        rect,
                        clip: stack,
                        opacity: 1.0,
                        interactive: false,
                    },
                    LayerPlacement {
                        layer: top,
                        rect,
                        clip: stack,
                        opacity: self.view.overlay_opacity / 100.0,
                        interactive: top == Layer::Stencil,
                    },
                ]
            }
        }
    }

    /// Region where a pointer-down may start a stroke.
    fn drawable_rect(&self) -> Option<Rect> {
        self.layers()
            .iter()
            .find(|p| p.layer == Layer::Stencil && p.interactive)
            .map(|p| p.rect.intersect(p.clip))
            .filter(|r| r.is_positive())
    }

    /// Screen position to stencil pixel coordinates.
    pub fn display_to_image(&self, screen: Pos2) -> Pos2 {
        let rect = self.image_rect();
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Pos2::ZERO;
        }
        let scale = vec2(self.image_size.x / rect.width(), self.image_size.y / rect.height());
        let local = screen - rect.min;
        pos2(local.x * scale.x, local.y * scale.y)
    }

    fn to_image_sample(&self, sample: &StrokeSample) -> StrokeSample {
        StrokeSample {
            pos: self.display_to_image(sample.pos),
            ..*sample
        }
    }

    fn max_scroll(&self) -> Vec2 {
        (self.viewport.size() * self.view.zoom - self.viewport.size()).max(Vec2::ZERO)
    }

    fn clamp_scroll(&self, scroll: Vec2) -> Vec2 {
        if !self.viewport.is_positive() {
            return Vec2::ZERO;
        }
        scroll.clamp(Vec2::ZERO, self.max_scroll())
    }

    fn split_from_x(&self, x: f32) -> f32 {
        let stack = self.stack_rect();
        if stack.width() <= 0.0 {
            return self.view.split_position;
        }
        clamp_percent((x - stack.min.x) / stack.width() * 100.0)
    }

    // ========================================================================
    // POINTER ROUTING
    // ========================================================================

    /// Pointer-down in screen space. Captures the pointer for the gesture it starts.
    pub fn pointer_down(&mut self, pointer: PointerId, sample: StrokeSample, tool: Tool) -> Option<SurfaceEvent> {
        if self.interaction != Interaction::None || !self.viewport.contains(sample.pos) {
            return None;
        }

        if self.hits_divider(sample.pos) {
            self.interaction = Interaction::Sliding { pointer };
            let pos = self.split_from_x(sample.pos.x);
            self.view.split_position = pos;
            return Some(SurfaceEvent::SplitMoved(pos));
        }

        match tool {
            Tool::Pan => {
                self.interaction = Interaction::Panning {
                    pointer,
                    start: sample.pos,
                    start_scroll: self.scroll,
                };
                None
            }
            Tool::Pencil | Tool::Eraser => {
                let region = self.drawable_rect()?;
                if !region.contains(sample.pos) {
                    return None;
                }
                self.interaction = Interaction::Drawing { pointer };
                Some(SurfaceEvent::BeginStroke {
                    pointer,
                    sample: self.to_image_sample(&sample),
                })
            }
            Tool::None => None,
        }
    }

    /// Pointer-move with every coalesced sample, oldest first.
    pub fn pointer_move(&mut self, pointer: PointerId, samples: &[StrokeSample]) -> Option<SurfaceEvent> {
        if self.interaction.pointer() != Some(pointer) {
            return None;
        }
        let latest = samples.last()?;
        match self.interaction {
            Interaction::Drawing { .. } => Some(SurfaceEvent::ExtendStroke {
                pointer,
                samples: samples.iter().map(|s| self.to_image_sample(s)).collect(),
            }),
            Interaction::Panning {
                start, start_scroll, ..
            } => {
                let scroll = self.clamp_scroll(start_scroll - (latest.pos - start));
                self.scroll = scroll;
                Some(SurfaceEvent::Panned { scroll })
            }
            Interaction::Sliding { .. } => {
                let pos = self.split_from_x(latest.pos.x);
                self.view.split_position = pos;
                Some(SurfaceEvent::SplitMoved(pos))
            }
            Interaction::None => None,
        }
    }

    /// Pointer-up releases capture. Only a stroke reports anything.
    pub fn pointer_up(&mut self, pointer: PointerId) -> Option<SurfaceEvent> {
        if self.interaction.pointer() != Some(pointer) {
            return None;
        }
        let was = std::mem::take(&mut self.interaction);
        match was {
            Interaction::Drawing { pointer } => Some(SurfaceEvent::EndStroke { pointer }),
            _ => None,
        }
    }

    pub fn pointer_cancel(&mut self, pointer: PointerId) -> Option<SurfaceEvent> {
        self.pointer_up(pointer)
    }

    /// Drop any captured gesture without reporting it.
    pub fn release(&mut self) {
        self.interaction = Interaction::None;
    }
}

fn clamp_percent(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(image: [u32; 2]) -> ComparisonSurface {
        let mut s = ComparisonSurface::new();
        s.set_viewport(Rect::from_min_size(pos2(100.0, 50.0), vec2(400.0, 400.0)), image);
        s
    }

    fn at(x: f32, y: f32) -> StrokeSample {
        StrokeSample::at(x, y)
    }

    #[test]
    fn split_clips_match_position() {
        let mut s = surface([800, 800]);
        s.set_split_position(30.0);
        let [original, stencil] = s.layers();
        assert_eq!(stencil.layer, Layer::Stencil);
        assert_eq!(original.layer, Layer::Original);
        assert!((stencil.clip.width() - 120.0).abs() < 1e-3);
        assert!((original.clip.width() - 280.0).abs() < 1e-3);
        assert_eq!(stencil.clip.min.x, 100.0);
        assert_eq!(original.clip.max.x, 500.0);
        assert_eq!(stencil.clip.max.x, original.clip.min.x);
    }

    #[test]
    fn split_position_is_clamped() {
        let mut s = surface([10, 10]);
        s.set_split_position(140.0);
        assert_eq!(s.view().split_position, 100.0);
        s.set_split_position(-1.0);
        assert_eq!(s.view().split_position, 0.0);
    }

    #[test]
    fn new_generation_restores_split_view() {
        let mut s = surface([10, 10]);
        assert!(!s.on_generation(0));
        s.set_mode(ViewMode::Overlay);
        s.set_split_position(80.0);
        s.set_stencil_on_top(true);
        s.set_zoom(3.0);
        assert!(s.on_generation(1));
        assert_eq!(s.view().mode, ViewMode::Split);
        assert_eq!(s.view().split_position, 50.0);
        assert!(!s.view().stencil_on_top);
        assert_eq!(s.view().zoom, 3.0);
        s.set_mode(ViewMode::Overlay);
        assert!(!s.on_generation(1));
        assert_eq!(s.view().mode, ViewMode::Overlay);
    }

    #[test]
    fn zoom_never_reaches_zero() {
        let mut s = surface([10, 10]);
        s.set_zoom(0.0);
        assert_eq!(s.view().zoom, MIN_ZOOM);
        s.set_zoom(25.0);
        assert_eq!(s.view().zoom, MAX_ZOOM);
    }

    #[test]
    fn divider_handle_stays_screen_sized() {
        let mut s = surface([10, 10]);
        let at_one = (s.divider_rect().width(), s.grip_rect().size());
        s.set_zoom(4.0);
        assert_eq!((s.divider_rect().width(), s.grip_rect().size()), at_one);
        assert!((s.divider_x() - (100.0 + 1600.0 * 0.5)).abs() < 1e-3);
    }

    #[test]
    fn display_maps_to_buffer_resolution() {
        let mut s = surface([1000, 500]);
        // 400x400 stack, 1000x500 image fits as 400x200 centered vertically.
        assert_eq!(s.image_rect(), Rect::from_min_size(pos2(100.0, 150.0), vec2(400.0, 200.0)));
        assert_eq!(s.display_to_image(pos2(300.0, 250.0)), pos2(500.0, 250.0));
        // 800x800 stack, image 800x400 starting at y = 250.
        s.set_zoom(2.0);
        assert_eq!(s.display_to_image(pos2(300.0, 350.0)), pos2(250.0, 125.0));
    }

    #[test]
    fn pan_subtracts_drag_from_scroll() {
        let mut s = surface([100, 100]);
        s.set_zoom(2.0);
        assert_eq!(s.pointer_down(1, at(300.0, 300.0), Tool::Pan), None);
        let ev = s.pointer_move(1, &[at(280.0, 290.0), at(250.0, 260.0)]);
        assert_eq!(ev, Some(SurfaceEvent::Panned { scroll: vec2(50.0, 40.0) }));
        // Dragging the other way past the origin clamps at zero.
        s.pointer_move(1, &[at(500.0, 500.0)]);
        assert_eq!(s.scroll(), Vec2::ZERO);
        assert_eq!(s.pointer_up(1), None);
        assert_eq!(s.interaction(), Interaction::None);
    }

    #[test]
    fn pan_tool_never_starts_a_stroke() {
        let mut s = surface([100, 100]);
        s.pointer_down(1, at(150.0, 200.0), Tool::Pan);
        assert!(matches!(s.interaction(), Interaction::Panning { .. }));
        let mut idle = surface([100, 100]);
        assert_eq!(idle.pointer_down(1, at(150.0, 200.0), Tool::None), None);
        assert_eq!(idle.interaction(), Interaction::None);
    }

    #[test]
    fn split_drawing_is_limited_to_stencil_side() {
        let mut s = surface([400, 400]);
        assert_eq!(s.pointer_down(1, at(450.0, 200.0), Tool::Pencil), None);
        let ev = s.pointer_down(1, at(150.0, 200.0), Tool::Pencil);
        match ev {
            Some(SurfaceEvent::BeginStroke { pointer, sample }) => {
                assert_eq!(pointer, 1);
                assert_eq!(sample.pos, pos2(50.0, 150.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        // Capture continues past the clip edge.
        let ev = s.pointer_move(1, &[at(420.0, 200.0), at(460.0, 210.0)]);
        let Some(SurfaceEvent::ExtendStroke { samples, .. }) = ev else {
            panic!("expected stroke samples");
        };
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].pos, pos2(360.0, 160.0));
        assert_eq!(s.pointer_up(2), None);
        assert_eq!(s.pointer_up(1), Some(SurfaceEvent::EndStroke { pointer: 1 }));
    }

    #[test]
    fn overlay_draws_only_when_stencil_is_on_top() {
        let mut s = surface([400, 400]);
        s.set_mode(ViewMode::Overlay);
        s.set_overlay_opacity(70.0);
        assert_eq!(s.pointer_down(1, at(200.0, 200.0), Tool::Eraser), None);
        let [bottom, top] = s.layers();
        assert_eq!((bottom.layer, bottom.opacity), (Layer::Stencil, 1.0));
        assert_eq!(top.layer, Layer::Original);
        assert!((top.opacity - 0.7).abs() < 1e-6);

        s.swap_layers();
        let [_, top] = s.layers();
        assert!(top.interactive && top.layer == Layer::Stencil);
        assert!(matches!(
            s.pointer_down(1, at(200.0, 200.0), Tool::Eraser),
            Some(SurfaceEvent::BeginStroke { .. })
        ));
    }

    #[test]
    fn divider_drag_wins_over_tools() {
        let mut s = surface([400, 400]);
        let ev = s.pointer_down(4, at(302.0, 250.0), Tool::Pencil);
        assert!(matches!(ev, Some(SurfaceEvent::SplitMoved(_))));
        assert_eq!(s.pointer_move(4, &[at(200.0, 10.0)]), Some(SurfaceEvent::SplitMoved(25.0)));
        assert_eq!(s.pointer_move(4, &[at(900.0, 10.0)]), Some(SurfaceEvent::SplitMoved(100.0)));
        assert_eq!(s.pointer_up(4), None);
        assert_eq!(s.view().split_position, 100.0);
    }

    #[test]
    fn second_pointer_is_ignored_while_captured() {
        let mut s = surface([400, 400]);
        s.pointer_down(1, at(150.0, 200.0), Tool::Pencil);
        assert_eq!(s.pointer_down(2, at(160.0, 200.0), Tool::Pencil), None);
        assert_eq!(s.pointer_move(2, &[at(170.0, 200.0)]), None);
    }
}
