use std::sync::Arc;

use chrono::TimeZone;
use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, TextureHandle, TextureOptions, Vec2, pos2};

use crate::components::comparison::{Layer, MAX_ZOOM, MIN_ZOOM, ViewMode};
use crate::components::history;
use crate::components::stroke::{PointerId, StrokeSample};
use crate::components::tools::{ERASER_SIZE_RANGE, PENCIL_OPACITY_RANGE, PENCIL_SIZE_RANGE, Tool};
use crate::io;
use crate::ops::generate::{self, StencilGenerator};
use crate::raster::RasterImage;
use crate::session::{SessionController, SessionPhase};
use crate::settings::{AppSettings, Backend};
use crate::store::{JsonFileStore, MemoryStore, WorkStore};
use crate::styles::ColorStyle;

/// Mouse gestures. Touch ids are shifted up by one so they never collide.
const MOUSE_POINTER: PointerId = 0;

const ACCENT: Color32 = Color32::from_rgb(220, 38, 38);
const DIVIDER: Color32 = Color32::from_rgb(239, 68, 68);
const STAGE_BG: Color32 = Color32::from_rgb(24, 24, 27);

/// GPU copy of one layer, refreshed when its revision moves.
struct LayerTexture {
    handle: Option<TextureHandle>,
    revision: u64,
}

impl LayerTexture {
    fn new() -> Self {
        Self {
            handle: None,
            revision: u64::MAX,
        }
    }

    fn sync(&mut self, ctx: &egui::Context, name: &str, image: Option<&RasterImage>, revision: u64) {
        if revision == self.revision {
            return;
        }
        self.revision = revision;
        let Some(image) = image else {
            self.handle = None;
            return;
        };
        let pixels = image.pixels();
        let color_image = ColorImage::from_rgba_unmultiplied(
            [pixels.width() as usize, pixels.height() as usize],
            pixels.as_raw(),
        );
        match &mut self.handle {
            Some(tex) => tex.set(color_image, TextureOptions::LINEAR),
            None => self.handle = Some(ctx.load_texture(name, color_image, TextureOptions::LINEAR)),
        }
    }
}

pub struct StencilApp {
    session: SessionController,
    settings: AppSettings,
    /// Last settings written to disk.
    saved_settings: AppSettings,

    original_tex: LayerTexture,
    stencil_tex: LayerTexture,

    works_query: String,
    status: Option<String>,
    show_settings: bool,
}

impl StencilApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let store: Box<dyn WorkStore> = match JsonFileStore::open_default() {
            Some(store) => {
                crate::log_info!("Saved works at {}", store.path().display());
                Box::new(store)
            }
            None => {
                crate::log_warn!("No config directory, saved works kept in memory only");
                Box::new(MemoryStore::new())
            }
        };
        let generator: Arc<dyn StencilGenerator> = Arc::from(generate::from_settings(&settings));
        let session = SessionController::with_settings(generator, store, &settings);
        Self {
            session,
            saved_settings: settings.clone(),
            settings,
            original_tex: LayerTexture::new(),
            stencil_tex: LayerTexture::new(),
            works_query: String::new(),
            status: None,
            show_settings: false,
        }
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    fn pick_upload(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &["jpg", "jpeg", "png", "webp"])
            .pick_file()
        {
            self.status = None;
            let _ = self.session.load_path(&path);
        }
    }

    fn export(&mut self) {
        if self.session.stencil().is_none() {
            return;
        }
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(io::export_file_name(io::now_millis()))
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };
        match self.session.save_png(&path) {
            Ok(()) => self.status = Some(format!("Saved {}", path.display())),
            Err(e) => {
                crate::log_err!("Export to {} failed: {}", path.display(), e);
                self.status = Some(e.user_message());
            }
        }
    }

    fn apply_backend(&mut self, backend: Backend) {
        if backend == self.settings.backend {
            return;
        }
        self.settings.backend = backend;
        self.session
            .set_generator(Arc::from(generate::from_settings(&self.settings)));
    }

    /// Mirror session preferences into settings and save them when they change.
    fn persist_settings(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.pointer.any_down()) {
            return;
        }
        self.settings.default_style = self.session.style();
        self.settings.transparent_background = self.session.transparent();
        self.settings.pencil_size = self.session.tools.pencil.size;
        self.settings.pencil_opacity = self.session.tools.pencil.opacity_percent;
        self.settings.eraser_size = self.session.tools.eraser.size;
        self.settings.overlay_opacity = self.session.surface.view().overlay_opacity;
        if self.settings != self.saved_settings {
            self.settings.save();
            self.saved_settings = self.settings.clone();
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("EasyStencil");
                ui.separator();
                if ui.button("Upload photo…").clicked() {
                    self.pick_upload();
                }
                let has_stencil = self.session.stencil().is_some();
                if ui.add_enabled(has_stencil, egui::Button::new("Export PNG")).clicked() {
                    self.export();
                }
                if ui
                    .add_enabled(self.session.phase() != SessionPhase::Empty, egui::Button::new("New"))
                    .clicked()
                {
                    self.session.reset();
                    self.status = None;
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.toggle_value(&mut self.show_settings, "Settings");
                    ui.label(format!("Backend: {}", self.session.generator_name()));
                });
            });
        });
    }

    fn controls_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("controls")
            .resizable(false)
            .exact_width(300.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.upload_section(ui);
                    ui.separator();
                    self.style_section(ui);
                    ui.separator();
                    self.generate_section(ui);
                    ui.separator();
                    self.recent_works(ui);
                });
            });
    }

    fn upload_section(&mut self, ui: &mut egui::Ui) {
        ui.strong("1. Photo");
        match self.session.upload() {
            Some(upload) => {
                let name = upload.name.clone().unwrap_or_else(|| "Saved work".to_string());
                ui.label(format!("{} ({:.1} MB)", name, upload.bytes.len() as f64 / (1024.0 * 1024.0)));
            }
            None => {
                ui.label("Drop a JPG, PNG or WebP here, or use Upload (max 10MB).");
            }
        }
    }

    fn style_section(&mut self, ui: &mut egui::Ui) {
        ui.strong("2. Line color");
        ui.horizontal_wrapped(|ui| {
            for style in ColorStyle::ALL {
                let [r, g, b] = style.rgb();
                let selected = self.session.style() == style;
                let button = egui::Button::new(egui::RichText::new(style.label()).color(Color32::WHITE))
                    .fill(Color32::from_rgb(r, g, b))
                    .stroke(if selected {
                        egui::Stroke::new(2.0, Color32::WHITE)
                    } else {
                        egui::Stroke::NONE
                    });
                if ui.add(button).clicked() {
                    self.session.select_style(style);
                }
            }
        });
        let mut transparent = self.session.transparent();
        if ui.checkbox(&mut transparent, "Transparent background").changed() {
            self.session.set_transparent(transparent);
        }
    }

    fn generate_section(&mut self, ui: &mut egui::Ui) {
        ui.strong("3. Generate");
        ui.add(
            egui::TextEdit::multiline(&mut self.session.prompt)
                .hint_text("Optional: extra instructions (e.g. \"only the face\")")
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );
        ui.horizontal(|ui| {
            let label = if self.session.is_generating() {
                "Generating…"
            } else {
                "Generate stencil"
            };
            if ui
                .add_enabled(self.session.can_generate(), egui::Button::new(label).fill(ACCENT))
                .clicked()
            {
                self.session.generate();
            }
            if self.session.is_generating() {
                ui.spinner();
            }
        });
        if let Some(err) = self.session.last_error() {
            ui.colored_label(ACCENT, err);
        }
        if let Some(status) = &self.status {
            ui.label(status);
        }
    }

    fn recent_works(&mut self, ui: &mut egui::Ui) {
        ui.strong("Recent works");
        ui.add(egui::TextEdit::singleline(&mut self.works_query).hint_text("Search date or color"));
        let groups = self.session.grouped_works(&self.works_query);
        if groups.is_empty() {
            ui.weak(if self.session.works().is_empty() {
                "Nothing generated yet."
            } else {
                "No works match."
            });
            return;
        }
        let mut open = None;
        for group in &groups {
            egui::CollapsingHeader::new(format!("{} ({})", group.key, group.works.len()))
                .id_source(&group.key)
                .default_open(true)
                .show(ui, |ui| {
                    for work in &group.works {
                        ui.horizontal(|ui| {
                            let style = work.color_style();
                            let [r, g, b] = style.rgb();
                            let (swatch, _) = ui.allocate_exact_size(Vec2::splat(12.0), Sense::hover());
                            ui.painter().circle_filled(swatch.center(), 6.0, Color32::from_rgb(r, g, b));
                            let when = chrono::Local
                                .timestamp_millis_opt(work.created_at)
                                .single()
                                .map(|t| t.format("%H:%M").to_string())
                                .unwrap_or_default();
                            if ui.link(format!("{} · {}", when, style.label())).clicked() {
                                open = Some(work.clone());
                            }
                        });
                    }
                });
        }
        if let Some(work) = open
            && let Err(e) = self.session.open_work(&work)
        {
            crate::log_warn!("Saved work {} could not be opened: {}", work.id, e);
            self.status = Some(e.user_message());
        }
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let mut backend = self.settings.backend;
                ui.horizontal(|ui| {
                    ui.label("Generator");
                    ui.radio_value(&mut backend, Backend::Gemini, "Gemini");
                    ui.radio_value(&mut backend, Backend::Sketch, "Offline sketch");
                });
                self.apply_backend(backend);
                if self.settings.backend == Backend::Gemini {
                    let key_ok = self.settings.api_key().is_some();
                    ui.label(format!("Model: {}", self.settings.model));
                    ui.label(format!(
                        "API key from ${}: {}",
                        self.settings.api_key_env,
                        if key_ok { "found" } else { "missing" }
                    ));
                }
                if let Some(path) = crate::logger::log_path() {
                    ui.weak(format!("Log: {}", path.display()));
                }
            });
        self.show_settings = open;
    }

    // ========================================================================
    // WORKSPACE
    // ========================================================================

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for tool in [Tool::Pencil, Tool::Eraser, Tool::Pan] {
                if ui.selectable_label(self.session.tools.active() == tool, tool.label()).clicked() {
                    self.session.toggle_tool(tool);
                }
            }
            ui.separator();
            match self.session.tools.active() {
                Tool::Pencil => {
                    let pencil = &mut self.session.tools.pencil;
                    let (swatch, _) = ui.allocate_exact_size(Vec2::splat(14.0), Sense::hover());
                    ui.painter().circle_filled(swatch.center(), 7.0, pencil.color32());
                    let mut size = pencil.size;
                    if ui.add(egui::Slider::new(&mut size, PENCIL_SIZE_RANGE).text("Size")).changed() {
                        pencil.set_size(size);
                    }
                    let mut opacity = pencil.opacity_percent;
                    if ui
                        .add(egui::Slider::new(&mut opacity, PENCIL_OPACITY_RANGE).text("Opacity %"))
                        .changed()
                    {
                        pencil.set_opacity(opacity);
                    }
                    for style in ColorStyle::ALL {
                        let [r, g, b] = style.rgb();
                        let selected = pencil.color == style.rgb();
                        let swatch = egui::Button::new("")
                            .fill(Color32::from_rgb(r, g, b))
                            .min_size(Vec2::splat(18.0))
                            .stroke(if selected {
                                egui::Stroke::new(2.0, Color32::WHITE)
                            } else {
                                egui::Stroke::NONE
                            });
                        if ui.add(swatch).on_hover_text(style.label()).clicked() {
                            pencil.color = style.rgb();
                        }
                    }
                }
                Tool::Eraser => {
                    let eraser = &mut self.session.tools.eraser;
                    let mut size = eraser.size;
                    if ui.add(egui::Slider::new(&mut size, ERASER_SIZE_RANGE).text("Size")).changed() {
                        eraser.set_size(size);
                    }
                }
                Tool::Pan | Tool::None => {}
            }
            ui.separator();
            let history = self.session.history();
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                self.session.undo();
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
                self.session.redo();
            }
        });

        ui.horizontal_wrapped(|ui| {
            let view = *self.session.surface.view();
            if ui.selectable_label(view.mode == ViewMode::Split, "Split").clicked() {
                self.session.surface.set_mode(ViewMode::Split);
            }
            if ui.selectable_label(view.mode == ViewMode::Overlay, "Overlay").clicked() {
                self.session.surface.set_mode(ViewMode::Overlay);
            }
            if view.mode == ViewMode::Overlay {
                let mut opacity = view.overlay_opacity;
                if ui.add(egui::Slider::new(&mut opacity, 0.0..=100.0).text("Opacity %")).changed() {
                    self.session.surface.set_overlay_opacity(opacity);
                }
                let swap = if view.stencil_on_top { "Photo on top" } else { "Stencil on top" };
                if ui.button(swap).clicked() {
                    self.session.surface.swap_layers();
                }
            }
            ui.separator();
            let mut zoom = view.zoom;
            if ui
                .add(egui::Slider::new(&mut zoom, MIN_ZOOM..=MAX_ZOOM).logarithmic(true).text("Zoom"))
                .changed()
            {
                self.session.surface.set_zoom(zoom);
            }
            if ui.button("1:1").clicked() {
                self.session.surface.set_zoom(1.0);
            }
        });
    }

    fn stage(&mut self, ui: &mut egui::Ui) {
        let (viewport, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(viewport);
        painter.rect_filled(viewport, 4.0, STAGE_BG);

        let size = self
            .session
            .stencil()
            .or(self.session.original())
            .map(|img| [img.width(), img.height()])
            .unwrap_or([0, 0]);
        self.session.surface.set_viewport(viewport, size);
        self.session.surface.on_generation(self.session.generation_count());

        if self.session.phase() == SessionPhase::Empty {
            painter.text(
                viewport.center(),
                egui::Align2::CENTER_CENTER,
                "Upload a photo to start",
                egui::FontId::proportional(18.0),
                Color32::GRAY,
            );
            return;
        }

        let uv = Rect::from_min_max(Pos2::ZERO, pos2(1.0, 1.0));
        for placement in self.session.surface.layers() {
            let texture = match placement.layer {
                Layer::Original => &self.original_tex,
                Layer::Stencil => &self.stencil_tex,
            };
            let clip = placement.clip.intersect(viewport);
            let layer_painter = painter.with_clip_rect(clip);
            if placement.layer == Layer::Stencil {
                // Stencils with a transparent background sit on paper white.
                let paper = Color32::WHITE.gamma_multiply(placement.opacity);
                layer_painter.rect_filled(placement.rect, 0.0, paper);
            }
            match &texture.handle {
                Some(tex) => {
                    let tint = Color32::WHITE.gamma_multiply(placement.opacity);
                    layer_painter.image(tex.id(), placement.rect, uv, tint);
                }
                None if placement.layer == Layer::Stencil && self.session.is_generating() => {
                    layer_painter.text(
                        placement.rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Generating stencil…",
                        egui::FontId::proportional(16.0),
                        Color32::DARK_GRAY,
                    );
                }
                None => {}
            }
        }

        if self.session.surface.view().mode == ViewMode::Split {
            let divider = self.session.surface.divider_rect().intersect(viewport);
            painter.rect_filled(divider, 0.0, DIVIDER);
            let grip = self.session.surface.grip_rect();
            painter.circle_filled(grip.center(), grip.width() / 2.0, DIVIDER);
            painter.text(
                grip.center(),
                egui::Align2::CENTER_CENTER,
                "↔",
                egui::FontId::proportional(14.0),
                Color32::WHITE,
            );
        }

        self.route_pointer(ui.ctx(), &response);
    }

    /// Feed this frame's pointer input to the session. Pen and touch contacts
    /// go first with their own ids and force; the mouse path then only runs
    /// for gestures the mouse itself owns.
    fn route_pointer(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let (touches, pressed, released, press_origin, moves) = ctx.input(|i| {
            let moves: Vec<Pos2> = i
                .events
                .iter()
                .filter_map(|e| match e {
                    egui::Event::PointerMoved(pos) => Some(*pos),
                    _ => None,
                })
                .collect();
            (
                touch_inputs(&i.events),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.press_origin(),
                moves,
            )
        });

        if !touches.is_empty() {
            apply_inputs(&mut self.session, touches);
            ctx.request_repaint();
        }

        if pressed
            && response.hovered()
            && let Some(origin) = press_origin
        {
            self.session
                .pointer_down(MOUSE_POINTER, StrokeSample::at(origin.x, origin.y));
        }

        if self.session.surface.interaction().pointer() == Some(MOUSE_POINTER) {
            if !moves.is_empty() {
                let samples: Vec<StrokeSample> = moves.iter().map(|p| StrokeSample::at(p.x, p.y)).collect();
                self.session.pointer_move(MOUSE_POINTER, &samples);
            }
            if released {
                self.session.pointer_up(MOUSE_POINTER);
            }
            ctx.request_repaint();
        }

        let cursor = match self.session.tools.active() {
            Tool::Pan => egui::CursorIcon::Grab,
            Tool::Pencil | Tool::Eraser => egui::CursorIcon::Crosshair,
            Tool::None => egui::CursorIcon::Default,
        };
        if response.hovered() {
            ctx.output_mut(|o| o.cursor_icon = cursor);
        }
    }
}

/// One pointer transition, in screen space.
#[derive(Clone, Debug, PartialEq)]
enum PointerInput {
    Down(PointerId, StrokeSample),
    Move(PointerId, Vec<StrokeSample>),
    Up(PointerId),
    Cancel(PointerId),
}

fn touch_pointer(id: egui::TouchId) -> PointerId {
    id.0.saturating_add(1)
}

/// Pen and touch contacts from the event queue. Runs of moves from the same
/// contact are coalesced into one `Move`, oldest first.
fn touch_inputs(events: &[egui::Event]) -> Vec<PointerInput> {
    let mut inputs: Vec<PointerInput> = Vec::new();
    for event in events {
        let egui::Event::Touch {
            id, phase, pos, force, ..
        } = event
        else {
            continue;
        };
        let pointer = touch_pointer(*id);
        let sample = StrokeSample::at(pos.x, pos.y).with_pressure(*force);
        match phase {
            egui::TouchPhase::Start => inputs.push(PointerInput::Down(pointer, sample)),
            egui::TouchPhase::Move => match inputs.last_mut() {
                Some(PointerInput::Move(last, samples)) if *last == pointer => samples.push(sample),
                _ => inputs.push(PointerInput::Move(pointer, vec![sample])),
            },
            egui::TouchPhase::End => inputs.push(PointerInput::Up(pointer)),
            egui::TouchPhase::Cancel => inputs.push(PointerInput::Cancel(pointer)),
        }
    }
    inputs
}

fn apply_inputs(session: &mut SessionController, inputs: Vec<PointerInput>) {
    for input in inputs {
        match input {
            PointerInput::Down(pointer, sample) => session.pointer_down(pointer, sample),
            PointerInput::Move(pointer, samples) => session.pointer_move(pointer, &samples),
            PointerInput::Up(pointer) => session.pointer_up(pointer),
            PointerInput::Cancel(pointer) => session.pointer_cancel(pointer),
        }
    }
}

impl eframe::App for StencilApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Generation results ---
        self.session.poll();
        if self.session.is_generating() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        // --- Drag-and-drop upload ---
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(file) = dropped.into_iter().next() {
            self.status = None;
            let _ = match (file.path, file.bytes) {
                (Some(path), _) => self.session.load_path(&path),
                (None, Some(bytes)) => {
                    let mime = (!file.mime.is_empty()).then_some(file.mime.as_str());
                    self.session.load_bytes(bytes.to_vec(), mime, Some(file.name.clone()))
                }
                (None, None) => Ok(()),
            };
        }

        // --- Undo / redo shortcuts ---
        if let Some(action) = history::take_shortcut(ctx) {
            self.session.apply_history_action(action);
        }

        // --- Textures ---
        self.original_tex.sync(
            ctx,
            "original",
            self.session.original(),
            self.session.original_revision(),
        );
        self.stencil_tex
            .sync(ctx, "stencil", self.session.stencil(), self.session.revision());

        self.top_bar(ctx);
        self.controls_panel(ctx);
        if self.show_settings {
            self.settings_window(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.session.stencil().is_some() {
                self.toolbar(ui);
                ui.add_space(4.0);
            }
            self.stage(ui);
        });

        self.persist_settings(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::generate::SketchGenerator;

    fn touch(id: u64, phase: egui::TouchPhase, x: f32, y: f32, force: f32) -> egui::Event {
        egui::Event::Touch {
            device_id: egui::TouchDeviceId(0),
            id: egui::TouchId(id),
            phase,
            pos: pos2(x, y),
            force: Some(force),
        }
    }

    fn blank_session() -> SessionController {
        let mut session = SessionController::new(Arc::new(SketchGenerator::default()), Box::new(MemoryStore::new()));
        session.load_stencil(RasterImage::filled(40, 40, [255, 255, 255, 255]), [0, 0, 0]);
        session
            .surface
            .set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::splat(40.0)), [40, 40]);
        session.surface.set_split_position(100.0);
        session.toggle_tool(Tool::Pencil);
        session
    }

    #[test]
    fn touch_events_carry_id_and_force() {
        use egui::TouchPhase::*;
        let events = vec![
            touch(0, Start, 10.0, 20.0, 0.8),
            touch(0, Move, 12.0, 20.0, 0.6),
            touch(0, Move, 14.0, 20.0, 0.4),
            egui::Event::PointerMoved(pos2(1.0, 1.0)),
            touch(0, End, 14.0, 20.0, 0.0),
        ];
        let inputs = touch_inputs(&events);
        assert_eq!(inputs.len(), 3);
        assert_eq!(
            inputs[0],
            PointerInput::Down(1, StrokeSample::at(10.0, 20.0).with_pressure(0.8))
        );
        let PointerInput::Move(1, samples) = &inputs[1] else {
            panic!("expected a coalesced move, got {:?}", inputs[1]);
        };
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].pressure, 0.4);
        assert_eq!(inputs[2], PointerInput::Up(1));
    }

    #[test]
    fn pen_pressure_reaches_the_stencil() {
        use egui::TouchPhase::*;
        let stroke = |force: f32| {
            let mut session = blank_session();
            let events = vec![
                touch(3, Start, 5.0, 20.0, force),
                touch(3, Move, 35.0, 20.0, force),
                touch(3, End, 35.0, 20.0, force),
            ];
            apply_inputs(&mut session, touch_inputs(&events));
            assert_eq!(session.history().undo_len(), 2);
            session.stencil().cloned().unwrap()
        };
        let light = stroke(0.05);
        let heavy = stroke(1.0);
        let inked = |img: &RasterImage| img.pixels().pixels().filter(|p| p.0[0] < 250).count();
        assert!(inked(&heavy) > inked(&light));
        assert!(inked(&light) > 0);
    }

    #[test]
    fn second_contact_cannot_steal_a_stroke() {
        use egui::TouchPhase::*;
        let mut session = blank_session();
        let events = vec![
            touch(0, Start, 5.0, 10.0, 0.5),
            touch(1, Start, 5.0, 30.0, 0.5),
            touch(1, Move, 35.0, 30.0, 0.5),
            touch(1, End, 35.0, 30.0, 0.5),
            touch(0, End, 5.0, 10.0, 0.5),
        ];
        apply_inputs(&mut session, touch_inputs(&events));
        let stencil = session.stencil().unwrap();
        assert_eq!(stencil.pixel(30, 30), [255, 255, 255, 255]);
        assert_ne!(stencil.pixel(5, 10), [255, 255, 255, 255]);
        assert_eq!(session.history().undo_len(), 2);
    }
}
