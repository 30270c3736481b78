//! Session state for one editing workspace.
//!
//! The session owns the uploaded photo, the single authoritative stencil
//! buffer and its history. The comparison surface only ever sees read-only
//! views of those buffers. Generation runs on the rayon pool and reports back
//! through a channel; each request carries a token so results that arrive
//! after a reset or a newer upload are dropped.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::components::comparison::{ComparisonSurface, SurfaceEvent};
use crate::components::history::{HistoryAction, HistoryStore, Snapshot};
use crate::components::stroke::{PointerId, StrokeCommit, StrokeEngine, StrokeSample};
use crate::components::tools::{Tool, ToolsPanel};
use crate::error::{GenerationError, StencilError, TransformError, ValidationError};
use crate::io::{self, Upload};
use crate::ops::generate::{GenerationRequest, StencilGenerator};
use crate::ops::recolor::{extract_ink, recolor_opaque_from, recolor_transparent};
use crate::raster::{RasterImage, split_data_uri};
use crate::settings::AppSettings;
use crate::store::{self, DayGroup, StencilWork, WorkStore};
use crate::styles::ColorStyle;
use crate::{log_err, log_info, log_warn};

/// One history entry: the pixels and the color state they were made in.
#[derive(Clone, Debug, PartialEq)]
pub struct StencilSnapshot {
    pub image: Arc<RasterImage>,
    pub style: ColorStyle,
    pub line_color: [u8; 3],
    pub transparent: bool,
}

impl Snapshot for StencilSnapshot {
    fn memory_size(&self) -> usize {
        self.image.memory_size()
    }
}

/// Delivered from the generation worker.
struct GenerationResult {
    token: u64,
    outcome: Result<RasterImage, GenerationError>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing uploaded.
    Empty,
    /// Photo loaded, with or without a stencil.
    Ready,
    /// Waiting on the generator. The stencil view is blank.
    Generating,
}

pub struct SessionController {
    upload: Option<Upload>,
    original: Option<Arc<RasterImage>>,
    stencil: Option<RasterImage>,
    history: HistoryStore<StencilSnapshot>,
    /// Color the stencil's lines are currently drawn in.
    line_color: [u8; 3],

    pub tools: ToolsPanel,
    pub surface: ComparisonSurface,
    strokes: StrokeEngine,

    style: ColorStyle,
    pub prompt: String,
    transparent: bool,

    generator: Arc<dyn StencilGenerator>,
    store: Box<dyn WorkStore>,
    works: Vec<StencilWork>,

    generating: bool,
    job_token: u64,
    result_sender: mpsc::Sender<GenerationResult>,
    result_receiver: mpsc::Receiver<GenerationResult>,

    generation_count: u64,
    /// Bumped on every change to the stencil pixels.
    revision: u64,
    /// Bumped whenever the original photo is replaced or cleared.
    original_revision: u64,
    last_error: Option<String>,
}

impl SessionController {
    pub fn new(generator: Arc<dyn StencilGenerator>, store: Box<dyn WorkStore>) -> Self {
        let works = store::load_or_empty(&*store);
        let (result_sender, result_receiver) = mpsc::channel();
        Self {
            upload: None,
            original: None,
            stencil: None,
            history: HistoryStore::new(),
            line_color: ColorStyle::default().rgb(),
            tools: ToolsPanel::default(),
            surface: ComparisonSurface::new(),
            strokes: StrokeEngine::new(),
            style: ColorStyle::default(),
            prompt: String::new(),
            transparent: false,
            generator,
            store,
            works,
            generating: false,
            job_token: 0,
            result_sender,
            result_receiver,
            generation_count: 0,
            revision: 0,
            original_revision: 0,
            last_error: None,
        }
    }

    /// Session seeded from saved preferences.
    pub fn with_settings(
        generator: Arc<dyn StencilGenerator>,
        store: Box<dyn WorkStore>,
        settings: &AppSettings,
    ) -> Self {
        let mut session = Self::new(generator, store);
        session.style = settings.default_style;
        session.line_color = settings.default_style.rgb();
        session.transparent = settings.transparent_background;
        session.tools.pencil.color = settings.default_style.rgb();
        session.tools.pencil.set_size(settings.pencil_size);
        session.tools.pencil.set_opacity(settings.pencil_opacity);
        session.tools.eraser.set_size(settings.eraser_size);
        session.surface.set_overlay_opacity(settings.overlay_opacity);
        session
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn phase(&self) -> SessionPhase {
        if self.generating {
            SessionPhase::Generating
        } else if self.upload.is_some() || self.original.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Empty
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn can_generate(&self) -> bool {
        !self.generating && self.upload.is_some()
    }

    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    pub fn original(&self) -> Option<&RasterImage> {
        self.original.as_deref()
    }

    pub fn stencil(&self) -> Option<&RasterImage> {
        self.stencil.as_ref()
    }

    pub fn history(&self) -> &HistoryStore<StencilSnapshot> {
        &self.history
    }

    pub fn style(&self) -> ColorStyle {
        self.style
    }

    pub fn line_color(&self) -> [u8; 3] {
        self.line_color
    }

    pub fn transparent(&self) -> bool {
        self.transparent
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    pub fn generation_count(&self) -> u64 {
        self.generation_count
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn original_revision(&self) -> u64 {
        self.original_revision
    }

    /// Swap the backend. A generation already running finishes on the old one.
    pub fn set_generator(&mut self, generator: Arc<dyn StencilGenerator>) {
        log_info!("Generator set to {}", generator.name());
        self.generator = generator;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Saved works, newest first.
    pub fn works(&self) -> &[StencilWork] {
        &self.works
    }

    pub fn search_works(&self, query: &str) -> Vec<StencilWork> {
        store::search(&self.works, query)
    }

    pub fn grouped_works(&self, query: &str) -> Vec<DayGroup> {
        store::group_by_day(&store::search(&self.works, query))
    }

    // ========================================================================
    // INTAKE
    // ========================================================================

    /// Accept a validated upload. Rejections leave every piece of state as it was.
    pub fn load_upload(&mut self, upload: Upload) -> Result<(), StencilError> {
        let original = match upload.decode() {
            Ok(img) => img,
            Err(e) => {
                log_warn!("Upload {:?} could not be decoded: {}", upload.name, e);
                self.last_error = Some(ValidationError::NotAnImage.to_string());
                return Err(ValidationError::NotAnImage.into());
            }
        };
        log_info!(
            "Loaded {} ({}, {} bytes, {}x{})",
            upload.name.as_deref().unwrap_or("upload"),
            upload.mime,
            upload.bytes.len(),
            original.width(),
            original.height()
        );
        self.invalidate_generation();
        self.drop_stencil();
        self.original = Some(Arc::new(original));
        self.original_revision += 1;
        self.upload = Some(upload);
        self.last_error = None;
        Ok(())
    }

    pub fn load_path(&mut self, path: &Path) -> Result<(), StencilError> {
        match Upload::read(path) {
            Ok(upload) => self.load_upload(upload),
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn load_bytes(&mut self, bytes: Vec<u8>, mime: Option<&str>, name: Option<String>) -> Result<(), StencilError> {
        match Upload::from_bytes(bytes, mime, name) {
            Ok(upload) => self.load_upload(upload),
            Err(e) => Err(self.reject(e)),
        }
    }

    fn reject(&mut self, e: ValidationError) -> StencilError {
        log_warn!("Upload rejected: {}", e);
        self.last_error = Some(e.to_string());
        e.into()
    }

    /// Treat an existing line drawing as the stencil, skipping generation.
    pub fn load_stencil(&mut self, stencil: RasterImage, line_color: [u8; 3]) {
        self.line_color = line_color;
        self.install_stencil(stencil);
    }

    // ========================================================================
    // GENERATION
    // ========================================================================

    /// Start a generation for the current upload. Ignored while one is running.
    pub fn generate(&mut self) -> bool {
        if self.generating {
            return false;
        }
        let Some(upload) = &self.upload else { return false };

        let request = GenerationRequest {
            image: upload.bytes.clone(),
            mime: upload.mime.clone(),
            style: self.style,
            prompt: Some(self.prompt.clone()).filter(|p| !p.trim().is_empty()),
        };

        self.job_token = self.job_token.wrapping_add(1);
        let token = self.job_token;
        self.generating = true;
        self.last_error = None;
        self.drop_stencil();
        log_info!(
            "Generating stencil ({}, style {}, token {})",
            self.generator.name(),
            self.style.id(),
            token
        );

        let generator = Arc::clone(&self.generator);
        let sender = self.result_sender.clone();
        rayon::spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| generator.generate(&request)))
                .unwrap_or_else(|panic_info| {
                    let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic payload".to_string()
                    };
                    Err(GenerationError::Transport(format!("generator panicked: {}", msg)))
                });
            let _ = sender.send(GenerationResult { token, outcome });
        });
        true
    }

    /// Apply any finished generation. Call once per frame. Returns `true` if
    /// something changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.result_receiver.try_recv() {
            changed |= self.apply_result(result);
        }
        changed
    }

    /// Block until the running generation finishes or `timeout` elapses.
    pub fn wait_for_generation(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.generating {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.result_receiver.recv_timeout(remaining) {
                Ok(result) => {
                    self.apply_result(result);
                }
                Err(_) => return false,
            }
        }
        true
    }

    fn apply_result(&mut self, result: GenerationResult) -> bool {
        if !self.generating || result.token != self.job_token {
            log_info!("Discarding stale generation result (token {})", result.token);
            return false;
        }
        self.generating = false;

        let stencil = match result.outcome {
            Ok(img) => img,
            Err(e) => {
                log_err!("Generation failed: {}", e);
                self.last_error = Some(e.user_message().to_string());
                return true;
            }
        };

        let stencil = if self.transparent {
            extract_ink(&stencil, self.style.rgb(), self.style.rgb())
        } else {
            stencil
        };
        self.line_color = self.style.rgb();
        self.install_stencil(stencil);
        self.generation_count += 1;
        log_info!("Generation {} complete", self.generation_count);

        self.persist_current();
        true
    }

    fn persist_current(&mut self) {
        let (Some(upload), Some(stencil)) = (&self.upload, &self.stencil) else { return };
        let stencil_uri = match stencil.to_data_uri() {
            Ok(uri) => uri,
            Err(e) => {
                log_warn!("Stencil not saved, encode failed: {}", e);
                return;
            }
        };
        let work = StencilWork::new(upload.to_data_uri(), stencil_uri, self.style, io::now_millis());
        self.works = store::record(self.store.as_mut(), work);
    }

    fn invalidate_generation(&mut self) {
        if self.generating {
            log_info!("Abandoning in-flight generation (token {})", self.job_token);
        }
        self.job_token = self.job_token.wrapping_add(1);
        self.generating = false;
    }

    // ========================================================================
    // STYLE
    // ========================================================================

    /// Change the line color. With a stencil present this is one recolor and
    /// one history entry.
    pub fn select_style(&mut self, style: ColorStyle) {
        let changed = style != self.style;
        self.style = style;
        self.tools.pencil.color = style.rgb();

        let Some(current) = &self.stencil else { return };
        if !changed && self.line_color == style.rgb() {
            return;
        }
        let recolored = if self.transparent {
            recolor_transparent(current, style.rgb())
        } else {
            recolor_opaque_from(current, self.line_color, style.rgb())
        };
        log_info!("Recolored stencil to {} ({})", style.id(), style.hex());
        self.line_color = style.rgb();
        self.replace_stencil(recolored);
    }

    /// Switch between lines on white and lines on a transparent background.
    pub fn set_transparent(&mut self, transparent: bool) {
        if transparent == self.transparent {
            return;
        }
        self.transparent = transparent;
        let Some(current) = &self.stencil else { return };
        let converted = if transparent {
            extract_ink(current, self.line_color, self.line_color)
        } else {
            recolor_opaque_from(current, self.line_color, self.line_color)
        };
        self.replace_stencil(converted);
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    pub fn toggle_tool(&mut self, tool: Tool) {
        self.tools.toggle(tool);
    }

    /// Pointer-down in screen space.
    pub fn pointer_down(&mut self, pointer: PointerId, sample: StrokeSample) {
        if self.stencil.is_none() {
            return;
        }
        let event = self.surface.pointer_down(pointer, sample, self.tools.active());
        self.handle_surface_event(event);
    }

    /// Pointer-move with every coalesced sample, oldest first, in screen space.
    pub fn pointer_move(&mut self, pointer: PointerId, samples: &[StrokeSample]) {
        let event = self.surface.pointer_move(pointer, samples);
        self.handle_surface_event(event);
    }

    pub fn pointer_up(&mut self, pointer: PointerId) {
        let event = self.surface.pointer_up(pointer);
        self.handle_surface_event(event);
    }

    pub fn pointer_cancel(&mut self, pointer: PointerId) {
        let event = self.surface.pointer_cancel(pointer);
        self.handle_surface_event(event);
    }

    fn handle_surface_event(&mut self, event: Option<SurfaceEvent>) {
        let Some(event) = event else { return };
        match event {
            SurfaceEvent::BeginStroke { pointer, sample } => {
                let Some(stencil) = self.stencil.as_mut() else { return };
                if self.strokes.begin(pointer, &self.tools, sample, stencil) {
                    self.revision += 1;
                } else {
                    self.surface.release();
                }
            }
            SurfaceEvent::ExtendStroke { pointer, samples } => {
                let Some(stencil) = self.stencil.as_mut() else { return };
                if self.strokes.extend(pointer, &samples, stencil) > 0 {
                    self.revision += 1;
                }
            }
            SurfaceEvent::EndStroke { pointer } => {
                if let Some(commit) = self.strokes.end(pointer) {
                    self.commit_stroke(commit);
                }
            }
            SurfaceEvent::Panned { .. } | SurfaceEvent::SplitMoved(_) => {}
        }
    }

    fn commit_stroke(&mut self, commit: StrokeCommit) {
        let Some(stencil) = &self.stencil else { return };
        let Some(bounds) = commit.bounds else {
            log_info!("{} stroke missed the stencil, nothing to commit", commit.tool.label());
            return;
        };
        self.history.commit(self.snapshot_of(stencil));
        log_info!(
            "{} stroke committed ({} samples over {:.0}x{:.0} px, history {})",
            commit.tool.label(),
            commit.samples,
            bounds.width(),
            bounds.height(),
            self.history.undo_len()
        );
    }

    pub fn undo(&mut self) -> bool {
        if self.strokes.is_drawing() || !self.history.can_undo() {
            return false;
        }
        let Some(prev) = self.history.undo().cloned() else { return false };
        self.show_snapshot(prev);
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.strokes.is_drawing() || !self.history.can_redo() {
            return false;
        }
        let Some(next) = self.history.redo().cloned() else { return false };
        self.show_snapshot(next);
        true
    }

    pub fn apply_history_action(&mut self, action: HistoryAction) -> bool {
        match action {
            HistoryAction::Undo => self.undo(),
            HistoryAction::Redo => self.redo(),
        }
    }

    // ========================================================================
    // WORKSPACE
    // ========================================================================

    /// Clear the workspace. A generation still in flight is discarded on arrival.
    pub fn reset(&mut self) {
        self.invalidate_generation();
        self.upload = None;
        self.original = None;
        self.original_revision += 1;
        self.drop_stencil();
        self.prompt.clear();
        self.last_error = None;
        log_info!("Workspace reset");
    }

    /// Reopen a saved work: its photo, its stencil as the new history origin, its style.
    pub fn open_work(&mut self, work: &StencilWork) -> Result<(), StencilError> {
        let stencil = RasterImage::from_data_uri(&work.stencil_image)?;
        let upload = upload_from_data_uri(&work.original_image)?;
        let original = upload.decode()?;
        let style = work.color_style();

        self.invalidate_generation();
        self.original = Some(Arc::new(original));
        self.original_revision += 1;
        self.upload = Some(upload);
        self.style = style;
        self.tools.pencil.color = style.rgb();
        self.line_color = style.rgb();
        self.install_stencil(stencil);
        self.last_error = None;
        log_info!("Opened saved work {}", work.id);
        Ok(())
    }

    /// Write the current stencil as a timestamped PNG in `dir`.
    pub fn export_png(&mut self, dir: &Path) -> Result<PathBuf, StencilError> {
        let Some(stencil) = &self.stencil else {
            return Err(TransformError::Encode("no stencil to export".to_string()).into());
        };
        io::export_png(stencil, dir).inspect_err(|e| {
            log_err!("Export failed: {}", e);
            self.last_error = Some(e.user_message());
        })
    }

    /// Write the current stencil to an exact path.
    pub fn save_png(&mut self, path: &Path) -> Result<(), StencilError> {
        let Some(stencil) = &self.stencil else {
            return Err(TransformError::Encode("no stencil to export".to_string()).into());
        };
        io::write_png(stencil, path)?;
        log_info!("Saved stencil to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // BUFFER MANAGEMENT
    // ========================================================================

    fn drop_stencil(&mut self) {
        self.strokes.abandon();
        self.surface.release();
        self.stencil = None;
        self.history.clear();
        self.revision += 1;
    }

    /// New stencil with a fresh history rooted at it.
    fn install_stencil(&mut self, stencil: RasterImage) {
        self.strokes.abandon();
        self.surface.release();
        self.history.reset_with(self.snapshot_of(&stencil));
        self.stencil = Some(stencil);
        self.revision += 1;
    }

    /// Whole-buffer edit recorded as one history entry.
    fn replace_stencil(&mut self, stencil: RasterImage) {
        self.strokes.abandon();
        self.surface.release();
        self.history.commit(self.snapshot_of(&stencil));
        self.stencil = Some(stencil);
        self.revision += 1;
    }

    /// History entry for `stencil` in the current color state. Call after the
    /// state fields already describe it.
    fn snapshot_of(&self, stencil: &RasterImage) -> StencilSnapshot {
        StencilSnapshot {
            image: Arc::new(stencil.clone()),
            style: self.style,
            line_color: self.line_color,
            transparent: self.transparent,
        }
    }

    /// Make a history entry current, color state included, so the next
    /// recolor starts from what is actually on screen.
    fn show_snapshot(&mut self, snapshot: StencilSnapshot) {
        self.stencil = Some(snapshot.image.as_ref().clone());
        self.style = snapshot.style;
        self.tools.pencil.color = snapshot.style.rgb();
        self.line_color = snapshot.line_color;
        self.transparent = snapshot.transparent;
        self.revision += 1;
    }
}

/// Rebuild an upload from a stored `data:` URI.
fn upload_from_data_uri(uri: &str) -> Result<Upload, StencilError> {
    let (mime, payload) =
        split_data_uri(uri).ok_or_else(|| TransformError::Decode("not a data URI".to_string()))?;
    let bytes = STANDARD.decode(payload).map_err(TransformError::from)?;
    Ok(Upload::from_bytes(bytes, Some(mime), None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use egui::{Pos2, Rect, vec2};
    use std::sync::Mutex;

    /// Returns a fixed image; optionally fails.
    struct FixedGenerator {
        image: RasterImage,
        fail: bool,
        calls: Mutex<usize>,
    }

    impl StencilGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        fn generate(&self, _request: &GenerationRequest) -> Result<RasterImage, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                Err(GenerationError::NoImage)
            } else {
                Ok(self.image.clone())
            }
        }
    }

    fn line_art() -> RasterImage {
        let mut img = RasterImage::filled(40, 40, [255, 255, 255, 255]);
        for x in 0..40 {
            img.pixels_mut().put_pixel(x, 20, image::Rgba([0, 0, 0, 255]));
        }
        img
    }

    fn session(fail: bool) -> SessionController {
        let generator = FixedGenerator {
            image: line_art(),
            fail,
            calls: Mutex::new(0),
        };
        SessionController::new(Arc::new(generator), Box::new(MemoryStore::new()))
    }

    fn png_upload() -> (Vec<u8>, &'static str) {
        (RasterImage::filled(40, 40, [90, 120, 200, 255]).encode_png().unwrap(), "image/png")
    }

    fn generated(fail: bool) -> SessionController {
        let mut s = session(fail);
        let (bytes, mime) = png_upload();
        s.load_bytes(bytes, Some(mime), None).unwrap();
        assert!(s.generate());
        assert!(s.wait_for_generation(Duration::from_secs(10)));
        s
    }

    #[test]
    fn rejected_upload_leaves_state_alone() {
        let mut s = generated(false);
        let before = s.stencil().cloned();
        assert!(s.load_bytes(b"not an image".to_vec(), Some("text/plain"), None).is_err());
        assert_eq!(s.last_error(), Some("Please upload a valid image file (JPG, PNG, WebP)."));
        assert_eq!(s.stencil().cloned(), before);
        assert_eq!(s.history().undo_len(), 1);
    }

    #[test]
    fn generation_installs_origin_and_blocks_double_start() {
        let mut s = session(false);
        let (bytes, mime) = png_upload();
        s.load_bytes(bytes, Some(mime), None).unwrap();
        assert!(s.generate());
        assert_eq!(s.phase(), SessionPhase::Generating);
        assert!(s.stencil().is_none());
        assert!(!s.generate());
        assert!(s.wait_for_generation(Duration::from_secs(10)));
        assert_eq!(s.phase(), SessionPhase::Ready);
        assert_eq!(s.generation_count(), 1);
        assert_eq!(s.history().undo_len(), 1);
        assert!(!s.history().can_undo());
        assert_eq!(s.works().len(), 1);
    }

    #[test]
    fn failure_shows_generic_message() {
        let s = generated(true);
        assert_eq!(s.last_error(), Some(crate::error::GENERATION_FAILED_MESSAGE));
        assert!(s.stencil().is_none());
        assert_eq!(s.generation_count(), 0);
        assert!(s.works().is_empty());
    }

    #[test]
    fn reset_discards_late_result() {
        let mut s = session(false);
        let (bytes, mime) = png_upload();
        s.load_bytes(bytes, Some(mime), None).unwrap();
        s.generate();
        s.reset();
        assert_eq!(s.phase(), SessionPhase::Empty);
        std::thread::sleep(Duration::from_millis(200));
        s.poll();
        assert!(s.stencil().is_none());
        assert_eq!(s.generation_count(), 0);
        assert!(s.works().is_empty());
    }

    #[test]
    fn style_round_trip_through_history() {
        let mut s = generated(false);
        let black = s.stencil().cloned().unwrap();
        s.select_style(ColorStyle::Azules);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x1e, 0x3a, 0x8a, 255]);
        assert_eq!(s.tools.pencil.color, ColorStyle::Azules.rgb());
        assert!(s.undo());
        assert_eq!(s.stencil().unwrap(), &black);
        assert!(s.redo());
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x1e, 0x3a, 0x8a, 255]);
        // Same style again is not a new edit.
        s.select_style(ColorStyle::Azules);
        assert_eq!(s.history().undo_len(), 2);
    }

    #[test]
    fn transparent_mode_keeps_line_color() {
        let mut s = generated(false);
        s.set_transparent(true);
        assert_eq!(s.stencil().unwrap().pixel(5, 5)[3], 0);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0, 0, 0, 255]);
        s.select_style(ColorStyle::Verdes);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x14, 0x53, 0x2d, 255]);
        s.set_transparent(false);
        assert_eq!(s.stencil().unwrap().pixel(5, 5), [255, 255, 255, 255]);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x14, 0x53, 0x2d, 255]);
    }

    #[test]
    fn one_stroke_is_one_history_entry() {
        let mut s = generated(false);
        s.surface.set_viewport(Rect::from_min_size(Pos2::ZERO, vec2(40.0, 40.0)), [40, 40]);
        s.surface.set_split_position(100.0);
        s.toggle_tool(Tool::Eraser);
        s.pointer_down(1, StrokeSample::at(10.0, 20.0));
        s.pointer_move(
            1,
            &[StrokeSample::at(12.0, 20.0), StrokeSample::at(14.0, 20.0), StrokeSample::at(16.0, 20.0)],
        );
        s.pointer_up(1);
        assert_eq!(s.history().undo_len(), 2);
        assert_eq!(s.stencil().unwrap().pixel(13, 20)[3], 0);
        assert!(s.undo());
        assert_eq!(s.stencil().unwrap().pixel(13, 20), [0, 0, 0, 255]);
    }

    #[test]
    fn pan_tool_never_paints() {
        let mut s = generated(false);
        s.surface.set_viewport(Rect::from_min_size(Pos2::ZERO, vec2(40.0, 40.0)), [40, 40]);
        s.surface.set_zoom(2.0);
        s.toggle_tool(Tool::Pan);
        let before = s.stencil().cloned();
        s.pointer_down(7, StrokeSample::at(10.0, 10.0));
        s.pointer_move(7, &[StrokeSample::at(0.0, 0.0)]);
        s.pointer_up(7);
        assert_eq!(s.stencil().cloned(), before);
        assert_eq!(s.surface.scroll(), vec2(10.0, 10.0));
        assert_eq!(s.history().undo_len(), 1);
    }

    #[test]
    fn open_work_restores_pair_and_style() {
        let mut s = generated(false);
        s.select_style(ColorStyle::Rojas);
        let work = s.works()[0].clone();
        s.reset();
        s.open_work(&work).unwrap();
        assert_eq!(s.style(), ColorStyle::Negras);
        assert_eq!(s.stencil().cloned().unwrap(), line_art());
        assert_eq!(s.original().unwrap().pixel(0, 0), [90, 120, 200, 255]);
        assert_eq!(s.history().undo_len(), 1);
    }

    #[test]
    fn undo_of_transparency_toggle_restores_opaque_mode() {
        let mut s = generated(false);
        s.set_transparent(true);
        assert!(s.undo());
        assert!(!s.transparent());
        assert_eq!(s.stencil().unwrap().pixel(5, 5), [255, 255, 255, 255]);

        s.select_style(ColorStyle::Rojas);
        assert_eq!(s.stencil().unwrap().pixel(5, 5), [255, 255, 255, 255]);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x7f, 0x1d, 0x1d, 255]);

        assert!(s.undo());
        assert!(s.redo());
        assert!(!s.transparent());
    }

    #[test]
    fn redo_of_transparency_toggle_restores_transparent_mode() {
        let mut s = generated(false);
        s.set_transparent(true);
        s.undo();
        assert!(s.redo());
        assert!(s.transparent());
        s.select_style(ColorStyle::Azules);
        assert_eq!(s.stencil().unwrap().pixel(5, 5)[3], 0);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x1e, 0x3a, 0x8a, 255]);
    }

    #[test]
    fn recolor_after_undo_matches_direct_recolor() {
        let mut art = line_art();
        art.pixels_mut().put_pixel(3, 3, image::Rgba([128, 128, 128, 255]));

        let mut direct = session(false);
        direct.load_stencil(art.clone(), [0, 0, 0]);
        direct.select_style(ColorStyle::Azules);

        let mut s = session(false);
        s.load_stencil(art, [0, 0, 0]);
        s.select_style(ColorStyle::Rojas);
        assert!(s.undo());
        assert_eq!(s.style(), ColorStyle::Negras);
        assert_eq!(s.line_color(), [0, 0, 0]);
        s.select_style(ColorStyle::Azules);
        assert_eq!(s.stencil().unwrap().pixel(3, 3), direct.stencil().unwrap().pixel(3, 3));
        assert_eq!(s.stencil(), direct.stencil());
    }

    #[test]
    fn reselecting_style_after_undo_recolors_again() {
        let mut s = generated(false);
        s.select_style(ColorStyle::Rojas);
        s.undo();
        s.select_style(ColorStyle::Rojas);
        assert_eq!(s.stencil().unwrap().pixel(5, 20), [0x7f, 0x1d, 0x1d, 255]);
        assert_eq!(s.history().undo_len(), 2);
    }
}
