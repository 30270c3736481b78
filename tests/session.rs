use std::sync::{Arc, Mutex};
use std::time::Duration;

use easystencil::components::stroke::StrokeSample;
use easystencil::components::tools::Tool;
use easystencil::error::{GENERATION_FAILED_MESSAGE, GenerationError, PersistenceError};
use easystencil::io::Upload;
use easystencil::ops::generate::{GenerationRequest, SketchGenerator, StencilGenerator};
use easystencil::raster::RasterImage;
use easystencil::store::{MAX_WORKS, MemoryStore, StencilWork, WorkStore};
use easystencil::styles::ColorStyle;
use easystencil::SessionController;
use egui::{Pos2, Rect, vec2};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

const WAIT: Duration = Duration::from_secs(20);

/// Store whose contents the test can still read after handing it to a session.
#[derive(Clone, Default)]
struct SharedStore(Arc<Mutex<MemoryStore>>);

impl SharedStore {
    fn raw(&self) -> Option<String> {
        self.0.lock().unwrap().raw().map(str::to_string)
    }

    fn saved(&self) -> Vec<StencilWork> {
        self.0.lock().unwrap().load().unwrap()
    }
}

impl WorkStore for SharedStore {
    fn load(&self) -> Result<Vec<StencilWork>, PersistenceError> {
        self.0.lock().unwrap().load()
    }

    fn save(&mut self, works: &[StencilWork]) -> Result<(), PersistenceError> {
        self.0.lock().unwrap().save(works)
    }
}

/// Returns a black horizontal rule across white, the size of the upload.
struct RuleGenerator {
    calls: Mutex<Vec<GenerationRequest>>,
}

impl RuleGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }
}

impl StencilGenerator for RuleGenerator {
    fn name(&self) -> &str {
        "rule"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<RasterImage, GenerationError> {
        let (w, h) = RasterImage::decode(&request.image)?.dimensions();
        self.calls.lock().unwrap().push(request.clone());
        let mut img = RasterImage::filled(w, h, [255, 255, 255, 255]);
        for x in 0..w {
            for y in h / 2 - 2..h / 2 + 2 {
                img.pixels_mut().put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        Ok(img)
    }
}

fn jpeg_500() -> Vec<u8> {
    let photo = RgbImage::from_fn(500, 500, |x, y| image::Rgb([(x / 2) as u8, (y / 2) as u8, 128]));
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 85)
        .encode(photo.as_raw(), 500, 500, ColorType::Rgb8)
        .unwrap();
    bytes
}

fn generate_once(session: &mut SessionController) {
    assert!(session.generate());
    assert!(session.wait_for_generation(WAIT));
    assert_eq!(session.last_error(), None);
}

#[test]
fn jpeg_upload_generates_and_persists_capped_history() {
    let store = SharedStore::default();
    let generator = RuleGenerator::new();
    let mut session = SessionController::new(generator.clone(), Box::new(store.clone()));

    let bytes = jpeg_500();
    assert!(bytes.len() < 10 * 1024 * 1024);
    let upload = Upload::from_bytes(bytes, Some("image/jpeg"), Some("portrait.jpg".into())).unwrap();
    session.load_upload(upload.clone()).unwrap();
    assert_eq!(session.original().unwrap().dimensions(), (500, 500));

    generate_once(&mut session);
    let saved = store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].original_image, upload.to_data_uri());
    assert_eq!(
        saved[0].stencil_image,
        session.stencil().unwrap().to_data_uri().unwrap()
    );
    assert_eq!(saved[0].style.as_deref(), Some("negras"));
    assert!(store.raw().unwrap().contains("\"stencilImage\""));

    let first_id = saved[0].id.clone();
    for _ in 1..51 {
        generate_once(&mut session);
    }
    let saved = store.saved();
    assert_eq!(saved.len(), MAX_WORKS);
    assert!(saved.iter().all(|w| w.id != first_id));
    assert!(saved.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
    assert_eq!(session.works().len(), MAX_WORKS);
    assert_eq!(session.generation_count(), 51);
    assert_eq!(generator.calls.lock().unwrap()[0].mime, "image/jpeg");
}

#[test]
fn selecting_rojas_recolors_once_with_one_commit() {
    let mut session = SessionController::new(RuleGenerator::new(), Box::new(MemoryStore::new()));
    session.load_bytes(jpeg_500(), Some("image/jpeg"), None).unwrap();
    generate_once(&mut session);

    let revision = session.revision();
    assert_eq!(session.history().undo_len(), 1);
    session.select_style(ColorStyle::Rojas);

    assert_eq!(session.revision(), revision + 1);
    assert_eq!(session.history().undo_len(), 2);
    assert!(!session.history().can_redo());
    assert_eq!(session.stencil().unwrap().pixel(10, 250), [0x7f, 0x1d, 0x1d, 255]);
    assert_eq!(session.stencil().unwrap().pixel(10, 10), [255, 255, 255, 255]);
    assert_eq!(ColorStyle::Rojas.hex(), "#7f1d1d");
}

#[test]
fn prompt_and_style_reach_the_generator() {
    let generator = RuleGenerator::new();
    let mut session = SessionController::new(generator.clone(), Box::new(MemoryStore::new()));
    session.load_bytes(jpeg_500(), Some("image/jpeg"), None).unwrap();
    session.select_style(ColorStyle::Violetas);
    session.prompt = "only the face".into();
    generate_once(&mut session);

    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls[0].style, ColorStyle::Violetas);
    assert_eq!(calls[0].prompt.as_deref(), Some("only the face"));
    assert_eq!(session.works()[0].style.as_deref(), Some("violetas"));
}

#[test]
fn corrupt_store_starts_empty_and_recovers() {
    let store = SharedStore(Arc::new(Mutex::new(MemoryStore::with_raw("{not json"))));
    let mut session = SessionController::new(RuleGenerator::new(), Box::new(store.clone()));
    assert!(session.works().is_empty());
    session.load_bytes(jpeg_500(), Some("image/jpeg"), None).unwrap();
    generate_once(&mut session);
    assert_eq!(store.saved().len(), 1);
}

#[test]
fn stroke_undo_redo_and_new_edit_drops_redo() {
    let mut session = SessionController::new(RuleGenerator::new(), Box::new(MemoryStore::new()));
    session.load_bytes(jpeg_500(), Some("image/jpeg"), None).unwrap();
    generate_once(&mut session);
    session
        .surface
        .set_viewport(Rect::from_min_size(Pos2::ZERO, vec2(500.0, 500.0)), [500, 500]);
    session.surface.set_split_position(100.0);
    session.toggle_tool(Tool::Pencil);

    session.pointer_down(3, StrokeSample::at(100.0, 100.0));
    session.pointer_move(3, &[StrokeSample::at(110.0, 100.0), StrokeSample::at(120.0, 100.0)]);
    session.pointer_up(3);
    assert_eq!(session.history().undo_len(), 2);
    assert_ne!(session.stencil().unwrap().pixel(110, 100), [255, 255, 255, 255]);

    assert!(session.undo());
    assert_eq!(session.stencil().unwrap().pixel(110, 100), [255, 255, 255, 255]);
    assert!(session.history().can_redo());

    session.select_style(ColorStyle::Azules);
    assert!(!session.history().can_redo());
    assert!(!session.redo());
}

#[test]
fn offline_sketch_backend_runs_end_to_end() {
    let mut session = SessionController::new(Arc::new(SketchGenerator::default()), Box::new(MemoryStore::new()));
    session.select_style(ColorStyle::Azules);
    session.load_bytes(jpeg_500(), Some("image/jpeg"), None).unwrap();
    generate_once(&mut session);
    let stencil = session.stencil().unwrap();
    assert_eq!(stencil.dimensions(), (500, 500));
    assert!(
        stencil
            .pixels()
            .pixels()
            .all(|p| p.0[3] == 255)
    );
}

#[test]
fn generation_failure_is_generic_and_session_stays_usable() {
    struct Offline;
    impl StencilGenerator for Offline {
        fn name(&self) -> &str {
            "offline"
        }
        fn generate(&self, _: &GenerationRequest) -> Result<RasterImage, GenerationError> {
            Err(GenerationError::Transport("connection refused".into()))
        }
    }

    let mut session = SessionController::new(Arc::new(Offline), Box::new(MemoryStore::new()));
    session.load_bytes(jpeg_500(), Some("image/jpeg"), None).unwrap();
    assert!(session.generate());
    assert!(session.wait_for_generation(WAIT));
    assert_eq!(session.last_error(), Some(GENERATION_FAILED_MESSAGE));
    assert!(session.can_generate());
    assert!(session.works().is_empty());
}
