//! Stencil generation backends.
//!
//! [`GeminiGenerator`] asks the Gemini image model to redraw the photo as line
//! art. [`SketchGenerator`] is an offline fallback that traces luminance edges
//! locally. Both return a line-on-white raster in the requested color.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::error::GenerationError;
use crate::ops::recolor::recolor_opaque;
use crate::raster::RasterImage;
use crate::settings::{AppSettings, Backend};
use crate::styles::ColorStyle;

/// Everything a backend needs for one generation.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Uploaded file in its original encoding.
    pub image: Vec<u8>,
    pub mime: String,
    pub style: ColorStyle,
    /// Optional free-text instruction from the user.
    pub prompt: Option<String>,
}

pub trait StencilGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerationRequest) -> Result<RasterImage, GenerationError>;
}

/// Build the configured backend.
pub fn from_settings(settings: &AppSettings) -> Box<dyn StencilGenerator> {
    match settings.backend {
        Backend::Gemini => Box::new(GeminiGenerator::from_settings(settings)),
        Backend::Sketch => Box::new(SketchGenerator::default()),
    }
}

/// Fixed stencil directive, parameterized by the color word.
pub fn stencil_prompt(style: ColorStyle) -> String {
    let color = style.id();
    format!(
        "Dibuja una plantilla de tatuaje profesional en líneas sólidas, sin sombras. Estilo dibujo hecho a mano técnico, preparado para stencil de tatuaje.\n\n\
         El trazo debe ser nítido, preciso y limpio, sin degradados.\n\n\
         Usa solo líneas {color} sobre fondo blanco puro, sin textura de papel.\n\n\
         Resalta todos los músculos y líneas de expresión del rostro y cuerpo con líneas claras y bien definidas.\n\n\
         Representa las diferentes zonas de sombras (sombras oscuras, sombras claras y luces) únicamente mediante patrones de línea o grosor, sin relleno.\n\n\
         Dibuja la imagen tal y como aparece con máxima definición, mostrando detalles anatómicos exactos.\n\n\
         Mantén el encuadre exacto de la imagen original. No recortes, no hagas zoom, ni desplaces el sujeto. La superposición debe ser perfecta.\n\n\
         Traza el cabello con detalle fino, siguiendo la dirección natural del crecimiento, usando líneas dinámicas.\n\n\
         Indica los highlights (luces) con trazos bien marcados o líneas finas discontinuas.\n\n\
         La composición debe ser sin perspectiva, sin adelgazamientos ni deformaciones.\n\n\
         Representa todos los detalles de la imagen original (contornos, pliegues, sombras, reflejos) exclusivamente mediante líneas.\n\n\
         El diseño debe estar listo y completo para impresión en termo copiadora (stencil de tatuaje).\n\n\
         Estilo: Line art técnico, stencil tattoo, trazado digital nítido, líneas {color} sobre fondo blanco, alta resolución, sin relleno ni sombreado.\n\n\
         Formato final: Imagen lista para imprimir o transferir a papel hectográfico.\n"
    )
}

/// Prefix the user's instruction, if any, to the stencil directive.
pub fn compose_prompt(style: ColorStyle, user: Option<&str>) -> String {
    let base = stencil_prompt(style);
    match user.map(str::trim).filter(|p| !p.is_empty()) {
        Some(instruction) => format!(
            "USER INSTRUCTION: {}\n\nSTENCIL GUIDELINES:\n{}",
            instruction, base
        ),
        None => base,
    }
}

// ============================================================================
// GEMINI
// ============================================================================

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Debug)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
struct InlineData {
    #[serde(default)]
    data: String,
}

/// Pull the first inline image out of a `generateContent` response body.
pub fn extract_inline_image(body: &serde_json::Value) -> Result<Vec<u8>, GenerationError> {
    let response: GenerateResponse = serde_json::from_value(body.clone())
        .map_err(|e| GenerationError::Transport(format!("unexpected response shape: {}", e)))?;
    let data = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.inline_data)
                .find(|d| !d.data.is_empty())
        })
        .ok_or(GenerationError::NoImage)?;
    STANDARD
        .decode(data.data.trim())
        .map_err(|e| GenerationError::Decode(e.to_string()))
}

#[derive(Clone, Debug)]
pub struct GeminiGenerator {
    endpoint: String,
    model: String,
    api_key_env: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key_env: settings.api_key_env.clone(),
            timeout: Duration::from_secs(180),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Request JSON: the photo as inline data followed by the prompt text.
    pub fn request_body(request: &GenerationRequest) -> Result<serde_json::Value, GenerationError> {
        let (mime, bytes) = normalize_payload(request)?;
        Ok(json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": mime, "data": STANDARD.encode(bytes) } },
                    { "text": compose_prompt(request.style, request.prompt.as_deref()) }
                ]
            }]
        }))
    }
}

/// Pass PNG/JPEG/WebP through; anything else is re-encoded as PNG.
fn normalize_payload(request: &GenerationRequest) -> Result<(String, Vec<u8>), GenerationError> {
    match request.mime.as_str() {
        "image/png" | "image/jpeg" | "image/webp" => Ok((request.mime.clone(), request.image.clone())),
        _ => {
            let png = RasterImage::decode(&request.image)?.encode_png()?;
            Ok(("image/png".to_string(), png))
        }
    }
}

impl StencilGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<RasterImage, GenerationError> {
        let key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(self.api_key_env.clone()))?;
        let body = Self::request_body(request)?;

        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let response = agent
            .post(&self.url())
            .set("x-goog-api-key", &key)
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let detail: String = resp.into_string().unwrap_or_default().chars().take(300).collect();
                    GenerationError::Transport(format!("HTTP {}: {}", code, detail))
                }
                ureq::Error::Transport(t) => GenerationError::Transport(t.to_string()),
            })?;
        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| GenerationError::Transport(format!("unreadable response: {}", e)))?;

        let bytes = extract_inline_image(&json)?;
        Ok(RasterImage::decode(&bytes)?)
    }
}

// ============================================================================
// OFFLINE SKETCH
// ============================================================================

/// Sobel edge tracer. Strong luminance gradients become ink.
#[derive(Clone, Debug)]
pub struct SketchGenerator {
    pub edge_strength: f32,
    /// Gradient magnitude (luminance in 0..1) above which a pixel is inked.
    pub threshold: f32,
}

impl Default for SketchGenerator {
    fn default() -> Self {
        Self {
            edge_strength: 100.0,
            threshold: 0.35,
        }
    }
}

impl SketchGenerator {
    /// Black lines on opaque white, same size as `src`.
    pub fn trace(&self, src: &RasterImage) -> RasterImage {
        let (w, h) = (src.width() as usize, src.height() as usize);
        if w == 0 || h == 0 {
            return src.clone();
        }
        let src_raw = src.pixels().as_raw();
        let stride = w * 4;
        let mut dst_raw = vec![0u8; w * h * 4];

        dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
            let lum = |px: i32, py: i32| -> f32 {
                let cx = px.clamp(0, w as i32 - 1) as usize;
                let cy = py.clamp(0, h as i32 - 1) as usize;
                let si = cy * stride + cx * 4;
                let a = src_raw[si + 3] as f32 / 255.0;
                // Transparent areas read as white paper.
                let l = 0.2126 * src_raw[si] as f32
                    + 0.7152 * src_raw[si + 1] as f32
                    + 0.0722 * src_raw[si + 2] as f32;
                (l * a + 255.0 * (1.0 - a)) / 255.0
            };
            let iy = y as i32;
            for x in 0..w {
                let ix = x as i32;
                let gx = -lum(ix - 1, iy - 1) - 2.0 * lum(ix - 1, iy) - lum(ix - 1, iy + 1)
                    + lum(ix + 1, iy - 1)
                    + 2.0 * lum(ix + 1, iy)
                    + lum(ix + 1, iy + 1);
                let gy = -lum(ix - 1, iy - 1) - 2.0 * lum(ix, iy - 1) - lum(ix + 1, iy - 1)
                    + lum(ix - 1, iy + 1)
                    + 2.0 * lum(ix, iy + 1)
                    + lum(ix + 1, iy + 1);
                let edge = (gx * gx + gy * gy).sqrt() * self.edge_strength / 100.0;
                let val = if edge > self.threshold { 0u8 } else { 255u8 };
                row_out[x * 4..x * 4 + 4].copy_from_slice(&[val, val, val, 255]);
            }
        });

        RasterImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|_| src.clone())
    }
}

impl StencilGenerator for SketchGenerator {
    fn name(&self) -> &str {
        "sketch"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<RasterImage, GenerationError> {
        let photo = RasterImage::decode(&request.image)?;
        let lines = self.trace(&photo);
        Ok(match request.style {
            ColorStyle::Negras => lines,
            style => recolor_opaque(&lines, style.rgb()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(style: ColorStyle, prompt: Option<&str>) -> GenerationRequest {
        let mut photo = RasterImage::filled(20, 20, [255, 255, 255, 255]);
        for y in 0..20 {
            for x in 10..20 {
                photo.pixels_mut().put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        GenerationRequest {
            image: photo.encode_png().unwrap(),
            mime: "image/png".to_string(),
            style,
            prompt: prompt.map(str::to_string),
        }
    }

    #[test]
    fn prompt_carries_color_word_and_user_instruction() {
        let base = compose_prompt(ColorStyle::Rojas, None);
        assert!(base.contains("Usa solo líneas rojas sobre fondo blanco puro"));
        assert!(!base.contains("USER INSTRUCTION"));
        let with_user = compose_prompt(ColorStyle::Rojas, Some("  only the face "));
        assert!(with_user.starts_with("USER INSTRUCTION: only the face\n\nSTENCIL GUIDELINES:\n"));
        assert!(with_user.ends_with(&base));
        assert_eq!(compose_prompt(ColorStyle::Negras, Some("   ")), stencil_prompt(ColorStyle::Negras));
    }

    #[test]
    fn request_body_inlines_the_photo() {
        let req = request(ColorStyle::Azules, None);
        let body = GeminiGenerator::request_body(&req).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        let data = parts[0]["inlineData"]["data"].as_str().unwrap();
        assert_eq!(STANDARD.decode(data).unwrap(), req.image);
        assert!(parts[1]["text"].as_str().unwrap().contains("líneas azules"));
    }

    #[test]
    fn unusual_mime_is_reencoded_as_png() {
        let mut req = request(ColorStyle::Negras, None);
        req.mime = "image/bmp".to_string();
        let body = GeminiGenerator::request_body(&req).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn response_without_image_is_no_image() {
        let text_only = json!({ "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }] });
        assert_eq!(extract_inline_image(&text_only), Err(GenerationError::NoImage));
        assert_eq!(extract_inline_image(&json!({})), Err(GenerationError::NoImage));
    }

    #[test]
    fn response_image_is_decoded() {
        let png = RasterImage::filled(2, 2, [0, 0, 0, 255]).encode_png().unwrap();
        let body = json!({ "candidates": [{ "content": { "parts": [
            { "text": "here you go" },
            { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(&png) } }
        ] } }] });
        assert_eq!(extract_inline_image(&body).unwrap(), png);
    }

    #[test]
    fn sketch_traces_edges_in_style_color() {
        let out = SketchGenerator::default()
            .generate(&request(ColorStyle::Rojas, None))
            .unwrap();
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.pixel(10, 5), [0x7f, 0x1d, 0x1d, 255]);
        assert_eq!(out.pixel(2, 5), [255, 255, 255, 255]);
        assert_eq!(out.pixel(17, 5), [255, 255, 255, 255]);
    }
}
