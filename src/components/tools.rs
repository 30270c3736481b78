//! Editing tools and their settings.

use egui::Color32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    None,
    Pencil,
    Eraser,
    Pan,
}

impl Tool {
    /// Tools that rasterize a stroke on pointer-down.
    pub fn paints(self) -> bool {
        matches!(self, Tool::Pencil | Tool::Eraser)
    }

    pub fn label(self) -> &'static str {
        match self {
            Tool::None => "None",
            Tool::Pencil => "Pencil",
            Tool::Eraser => "Eraser",
            Tool::Pan => "Pan",
        }
    }
}

pub const PENCIL_SIZE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=20.0;
pub const PENCIL_OPACITY_RANGE: std::ops::RangeInclusive<f32> = 1.0..=100.0;
pub const ERASER_SIZE_RANGE: std::ops::RangeInclusive<f32> = 3.0..=50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PencilSettings {
    pub color: [u8; 3],
    pub size: f32,
    /// 0-100
    pub opacity_percent: f32,
}

impl Default for PencilSettings {
    fn default() -> Self {
        Self {
            color: [0x7f, 0x1d, 0x1d],
            size: 3.0,
            opacity_percent: 100.0,
        }
    }
}

impl PencilSettings {
    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(*PENCIL_SIZE_RANGE.start(), *PENCIL_SIZE_RANGE.end());
    }

    pub fn set_opacity(&mut self, percent: f32) {
        self.opacity_percent = percent.clamp(0.0, 100.0);
    }

    pub fn color32(&self) -> Color32 {
        let [r, g, b] = self.color;
        Color32::from_rgb(r, g, b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EraserSettings {
    pub size: f32,
}

impl Default for EraserSettings {
    fn default() -> Self {
        Self { size: 12.0 }
    }
}

impl EraserSettings {
    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(*ERASER_SIZE_RANGE.start(), *ERASER_SIZE_RANGE.end());
    }
}

/// Active tool plus the per-tool settings.
#[derive(Clone, Debug, Default)]
pub struct ToolsPanel {
    active: Tool,
    pub pencil: PencilSettings,
    pub eraser: EraserSettings,
}

impl ToolsPanel {
    pub fn active(&self) -> Tool {
        self.active
    }

    /// Select `tool`; re-selecting the active tool clears it.
    pub fn toggle(&mut self, tool: Tool) {
        self.active = if self.active == tool { Tool::None } else { tool };
    }

    pub fn clear(&mut self) {
        self.active = Tool::None;
    }
}
