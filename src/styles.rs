//! Recognized stencil line colors.
//!
//! The id is both the persisted style tag and the color word sent to the
//! generation service.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorStyle {
    #[default]
    Negras,
    Rojas,
    Azules,
    Violetas,
    Verdes,
}

impl ColorStyle {
    pub const ALL: [ColorStyle; 5] = [
        ColorStyle::Negras,
        ColorStyle::Rojas,
        ColorStyle::Azules,
        ColorStyle::Violetas,
        ColorStyle::Verdes,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ColorStyle::Negras => "negras",
            ColorStyle::Rojas => "rojas",
            ColorStyle::Azules => "azules",
            ColorStyle::Violetas => "violetas",
            ColorStyle::Verdes => "verdes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorStyle::Negras => "Black",
            ColorStyle::Rojas => "Dark red",
            ColorStyle::Azules => "Dark blue",
            ColorStyle::Violetas => "Dark violet",
            ColorStyle::Verdes => "Dark green",
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            ColorStyle::Negras => [0x00, 0x00, 0x00],
            ColorStyle::Rojas => [0x7f, 0x1d, 0x1d],
            ColorStyle::Azules => [0x1e, 0x3a, 0x8a],
            ColorStyle::Violetas => [0x4c, 0x1d, 0x95],
            ColorStyle::Verdes => [0x14, 0x53, 0x2d],
        }
    }

    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL.into_iter().find(|s| s.id().eq_ignore_ascii_case(id))
    }
}

impl std::fmt::Display for ColorStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl ColorStyle {
    /// Accept a style id or the hex of one of the palette colors.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_id(s).or_else(|| {
            let rgb = parse_hex(s)?;
            Self::ALL.into_iter().find(|style| style.rgb() == rgb)
        })
    }
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 || !s.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_hexes() {
        assert_eq!(ColorStyle::Negras.hex(), "#000000");
        assert_eq!(ColorStyle::Rojas.hex(), "#7f1d1d");
        assert_eq!(ColorStyle::Azules.hex(), "#1e3a8a");
        assert_eq!(ColorStyle::Violetas.hex(), "#4c1d95");
        assert_eq!(ColorStyle::Verdes.hex(), "#14532d");
    }

    #[test]
    fn ids_round_trip_and_serialize_lowercase() {
        for style in ColorStyle::ALL {
            assert_eq!(ColorStyle::from_id(style.id()), Some(style));
            assert_eq!(parse_hex(&style.hex()), Some(style.rgb()));
        }
        assert_eq!(serde_json::to_string(&ColorStyle::Rojas).unwrap(), "\"rojas\"");
        assert_eq!(ColorStyle::from_id("amarillas"), None);
        assert_eq!(ColorStyle::parse("#1E3A8A"), Some(ColorStyle::Azules));
        assert_eq!(ColorStyle::parse("#123456"), None);
    }
}
