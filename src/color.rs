use serde::{Deserialize, Serialize};

/// Highlight color used when a record carries none
pub const DEFAULT_HIGHLIGHT: Color = Color::rgb(0xF5, 0x9E, 0x0B);

/// Palette cycled through by category list position
pub const DEFAULT_PALETTE: [Color; 10] = [
    Color::rgb(0xF5, 0x9E, 0x0B),
    Color::rgb(0x3B, 0x82, 0xF6),
    Color::rgb(0x10, 0xB9, 0x81),
    Color::rgb(0xEF, 0x44, 0x44),
    Color::rgb(0x8B, 0x5C, 0xF6),
    Color::rgb(0xEC, 0x48, 0x99),
    Color::rgb(0x14, 0xB8, 0xA6),
    Color::rgb(0xF9, 0x73, 0x16),
    Color::rgb(0x63, 0x66, 0xF1),
    Color::rgb(0x84, 0xCC, 0x16),
];

/// Opaque RGB display color, stored as `#rrggbb`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// RGBA pixel with the given alpha
    #[must_use]
    pub fn with_alpha(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }

    /// Palette entry for a list position
    #[must_use]
    pub fn from_palette(palette: &[Color], index: usize) -> Self {
        if palette.is_empty() {
            return DEFAULT_HIGHLIGHT;
        }
        palette[index % palette.len()]
    }
}

impl Default for Color {
    fn default() -> Self {
        DEFAULT_HIGHLIGHT
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value).ok_or_else(|| format!("invalid color '{value}'"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}
