//! Background color parsing and formatting
//!
//! Accepts the color strings a settings surface typically hands over:
//! the literal `transparent`, hex notation, `rgb()`/`rgba()` and a short
//! table of CSS named colors.

use crate::{
    config::BackgroundColor,
    error::{BgRemovalError, Result},
};
use image::Rgba;

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
];

/// Utility for parsing and converting colors
pub struct ColorParser;

impl ColorParser {
    /// Parse any supported color string
    ///
    /// # Examples
    /// ```rust
    /// use imgly_maskcomp::{utils::ColorParser, BackgroundColor};
    ///
    /// assert_eq!(ColorParser::parse("transparent")?, BackgroundColor::Transparent);
    /// assert_eq!(ColorParser::parse("#fff")?, BackgroundColor::rgb(255, 255, 255));
    /// assert_eq!(ColorParser::parse("rgb(0, 128, 255)")?, BackgroundColor::rgb(0, 128, 255));
    /// # Ok::<(), imgly_maskcomp::BgRemovalError>(())
    /// ```
    pub fn parse(input: &str) -> Result<BackgroundColor> {
        let trimmed = input.trim();

        if trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(BackgroundColor::Transparent);
        }

        let lower = trimmed.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            return Self::parse_functional(trimmed, args);
        }

        if trimmed.starts_with('#') {
            return Self::parse_hex(trimmed);
        }

        if let Some((_, [r, g, b])) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
            return Ok(BackgroundColor::rgb(*r, *g, *b));
        }

        if Self::is_valid_hex(trimmed) {
            return Self::parse_hex(trimmed);
        }

        Err(BgRemovalError::invalid_config(format!(
            "Unrecognized background color '{}'",
            input
        )))
    }

    /// Parse a hex color string
    ///
    /// Supports `#RGB`, `#RGBA`, `#RRGGBB` and `#RRGGBBAA`, with or without
    /// the leading `#`.
    pub fn parse_hex(hex: &str) -> Result<BackgroundColor> {
        let digits = hex.trim().trim_start_matches('#');

        if !Self::is_valid_hex(digits) {
            return Err(BgRemovalError::invalid_config(format!(
                "Color '{}' must be in #RGB, #RGBA, #RRGGBB or #RRGGBBAA format",
                hex
            )));
        }

        let nibbles: Vec<u8> = digits
            .chars()
            .filter_map(|c| c.to_digit(16))
            .map(|d| d as u8)
            .collect();

        let channels: Vec<u8> = match nibbles.len() {
            3 | 4 => nibbles.iter().map(|n| n * 17).collect(),
            _ => nibbles.chunks(2).map(|pair| pair.iter().fold(0, |acc, n| acc * 16 + n)).collect(),
        };

        match channels.as_slice() {
            [r, g, b] => Ok(BackgroundColor::rgb(*r, *g, *b)),
            [r, g, b, a] => Ok(BackgroundColor::Solid(Rgba([*r, *g, *b, *a]))),
            _ => Err(BgRemovalError::invalid_config(format!(
                "Color '{}' has an unexpected number of channels",
                hex
            ))),
        }
    }

    /// Parse the argument list of `rgb(...)` / `rgba(...)`
    fn parse_functional(original: &str, args: &str) -> Result<BackgroundColor> {
        let invalid = || {
            BgRemovalError::invalid_config(format!(
                "Color '{}' must look like rgb(r, g, b) or rgba(r, g, b, a)",
                original
            ))
        };

        let inner = args.trim_end().strip_suffix(')').ok_or_else(invalid)?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();

        let channel = |s: &str| s.parse::<u8>().map_err(|_| invalid());

        match parts.as_slice() {
            [r, g, b] => Ok(BackgroundColor::rgb(channel(r)?, channel(g)?, channel(b)?)),
            [r, g, b, a] => {
                let alpha: f32 = a.parse().map_err(|_| invalid())?;
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(invalid());
                }
                let alpha = (alpha * 255.0).round() as u8;
                Ok(BackgroundColor::Solid(Rgba([
                    channel(r)?,
                    channel(g)?,
                    channel(b)?,
                    alpha,
                ])))
            },
            _ => Err(invalid()),
        }
    }

    /// Convert a color to its canonical string form
    ///
    /// Opaque colors become `#rrggbb`, translucent ones `#rrggbbaa`.
    #[must_use]
    pub fn to_hex(color: &BackgroundColor) -> String {
        match color {
            BackgroundColor::Transparent => "transparent".to_string(),
            BackgroundColor::Solid(Rgba([r, g, b, 255])) => format!("#{:02x}{:02x}{:02x}", r, g, b),
            BackgroundColor::Solid(Rgba([r, g, b, a])) => {
                format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
            },
        }
    }

    /// Validate hex color format without parsing
    #[must_use]
    pub fn is_valid_hex(hex: &str) -> bool {
        let hex = hex.trim_start_matches('#');

        matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
    }
}
