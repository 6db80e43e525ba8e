//! Maps the printer vendor's filament vocabulary onto the inventory's.
//!
//! The printer reports the product line ("PLA Matte", "PLA Basic") as the
//! sub-brand and a coarse material ("PLA") as the type. The inventory files
//! everything under one brand label and uses the product line as the type.

use crate::tray::UNKNOWN;

/// Product-line names the inventory stores under a shorter canonical name.
pub const TYPE_ALIASES: &[(&str, &str)] = &[("PLA Basic", "PLA")];

/// Vendor RGBA color codes (alpha byte last) and their catalogue names.
///
/// Pure white and pure black are absent on purpose; they resolve per
/// product line in [`normalize_color`].
pub const COLOR_NAMES: &[(&str, &str)] = &[
    ("8E9089FF", "Gray"),
    ("A6A9AAFF", "Silver"),
    ("C12E1FFF", "Red"),
    ("F55A74FF", "Pink"),
    ("FF6A13FF", "Orange"),
    ("F4EE2AFF", "Yellow"),
    ("FEC600FF", "Sunflower Yellow"),
    ("00AE42FF", "Bambu Green"),
    ("164B35FF", "Mistletoe Green"),
    ("0086D6FF", "Cyan"),
    ("0A2989FF", "Blue"),
    ("5E43B7FF", "Purple"),
    ("9D432CFF", "Brown"),
    ("D1D3D5FF", "Light Gray"),
    ("7D6556FF", "Dark Brown"),
];

const WHITE: &str = "FFFFFFFF";
const BLACK: &str = "000000FF";

/// Inventory brand and type for one spool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFilament {
    pub brand: String,
    pub filament_type: String,
}

/// Naming rules for one deployment.
#[derive(Debug, Clone)]
pub struct FilamentNaming {
    brand: String,
    translate_colors: bool,
}

impl FilamentNaming {
    pub fn new(brand: impl Into<String>, translate_colors: bool) -> Self {
        Self {
            brand: brand.into(),
            translate_colors,
        }
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Map a tray's sub-brand and type to the inventory's brand and type.
    ///
    /// The sub-brand wins when present, then the type, then `"Unknown"`.
    pub fn normalize(&self, sub_brand: &str, filament_type: &str) -> NormalizedFilament {
        let raw = [sub_brand, filament_type]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(UNKNOWN);

        let filament_type = TYPE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == raw)
            .map_or(raw, |(_, canonical)| *canonical)
            .to_string();

        NormalizedFilament {
            brand: self.brand.clone(),
            filament_type,
        }
    }

    /// The color string to send to the inventory.
    pub fn color(&self, color_code: &str, filament_type: &str) -> String {
        if self.translate_colors {
            normalize_color(color_code, filament_type)
        } else {
            color_code.to_string()
        }
    }
}

/// Translate a vendor hex code to a color name, or return it unchanged.
pub fn normalize_color(hex: &str, filament_type: &str) -> String {
    let code = hex.trim().trim_start_matches('#').to_ascii_uppercase();
    let matte = filament_type.to_ascii_lowercase().contains("matte");

    let name = match code.as_str() {
        WHITE if matte => Some("Ivory White"),
        WHITE => Some("White"),
        BLACK if matte => Some("Charcoal"),
        BLACK => Some("Black"),
        other => COLOR_NAMES
            .iter()
            .find(|(known, _)| *known == other)
            .map(|(_, name)| *name),
    };

    name.map_or_else(|| hex.to_string(), str::to_string)
}
