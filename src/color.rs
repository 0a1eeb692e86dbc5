use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::MetadataValue;

/// 8-bit sRGB colour shared by the PNG renderer and the viewer.
pub type Rgb8 = Srgb<u8>;

pub const GRAY: Rgb8 = Srgb::new(160, 160, 160);

// ---------------------------------------------------------------------------
// Proxy family palette
// ---------------------------------------------------------------------------

/// Earth tones indexed by proxy family minus two (families 2..=9).
const FAMILY_PALETTE: [Rgb8; 8] = [
    Srgb::new(0xf5, 0xde, 0xb3), // wheat
    Srgb::new(0xd2, 0xb4, 0x8c), // tan
    Srgb::new(0xbc, 0x8f, 0x8f), // rosy brown
    Srgb::new(0xf4, 0xa4, 0x60), // sandy brown
    Srgb::new(0xda, 0xa5, 0x20), // goldenrod
    Srgb::new(0xd2, 0x69, 0x1e), // chocolate
    Srgb::new(0x8b, 0x45, 0x13), // saddle brown
    Srgb::new(0x80, 0x00, 0x00), // maroon
];

/// Fill colour of a proxy family (thousands digit of the data-type code).
pub fn family_color(family: u8) -> Rgb8 {
    let slot = usize::from(family.clamp(2, 9) - 2);
    FAMILY_PALETTE[slot]
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb8> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let rgb: Srgb = Hsl::new(hue, 0.75, 0.55).into_color();
            rgb.into_format()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: metadata value → colour
// ---------------------------------------------------------------------------

/// Maps unique metadata values of a chosen column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<MetadataValue, Rgb8>,
    default_color: Rgb8,
}

impl ColorMap {
    /// Build a colour map for the given column from its unique values.
    pub fn new(column: &str, unique_values: &BTreeSet<MetadataValue>) -> Self {
        let mapping = unique_values
            .iter()
            .cloned()
            .zip(generate_palette(unique_values.len()))
            .collect();

        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: GRAY,
        }
    }

    pub fn color_for(&self, value: &MetadataValue) -> Rgb8 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (value label → colour) in value order.
    pub fn legend_entries(&self) -> Vec<(String, Rgb8)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let colours = generate_palette(6);
        assert_eq!(colours.len(), 6);
        for (i, a) in colours.iter().enumerate() {
            for b in &colours[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn family_slots_follow_the_code() {
        assert_eq!(family_color(2), Srgb::new(0xf5, 0xde, 0xb3));
        assert_eq!(family_color(9), Srgb::new(0x80, 0x00, 0x00));
        assert_eq!(family_color(0), family_color(2));
    }

    #[test]
    fn unknown_values_fall_back_to_gray() {
        let values: BTreeSet<MetadataValue> = ["NH", "SH"]
            .iter()
            .map(|s| MetadataValue::String((*s).into()))
            .collect();
        let map = ColorMap::new("hemisphere", &values);
        assert_eq!(map.legend_entries().len(), 2);
        assert_ne!(map.color_for(&MetadataValue::String("NH".into())), GRAY);
        assert_eq!(map.color_for(&MetadataValue::Null), GRAY);
    }
}
