//! Declarative display metadata for telemetry fields.
//!
//! One static table maps snapshot field names to their presentation rules:
//! printf-style numeric format, column width, padding, and the glyph pair
//! used for boolean fields. Display layers look entries up by field name
//! instead of hard-coding per-field formatting.
//!
//! Fields with no sensible scalar rendering (the traffic table, the poll
//! timestamp) and the unused NAV2 radio are deliberately absent; `lookup`
//! returning `None` for them is the expected answer, not an error.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Which side of the column the value hugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadAlign {
    Left,
    Right,
}

/// Presentation rules for one telemetry field.
#[derive(Debug, Clone)]
pub struct FieldMetadata {
    /// Snapshot field name, the lookup key.
    pub field: &'static str,

    /// Human-readable label.
    pub display_name: &'static str,

    /// printf-style format for numeric fields, `None` for booleans and
    /// free-form strings.
    pub format: Option<&'static str>,

    /// Rendered column width in characters.
    pub width: usize,

    pub align: PadAlign,
    pub pad_char: char,

    /// Glyphs for boolean fields.
    pub true_glyph: char,
    pub false_glyph: char,

    /// Swap the glyph pair, for fields where `false` is the notable state
    /// (e.g. gear up).
    pub inverted: bool,
}

impl FieldMetadata {
    /// Pad or truncate an already-formatted value to this field's width.
    pub fn pad(&self, value: &str) -> String {
        let count = value.chars().count();
        if count >= self.width {
            return value.chars().take(self.width).collect();
        }
        let fill: String = std::iter::repeat(self.pad_char)
            .take(self.width - count)
            .collect();
        match self.align {
            PadAlign::Left => format!("{value}{fill}"),
            PadAlign::Right => format!("{fill}{value}"),
        }
    }

    /// Glyph for a boolean value, honoring the inversion flag.
    pub fn render_bool(&self, value: bool) -> char {
        if value != self.inverted {
            self.true_glyph
        } else {
            self.false_glyph
        }
    }
}

const fn numeric(
    field: &'static str,
    display_name: &'static str,
    format: &'static str,
    width: usize,
) -> FieldMetadata {
    FieldMetadata {
        field,
        display_name,
        format: Some(format),
        width,
        align: PadAlign::Right,
        pad_char: ' ',
        true_glyph: '*',
        false_glyph: ' ',
        inverted: false,
    }
}

const fn boolean(field: &'static str, display_name: &'static str) -> FieldMetadata {
    FieldMetadata {
        field,
        display_name,
        format: None,
        width: 1,
        align: PadAlign::Left,
        pad_char: ' ',
        true_glyph: '*',
        false_glyph: ' ',
        inverted: false,
    }
}

const fn text(field: &'static str, display_name: &'static str, width: usize) -> FieldMetadata {
    FieldMetadata {
        field,
        display_name,
        format: None,
        width,
        align: PadAlign::Left,
        pad_char: ' ',
        true_glyph: '*',
        false_glyph: ' ',
        inverted: false,
    }
}

static FIELDS: &[FieldMetadata] = &[
    numeric("latitude", "Latitude", "%9.4f", 9),
    numeric("longitude", "Longitude", "%10.4f", 10),
    numeric("altitude_ft", "Altitude", "%6.0f", 6),
    boolean("on_ground", "On Ground"),
    numeric("pitch_deg", "Pitch", "%5.1f", 5),
    numeric("bank_deg", "Bank", "%5.1f", 5),
    numeric("heading_deg", "Heading", "%3.0f", 3),
    numeric("indicated_airspeed_kt", "IAS", "%3.0f", 3),
    numeric("true_airspeed_kt", "TAS", "%3.0f", 3),
    numeric("ground_speed_kt", "Ground Speed", "%3.0f", 3),
    numeric("vertical_speed_fpm", "Vertical Speed", "%5.0f", 5),
    boolean("ap_master", "AP Master"),
    numeric("ap_heading_deg", "AP Heading", "%3.0f", 3),
    numeric("ap_altitude_ft", "AP Altitude", "%5.0f", 5),
    numeric("ap_speed_kt", "AP Speed", "%3.0f", 3),
    numeric("ap_vertical_speed_fpm", "AP Vertical Speed", "%5.0f", 5),
    boolean("ap_nav_hold", "AP Nav Hold"),
    numeric("throttle_ratio", "Throttle", "%4.2f", 4),
    numeric("engine_rpm", "Engine RPM", "%5.0f", 5),
    numeric("fuel_total_gal", "Fuel Total", "%6.1f", 6),
    numeric("fuel_flow_gph", "Fuel Flow", "%5.1f", 5),
    FieldMetadata {
        field: "gear_down",
        display_name: "Gear",
        format: None,
        width: 1,
        align: PadAlign::Left,
        pad_char: ' ',
        true_glyph: '*',
        false_glyph: ' ',
        inverted: true,
    },
    numeric("flaps_ratio", "Flaps", "%4.2f", 4),
    boolean("parking_brake", "Parking Brake"),
    numeric("com1_active", "COM1 Active", "%7.3f", 7),
    numeric("com1_standby", "COM1 Standby", "%7.3f", 7),
    numeric("com2_active", "COM2 Active", "%7.3f", 7),
    numeric("com2_standby", "COM2 Standby", "%7.3f", 7),
    numeric("nav1_active", "NAV1 Active", "%6.2f", 6),
    numeric("nav1_standby", "NAV1 Standby", "%6.2f", 6),
    numeric("transponder_code", "Transponder", "%04o", 4),
    text("next_waypoint_id", "Next Waypoint", 8),
    numeric("waypoint_distance_nm", "Waypoint Distance", "%6.1f", 6),
    numeric("waypoint_bearing_deg", "Waypoint Bearing", "%3.0f", 3),
    numeric("waypoint_ete_sec", "Waypoint ETE", "%6.0f", 6),
    text("aircraft_title", "Aircraft", 32),
];

struct Catalog {
    by_field: HashMap<&'static str, &'static FieldMetadata>,
    ordered: Vec<&'static FieldMetadata>,
}

fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let by_field = FIELDS.iter().map(|meta| (meta.field, meta)).collect();
        let mut ordered: Vec<&'static FieldMetadata> = FIELDS.iter().collect();
        ordered.sort_by_key(|meta| meta.display_name);
        Catalog { by_field, ordered }
    })
}

/// Metadata for a snapshot field, or `None` for fields that have no
/// display entry.
pub fn lookup(field: &str) -> Option<&'static FieldMetadata> {
    catalog().by_field.get(field).copied()
}

/// All field entries, ordered by display name.
pub fn fields() -> impl Iterator<Item = &'static FieldMetadata> {
    catalog().ordered.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_field() {
        let meta = lookup("heading_deg").expect("heading is cataloged");
        assert_eq!(meta.display_name, "Heading");
        assert_eq!(meta.format, Some("%3.0f"));
        assert_eq!(meta.width, 3);
    }

    #[test]
    fn test_absent_fields_are_none() {
        assert!(lookup("traffic").is_none());
        assert!(lookup("polled_at").is_none());
        assert!(lookup("nav2_active").is_none());
        assert!(lookup("nav2_standby").is_none());
        assert!(lookup("no_such_field").is_none());
    }

    #[test]
    fn test_fields_ordered_by_display_name() {
        let names: Vec<&str> = fields().map(|meta| meta.display_name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), FIELDS.len());
    }

    #[test]
    fn test_field_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for meta in FIELDS {
            assert!(seen.insert(meta.field), "duplicate field {}", meta.field);
        }
    }

    #[test]
    fn test_pad_right_aligned() {
        let meta = lookup("altitude_ft").expect("cataloged");
        assert_eq!(meta.pad("4500"), "  4500");
    }

    #[test]
    fn test_pad_left_aligned_and_truncating() {
        let meta = lookup("next_waypoint_id").expect("cataloged");
        assert_eq!(meta.pad("KOKC"), "KOKC    ");
        assert_eq!(meta.pad("TOOLONGIDENT"), "TOOLONGI");
    }

    #[test]
    fn test_render_bool_glyphs() {
        let ap = lookup("ap_master").expect("cataloged");
        assert_eq!(ap.render_bool(true), '*');
        assert_eq!(ap.render_bool(false), ' ');
    }

    #[test]
    fn test_inverted_bool_swaps_glyphs() {
        let gear = lookup("gear_down").expect("cataloged");
        assert!(gear.inverted);
        // Gear down is the quiet state; gear up gets the marker glyph.
        assert_eq!(gear.render_bool(true), ' ');
        assert_eq!(gear.render_bool(false), '*');
    }
}
