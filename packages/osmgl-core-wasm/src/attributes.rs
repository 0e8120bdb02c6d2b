//! Tag interpretation for buildings, roofs and trees.
//!
//! Keys are matched case-insensitively through a fixed alias table. Numeric
//! values go through [`parse_float`] / [`parse_short`]; a value that does not
//! parse leaves the field untouched.

use rand::Rng;

use crate::colors::{parse_color, Color};
use crate::document::Tags;

pub const FLOOR_HEIGHT: f64 = 3.5;
pub const DEFAULT_BUILDING_HEIGHT: f64 = 15.0;
pub const DEFAULT_TREE_CIRCUMFERENCE: f64 = 6.0;
pub const DEFAULT_TREE_HEIGHT: f64 = 10.0;
pub const DEFAULT_BUILDING_COLOR: Color = Color::LIGHT_SLATE_GRAY;
pub const DEFAULT_ROOF_COLOR: Color = Color::LIGHT_GRAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildingShape {
    #[default]
    None,
    Cylinder,
    Pyramidal,
}

impl BuildingShape {
    pub fn from_tag(value: &str) -> Option<Self> {
        match normalize_keyword(value).as_str() {
            "none" => Some(BuildingShape::None),
            "cylinder" => Some(BuildingShape::Cylinder),
            "pyramidal" => Some(BuildingShape::Pyramidal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoofShape {
    #[default]
    None,
    Flat,
    Skillion,
    Gabled,
    HalfHipped,
    Hipped,
    Pyramidal,
    Gambrel,
    Mansard,
    Dome,
    Onion,
    Round,
    Saltbox,
}

impl RoofShape {
    pub fn from_tag(value: &str) -> Option<Self> {
        let shape = match normalize_keyword(value).as_str() {
            "none" => RoofShape::None,
            "flat" => RoofShape::Flat,
            "skillion" => RoofShape::Skillion,
            "gabled" => RoofShape::Gabled,
            "halfhipped" => RoofShape::HalfHipped,
            "hipped" => RoofShape::Hipped,
            "pyramidal" => RoofShape::Pyramidal,
            "gambrel" => RoofShape::Gambrel,
            "mansard" => RoofShape::Mansard,
            "dome" => RoofShape::Dome,
            "onion" => RoofShape::Onion,
            "round" => RoofShape::Round,
            "saltbox" => RoofShape::Saltbox,
            _ => return None,
        };
        Some(shape)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoofOrientation {
    #[default]
    None,
    Along,
    Across,
}

impl RoofOrientation {
    pub fn from_tag(value: &str) -> Option<Self> {
        match normalize_keyword(value).as_str() {
            "along" => Some(RoofOrientation::Along),
            "across" => Some(RoofOrientation::Across),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub color: Color,
    pub material: Option<String>,
}

impl Surface {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            material: None,
        }
    }
}

/// Body of a building or building part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartData {
    pub shape: BuildingShape,
    pub name: Option<String>,
    /// Extruded (true) or drawn flat.
    pub volume: bool,
    pub height: f64,
    pub min_height: f64,
    pub levels: i16,
    pub min_level: i16,
    pub surface: Surface,
    /// Set when `height` came from the estimation heuristic rather than a tag.
    pub height_estimated: bool,
}

impl Default for PartData {
    fn default() -> Self {
        Self {
            shape: BuildingShape::None,
            name: None,
            volume: true,
            height: 0.0,
            min_height: 0.0,
            levels: 0,
            min_level: 0,
            surface: Surface::new(DEFAULT_BUILDING_COLOR),
            height_estimated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoofData {
    pub shape: RoofShape,
    pub orientation: RoofOrientation,
    pub height: f64,
    pub angle: f64,
    pub levels: i16,
    /// Degrees clockwise from north.
    pub direction: f64,
    pub surface: Surface,
}

impl Default for RoofData {
    fn default() -> Self {
        Self {
            shape: RoofShape::None,
            orientation: RoofOrientation::None,
            height: 0.0,
            angle: 0.0,
            levels: 0,
            direction: 0.0,
            surface: Surface::new(DEFAULT_ROOF_COLOR),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NaturalData {
    pub genus: Option<String>,
    pub species: Option<String>,
    pub leaf_type: Option<String>,
    pub circumference: f64,
    pub height: f64,
}

impl Default for NaturalData {
    fn default() -> Self {
        Self {
            genus: None,
            species: None,
            leaf_type: None,
            circumference: DEFAULT_TREE_CIRCUMFERENCE,
            height: DEFAULT_TREE_HEIGHT,
        }
    }
}

/// Parses a loosely formatted number such as `"12 m"`, `"0,5"` or `"1,200.5"`.
///
/// Everything except digits, `-`, `,` and `.` is dropped. A comma is first
/// tried as the decimal separator, then as a thousands separator.
pub fn parse_float(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | ',' | '.'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if !cleaned.contains('.') && cleaned.matches(',').count() <= 1 {
        if let Ok(v) = cleaned.replace(',', ".").parse::<f64>() {
            return Some(v);
        }
    }
    cleaned.replace(',', "").parse::<f64>().ok()
}

/// Keeps digits and `-`, then parses a 16-bit integer.
pub fn parse_short(value: &str) -> Option<i16> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    cleaned.parse::<i16>().ok()
}

/// Writes the parsed value into `target`, leaving it as-is on failure.
pub fn update_float(target: &mut f64, value: &str) -> bool {
    match parse_float(value) {
        Some(v) => {
            *target = v;
            true
        }
        None => false,
    }
}

pub fn update_short(target: &mut i16, value: &str) -> bool {
    match parse_short(value) {
        Some(v) => {
            *target = v;
            true
        }
        None => false,
    }
}

/// Roof direction as degrees or one of the 16 compass points.
pub fn parse_direction(value: &str) -> Option<f64> {
    const COMPASS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let upper = value.trim().to_ascii_uppercase();
    if let Some(i) = COMPASS.iter().position(|c| *c == upper) {
        return Some(i as f64 * 22.5);
    }
    parse_float(value)
}

pub fn resolve_part(tags: &Tags) -> PartData {
    merge_part(&PartData::default(), tags)
}

/// Child attributes: start from the parent's record and apply the child's
/// tags on top. An estimated parent height is not inherited.
pub fn merge_part(parent: &PartData, tags: &Tags) -> PartData {
    merge_part_with(parent, tags, &mut rand::thread_rng())
}

pub fn merge_part_with<R: Rng + ?Sized>(parent: &PartData, tags: &Tags, rng: &mut R) -> PartData {
    let mut part = parent.clone();
    if part.height_estimated {
        part.height = 0.0;
        part.height_estimated = false;
    }

    for (key, value) in tags.iter() {
        match key.to_ascii_lowercase().as_str() {
            "name" => part.name = Some(value.to_string()),
            "height" | "building:height" => {
                update_float(&mut part.height, value);
            }
            "min_height" | "building:min_height" => {
                update_float(&mut part.min_height, value);
            }
            "levels" | "building:levels" | "building:levels:aboveground" => {
                update_short(&mut part.levels, value);
            }
            "min_level" | "min_levels" | "building:min_level" | "building:min_levels" => {
                update_short(&mut part.min_level, value);
            }
            "building:colour" | "building:facade:colour" => {
                part.surface.color = parse_color(value, DEFAULT_BUILDING_COLOR);
            }
            "building:material" | "building:facade:material" => {
                part.surface.material = Some(value.to_string());
            }
            "building:shape" => {
                if let Some(shape) = BuildingShape::from_tag(value) {
                    part.shape = shape;
                }
            }
            _ => {}
        }
    }

    estimate_height(&mut part, rng);
    part
}

// Height is left at zero only for flat parts. Otherwise it comes from the
// level count, or a random draw within one floor of the default height.
fn estimate_height<R: Rng + ?Sized>(part: &mut PartData, rng: &mut R) {
    if !part.volume || part.height != 0.0 {
        return;
    }
    let levels = i32::from(part.min_level) + i32::from(part.levels);
    part.height = if levels > 0 {
        f64::from(levels) * FLOOR_HEIGHT
    } else {
        rng.gen_range(
            DEFAULT_BUILDING_HEIGHT - FLOOR_HEIGHT..DEFAULT_BUILDING_HEIGHT + FLOOR_HEIGHT,
        )
    };
    part.height_estimated = true;
}

pub fn resolve_roof(tags: &Tags) -> RoofData {
    merge_roof(&RoofData::default(), tags)
}

pub fn merge_roof(parent: &RoofData, tags: &Tags) -> RoofData {
    let mut roof = parent.clone();
    for (key, value) in tags.iter() {
        match key.to_ascii_lowercase().as_str() {
            "roof:shape" => {
                if let Some(shape) = RoofShape::from_tag(value) {
                    roof.shape = shape;
                }
            }
            "roof:orientation" => {
                if let Some(orientation) = RoofOrientation::from_tag(value) {
                    roof.orientation = orientation;
                }
            }
            "roof:height" => {
                update_float(&mut roof.height, value);
            }
            "roof:angle" => {
                update_float(&mut roof.angle, value);
            }
            "roof:levels" => {
                update_short(&mut roof.levels, value);
            }
            "roof:direction" => {
                if let Some(direction) = parse_direction(value) {
                    roof.direction = direction;
                }
            }
            "roof:colour" => roof.surface.color = parse_color(value, DEFAULT_BUILDING_COLOR),
            "roof:material" => roof.surface.material = Some(value.to_string()),
            _ => {}
        }
    }
    roof
}

pub fn resolve_natural(tags: &Tags) -> NaturalData {
    let mut data = NaturalData::default();
    for (key, value) in tags.iter() {
        match key.to_ascii_lowercase().as_str() {
            "genus" => data.genus = Some(value.to_string()),
            "species" => data.species = Some(value.to_string()),
            "leaf_type" => data.leaf_type = Some(value.to_string()),
            "circumference" => {
                update_float(&mut data.circumference, value);
            }
            "height" => {
                update_float(&mut data.height, value);
            }
            _ => {}
        }
    }
    data
}

fn normalize_keyword(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().copied().collect()
    }

    #[test]
    fn float_parsing_handles_units_and_separators() {
        let cases = [("0.1", 0.1), ("-1.0", -1.0), ("1 m", 1.0), ("0,1", 0.1)];
        for (input, expected) in cases {
            let parsed = parse_float(input).unwrap();
            assert!((parsed - expected).abs() < 1e-6, "{input} -> {parsed}");
        }
        assert!((parse_float("1,200.5").unwrap() - 1200.5).abs() < 1e-9);
        assert!((parse_float("12.5 ft").unwrap() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn garbage_keeps_previous_value() {
        let mut value = 7.5;
        assert!(!update_float(&mut value, "tall"));
        assert_eq!(value, 7.5);
        assert!(!update_float(&mut value, "--"));
        assert_eq!(value, 7.5);

        let mut levels = 3;
        assert!(!update_short(&mut levels, "many"));
        assert_eq!(levels, 3);
        assert!(!update_short(&mut levels, "99999"));
        assert_eq!(levels, 3);
    }

    #[test]
    fn short_parsing_drops_non_digits() {
        assert_eq!(parse_short("4 floors"), Some(4));
        assert_eq!(parse_short("-1"), Some(-1));
        assert_eq!(parse_short("2.5"), Some(25));
        assert_eq!(parse_short(""), None);
    }

    #[test]
    fn aliases_fill_part_fields() {
        let part = resolve_part(&tags(&[
            ("Name", "Town hall"),
            ("building:height", "21 m"),
            ("building:min_height", "3"),
            ("building:levels:aboveground", "6"),
            ("building:min_level", "1"),
            ("building:facade:colour", "#ff0000"),
            ("building:material", "brick"),
            ("building:shape", "Cylinder"),
        ]));
        assert_eq!(part.name.as_deref(), Some("Town hall"));
        assert!((part.height - 21.0).abs() < 1e-9);
        assert!((part.min_height - 3.0).abs() < 1e-9);
        assert_eq!(part.levels, 6);
        assert_eq!(part.min_level, 1);
        assert_eq!(part.surface.color, Color::from_rgb8(255, 0, 0));
        assert_eq!(part.surface.material.as_deref(), Some("brick"));
        assert_eq!(part.shape, BuildingShape::Cylinder);
        assert!(!part.height_estimated);
    }

    #[test]
    fn height_from_levels() {
        let part = resolve_part(&tags(&[("building:levels", "4"), ("min_level", "1")]));
        assert!((part.height - 5.0 * FLOOR_HEIGHT).abs() < 1e-9);
        assert!(part.height_estimated);
    }

    #[test]
    fn height_fallback_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let part = merge_part_with(&PartData::default(), &Tags::new(), &mut rng);
            assert!(part.height >= DEFAULT_BUILDING_HEIGHT - FLOOR_HEIGHT);
            assert!(part.height < DEFAULT_BUILDING_HEIGHT + FLOOR_HEIGHT);
        }
    }

    #[test]
    fn resolving_twice_is_identical_when_height_is_known() {
        let t = tags(&[
            ("height", "12"),
            ("roof:shape", "gabled"),
            ("roof:colour", "red"),
            ("roof:direction", "NE"),
        ]);
        assert_eq!(resolve_part(&t), resolve_part(&t));
        assert_eq!(resolve_roof(&t), resolve_roof(&t));

        let levels_only = tags(&[("building:levels", "3")]);
        assert_eq!(resolve_part(&levels_only), resolve_part(&levels_only));
    }

    #[test]
    fn resolving_twice_differs_at_most_in_estimated_height() {
        let t = tags(&[("building", "yes"), ("building:colour", "white")]);
        let mut a = resolve_part(&t);
        let mut b = resolve_part(&t);
        assert!(a.height_estimated && b.height_estimated);
        a.height = 0.0;
        b.height = 0.0;
        assert_eq!(a, b);
    }

    #[test]
    fn child_overrides_parent_but_reestimates_height() {
        let parent = resolve_part(&tags(&[("building:colour", "green")]));
        assert!(parent.height_estimated);

        let child = merge_part(&parent, &tags(&[("building:levels", "2")]));
        assert_eq!(child.surface.color, parent.surface.color);
        assert!((child.height - 2.0 * FLOOR_HEIGHT).abs() < 1e-9);

        let tall = resolve_part(&tags(&[("height", "30")]));
        let inherited = merge_part(&tall, &Tags::new());
        assert!((inherited.height - 30.0).abs() < 1e-9);
        assert!(!inherited.height_estimated);
    }

    #[test]
    fn roof_tags() {
        let roof = resolve_roof(&tags(&[
            ("roof:shape", "half-hipped"),
            ("roof:orientation", "across"),
            ("roof:height", "2,5"),
            ("roof:angle", "30"),
            ("roof:levels", "1"),
            ("roof:direction", "SSW"),
            ("roof:material", "tiles"),
        ]));
        assert_eq!(roof.shape, RoofShape::HalfHipped);
        assert_eq!(roof.orientation, RoofOrientation::Across);
        assert!((roof.height - 2.5).abs() < 1e-9);
        assert!((roof.angle - 30.0).abs() < 1e-9);
        assert_eq!(roof.levels, 1);
        assert!((roof.direction - 202.5).abs() < 1e-9);
        assert_eq!(roof.surface.color, DEFAULT_ROOF_COLOR);
        assert_eq!(roof.surface.material.as_deref(), Some("tiles"));
    }

    #[test]
    fn unknown_roof_colour_uses_building_default() {
        let roof = resolve_roof(&tags(&[("roof:colour", "sparkly")]));
        assert_eq!(roof.surface.color, DEFAULT_BUILDING_COLOR);
    }

    #[test]
    fn tree_defaults_and_overrides() {
        let plain = resolve_natural(&Tags::new());
        assert_eq!(plain, NaturalData::default());

        let oak = resolve_natural(&tags(&[
            ("genus", "Quercus"),
            ("species", "Quercus robur"),
            ("leaf_type", "broadleaved"),
            ("circumference", "2.4 m"),
            ("height", "huge"),
        ]));
        assert_eq!(oak.genus.as_deref(), Some("Quercus"));
        assert_eq!(oak.species.as_deref(), Some("Quercus robur"));
        assert!((oak.circumference - 2.4).abs() < 1e-9);
        assert!((oak.height - DEFAULT_TREE_HEIGHT).abs() < 1e-9);
    }
}
