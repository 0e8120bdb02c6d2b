use serde::Deserialize;

/// Knobs accepted by `process_osm_document`. Every field has a default so an
/// empty JSON object (or no options at all) is valid input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    pub include_buildings: bool,
    pub include_naturals: bool,
    pub compute_meshes: bool,
    pub max_entities: Option<usize>,
    pub queue_capacity: usize,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            include_buildings: true,
            include_naturals: true,
            compute_meshes: true,
            max_entities: None,
            queue_capacity: 64,
        }
    }
}

impl ProcessingOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }
}
