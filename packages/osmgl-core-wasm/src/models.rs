use serde::{Deserialize, Serialize};

/// Flattened mesh: xyz positions and normals, rgb colours, u32 indices.
#[derive(Serialize, Debug, Clone)]
pub struct BufferGeometry {
    pub vertices: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub colors: Option<Vec<f32>>,
    pub indices: Option<Vec<u32>>,
    #[serde(rename = "hasData")]
    pub has_data: bool,
}

/// One produced entity as seen from JavaScript.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShapeOutput {
    pub id: String,
    pub kind: String,
    pub color: [f32; 3],
    pub name: Option<String>,
    pub height: f64,
    pub min_height: f64,
    pub geometry: Option<BufferGeometry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    pub buildings: usize,
    pub naturals: usize,
    pub meshes_built: usize,
    pub unconsumed_buildings: usize,
    pub cancelled: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProcessingResult {
    pub shapes: Vec<ShapeOutput>,
    pub report: ProcessingReport,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoadResponse {
    pub success: bool,
    pub message: String,
    pub key: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CacheStats {
    pub documents_count: usize,
    pub max_documents: usize,
    pub total_requests: usize,
    pub hit_rate: f64,
}
