use js_sys::{Float32Array, Object, Reflect, Uint32Array};
use serde_wasm_bindgen::to_value;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

// Logging macros, backed by console.rs
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => (crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => (crate::console::warn(&format!($($t)*)))
}

pub mod console;
pub mod error;
pub mod options;

// Geometry primitives and the OSM document model
pub mod document;
pub mod footprint;
pub mod polygon;
pub mod projection;

// Building resolution
pub mod attributes;
pub mod colors;
pub mod compound;
pub mod dedup;
pub mod ring_assembler;
pub mod traversal;

// Meshes
#[path = "../geometry_functions/extrude.rs"]
pub mod extrude;
pub mod mesh;
pub mod shape;

pub mod cache_keys;
pub mod cancellation;
pub mod models;
pub mod module_state;
pub mod provider;
#[cfg(not(target_arch = "wasm32"))]
pub mod worker;

use cache_keys::make_bounds_key;
use cancellation::{get_cancellation_token, CancellationToken};
use document::MapDocument;
use models::{BufferGeometry, LoadResponse, ProcessingResult};
use module_state::ModuleState;
use options::ProcessingOptions;
use provider::{MapProvider, OsmProvider};
use shape::Shape;

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

use std::sync::Once;
static INIT: Once = Once::new();

#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("WASM module initialized successfully");
    });
}

/// Parses `xml` and caches the document under its bounds key.
pub fn load_document_native(xml: &str) -> LoadResponse {
    let mut provider = OsmProvider::new();
    let outcome = provider.load_str(xml);
    let key = match provider.document() {
        Some(document) if outcome.success => make_bounds_key(&document.bounds()),
        _ => {
            return LoadResponse {
                success: false,
                message: outcome.message,
                key: None,
            }
        }
    };

    ModuleState::with_mut(|state| state.store_document(&key, Arc::new(provider)));
    LoadResponse {
        success: true,
        message: outcome.message,
        key: Some(key),
    }
}

/// Runs both traversals over a cached document. The produced shapes are
/// kept so their meshes can be fetched one by one afterwards.
pub fn process_cached_document(
    key: &str,
    options: &ProcessingOptions,
    token: Option<&CancellationToken>,
) -> Result<ProcessingResult, String> {
    let provider = ModuleState::with_mut(|state| state.get_document(key))
        .ok_or_else(|| format!("No document loaded for key {}", key))?;

    let (shapes, report) = provider.collect_shapes(options, token);
    let shapes: Vec<Arc<Shape>> = shapes.into_iter().map(Arc::new).collect();
    let outputs = shapes
        .iter()
        .map(|shape| shape.to_output(options.compute_meshes))
        .collect();

    ModuleState::with_mut(|state| state.store_shapes(key, shapes));
    Ok(ProcessingResult {
        shapes: outputs,
        report,
    })
}

/// Mesh of the shape at `index` in the last processing result for `key`.
/// `Ok(None)` means the shape exists but has no mesh.
pub fn shape_mesh_native(key: &str, index: usize) -> Result<Option<BufferGeometry>, String> {
    let shape = ModuleState::with(|state| state.get_shape(key, index))
        .ok_or_else(|| format!("No processed shape {} for key {}", index, key))?;
    Ok(shape.mesh().map(|mesh| mesh.to_buffer_geometry()))
}

/// Parses and processes a document in one go on a producer thread.
#[cfg(not(target_arch = "wasm32"))]
pub fn process_document(
    xml: &str,
    options: ProcessingOptions,
    token: CancellationToken,
) -> Result<ProcessingResult, error::DocumentError> {
    let provider = Arc::new(OsmProvider::from_document(document::OsmDocument::from_xml(xml)?));
    let with_mesh = options.compute_meshes;

    let producer = worker::spawn_producer(provider, options, token);
    let shapes = producer
        .shapes
        .iter()
        .map(|shape| shape.to_output(with_mesh))
        .collect();
    let report = producer.join();
    Ok(ProcessingResult { shapes, report })
}

#[wasm_bindgen]
pub fn load_osm_document(xml: &str) -> Result<JsValue, JsValue> {
    let response = load_document_native(xml);
    Ok(to_value(&response)?)
}

/// `options_json` may be empty. `token_id` names a token created with
/// `create_cancellation_token`.
#[wasm_bindgen]
pub fn process_osm_document(
    key: &str,
    options_json: &str,
    token_id: Option<String>,
) -> Result<JsValue, JsValue> {
    let options = ProcessingOptions::from_json(options_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid options JSON: {}", e)))?;
    let token = token_id.as_deref().and_then(get_cancellation_token);

    let result = process_cached_document(key, &options, token.as_ref())
        .map_err(|e| JsValue::from_str(&e))?;
    Ok(to_value(&result)?)
}

/// Returns `{ position, normal, color, index }` typed arrays, or null when
/// the shape has no mesh.
#[wasm_bindgen]
pub fn get_shape_mesh(key: &str, index: usize) -> Result<JsValue, JsValue> {
    let Some(geometry) = shape_mesh_native(key, index).map_err(|e| JsValue::from_str(&e))? else {
        return Ok(JsValue::NULL);
    };

    let result = Object::new();
    let position = Float32Array::from(geometry.vertices.as_slice());
    Reflect::set(&result, &JsValue::from_str("position"), &position)?;
    if let Some(normals) = geometry.normals {
        let normal = Float32Array::from(normals.as_slice());
        Reflect::set(&result, &JsValue::from_str("normal"), &normal)?;
    }
    if let Some(colors) = geometry.colors {
        let color = Float32Array::from(colors.as_slice());
        Reflect::set(&result, &JsValue::from_str("color"), &color)?;
    }
    if let Some(indices) = geometry.indices {
        let index = Uint32Array::from(indices.as_slice());
        Reflect::set(&result, &JsValue::from_str("index"), &index)?;
    }
    Ok(result.into())
}

#[wasm_bindgen]
pub fn get_cache_stats() -> Result<JsValue, JsValue> {
    let stats = ModuleState::with(|state| state.get_stats());
    Ok(to_value(&stats)?)
}

/// Drops one cached document and its processed shapes.
#[wasm_bindgen]
pub fn remove_document(key: &str) -> bool {
    ModuleState::with_mut(|state| state.remove_document(key))
}

#[wasm_bindgen]
pub fn clear_caches() -> bool {
    ModuleState::with_mut(|state| state.clear_all_caches());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own bounds so the shared module state never mixes
    // their documents.
    fn block(offset: f64) -> String {
        format!(
            r#"<osm>
              <bounds minlat="{o}" minlon="{o}" maxlat="{o1}" maxlon="{o1}"/>
              <node id="1" lat="{o}" lon="{o}"/>
              <node id="2" lat="{o}" lon="{o2}"/>
              <node id="3" lat="{o2}" lon="{o2}"/>
              <node id="4" lat="{o2}" lon="{o}"/>
              <node id="6" lat="{o4}" lon="{o4}"/>
              <node id="7" lat="{o4}" lon="{o6}"/>
              <node id="8" lat="{o6}" lon="{o6}"/>
              <node id="5" lat="{o8}" lon="{o8}"><tag k="natural" v="tree"/></node>
              <way id="10"><nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
                <tag k="building" v="yes"/><tag k="building:colour" v="red"/></way>
              <way id="11"><nd ref="6"/><nd ref="7"/><nd ref="8"/><nd ref="6"/>
                <tag k="building" v="shed"/></way>
            </osm>"#,
            o = offset,
            o1 = offset + 0.001,
            o2 = offset + 0.0002,
            o4 = offset + 0.0004,
            o6 = offset + 0.0006,
            o8 = offset + 0.0008,
        )
    }

    #[test]
    fn load_caches_document_under_bounds_key() {
        let response = load_document_native(&block(10.0));
        assert!(response.success, "{}", response.message);
        let far = 10.0 + 0.001;
        assert_eq!(response.key, Some(format!("10_10_{}_{}", far, far)));

        let failed = load_document_native("<osm><node");
        assert!(!failed.success);
        assert!(failed.key.is_none());
    }

    #[test]
    fn processed_shapes_expose_their_meshes() {
        let key = load_document_native(&block(20.0)).key.unwrap();
        let options = ProcessingOptions {
            compute_meshes: false,
            ..ProcessingOptions::default()
        };
        let result = process_cached_document(&key, &options, None).unwrap();

        let kinds: Vec<&str> = result.shapes.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["building", "building", "natural"]);
        assert!(result.shapes.iter().all(|s| s.geometry.is_none()));
        assert_eq!(result.report.buildings, 2);

        let mesh = shape_mesh_native(&key, 0).unwrap().unwrap();
        assert!(mesh.has_data);
        assert!(shape_mesh_native(&key, 3).is_err());
    }

    #[test]
    fn removed_document_is_no_longer_processable() {
        let key = load_document_native(&block(40.0)).key.unwrap();
        assert!(process_cached_document(&key, &ProcessingOptions::default(), None).is_ok());

        assert!(remove_document(&key));
        assert!(!remove_document(&key));
        assert!(process_cached_document(&key, &ProcessingOptions::default(), None).is_err());
        assert!(shape_mesh_native(&key, 0).is_err());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = process_cached_document("nope", &ProcessingOptions::default(), None).unwrap_err();
        assert!(err.contains("nope"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn process_document_runs_on_producer_thread() {
        let result = process_document(
            &block(30.0),
            ProcessingOptions::default(),
            CancellationToken::new("lib-test"),
        )
        .unwrap();
        assert_eq!(result.shapes.len(), 3);
        assert_eq!(result.report.meshes_built, 3);
        assert!(result.shapes.iter().all(|s| s.geometry.is_some()));

        let broken = process_document(
            "<osm><way",
            ProcessingOptions::default(),
            CancellationToken::new("lib-test-broken"),
        );
        assert!(broken.is_err());
    }
}
