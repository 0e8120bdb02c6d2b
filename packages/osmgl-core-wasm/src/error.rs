use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// Failures while reading an OSM document into memory.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XML syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("document has no <bounds> element and no nodes to derive them from")]
    MissingBounds,

    #[error("invalid value {value:?} for attribute '{attribute}' on <{element}>")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while turning a footprint into a mesh. These never abort the
/// pipeline: the entity is simply left without a mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("footprint has {0} distinct points, need at least 3")]
    DegenerateFootprint(usize),
}

/// Result of handing a document to a provider. Loading problems are reported
/// here as a flag plus message rather than as an error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub success: bool,
    pub message: String,
}

impl LoadOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
