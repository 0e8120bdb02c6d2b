use std::path::Path;

use crate::cancellation::CancellationToken;
use crate::console_log;
use crate::document::{MapDocument, OsmDocument};
use crate::error::{DocumentError, LoadOutcome};
use crate::models::ProcessingReport;
use crate::options::ProcessingOptions;
use crate::projection::{PlanarFrame, TileBound};
use crate::shape::{BuildingPart, Natural, Shape};
use crate::traversal::{naturals, BuildingParts};

/// Source of renderable map entities.
pub trait MapProvider {
    fn load_str(&mut self, xml: &str) -> LoadOutcome;
    fn load_file(&mut self, path: &Path) -> LoadOutcome;
    fn buildings(&self) -> Box<dyn Iterator<Item = BuildingPart> + '_>;
    fn naturals(&self) -> Box<dyn Iterator<Item = Natural> + '_>;
}

struct Loaded {
    document: OsmDocument,
    frame: PlanarFrame,
}

/// Provider over an OSM XML snapshot projected with Web Mercator.
#[derive(Default)]
pub struct OsmProvider {
    loaded: Option<Loaded>,
}

impl OsmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: OsmDocument) -> Self {
        let frame = PlanarFrame::web_mercator(&document.bounds());
        Self {
            loaded: Some(Loaded { document, frame }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn document(&self) -> Option<&OsmDocument> {
        self.loaded.as_ref().map(|l| &l.document)
    }

    pub fn tile(&self) -> Option<&TileBound> {
        self.loaded.as_ref().map(|l| l.frame.tile())
    }

    /// Building traversal with access to its diagnostics.
    pub fn building_parts(&self) -> Option<BuildingParts<'_>> {
        self.loaded
            .as_ref()
            .map(|l| BuildingParts::new(&l.document, &l.frame))
    }

    fn install(&mut self, result: Result<OsmDocument, DocumentError>) -> LoadOutcome {
        match result {
            Ok(document) => {
                let message = format!(
                    "Loaded {} nodes, {} ways, {} relations",
                    document.node_count(),
                    document.way_count(),
                    document.relation_count()
                );
                console_log!("{}", message);
                *self = Self::from_document(document);
                LoadOutcome::ok(message)
            }
            Err(e) => {
                self.loaded = None;
                LoadOutcome::failed(e.to_string())
            }
        }
    }

    /// Runs both traversals to completion (or to `max_entities`), checking
    /// `token` between entities.
    pub fn collect_shapes(
        &self,
        options: &ProcessingOptions,
        token: Option<&CancellationToken>,
    ) -> (Vec<Shape>, ProcessingReport) {
        let mut shapes = Vec::new();
        let mut report = ProcessingReport::default();
        let Some(loaded) = self.loaded.as_ref() else {
            return (shapes, report);
        };
        let limit = options.max_entities.unwrap_or(usize::MAX);
        let cancelled = || token.is_some_and(CancellationToken::is_cancelled);

        if options.include_buildings {
            let mut parts = BuildingParts::new(&loaded.document, &loaded.frame);
            while shapes.len() < limit {
                if cancelled() {
                    report.cancelled = true;
                    break;
                }
                let Some(part) = parts.next() else {
                    break;
                };
                report.buildings += 1;
                shapes.push(Shape::Building(part));
            }
            if parts.is_finished() {
                report.unconsumed_buildings = parts.unconsumed_buildings();
            }
        }

        if options.include_naturals && !report.cancelled {
            for natural in naturals(&loaded.document, &loaded.frame) {
                if shapes.len() >= limit {
                    break;
                }
                if cancelled() {
                    report.cancelled = true;
                    break;
                }
                report.naturals += 1;
                shapes.push(Shape::Natural(natural));
            }
        }

        if options.compute_meshes {
            report.meshes_built = shapes.iter().filter(|s| s.mesh().is_some()).count();
        }
        (shapes, report)
    }
}

impl MapProvider for OsmProvider {
    fn load_str(&mut self, xml: &str) -> LoadOutcome {
        let result = OsmDocument::from_xml(xml);
        self.install(result)
    }

    fn load_file(&mut self, path: &Path) -> LoadOutcome {
        let result = OsmDocument::from_file(path);
        self.install(result)
    }

    fn buildings(&self) -> Box<dyn Iterator<Item = BuildingPart> + '_> {
        match self.building_parts() {
            Some(parts) => Box::new(parts),
            None => Box::new(std::iter::empty()),
        }
    }

    fn naturals(&self) -> Box<dyn Iterator<Item = Natural> + '_> {
        match self.loaded.as_ref() {
            Some(l) => Box::new(naturals(&l.document, &l.frame)),
            None => Box::new(std::iter::empty()),
        }
    }
}
