//! Native-only background production. A producer thread resolves entities
//! and builds their meshes while the consumer drains a bounded channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::console_log;
use crate::models::ProcessingReport;
use crate::options::ProcessingOptions;
use crate::provider::{MapProvider, OsmProvider};
use crate::shape::Shape;

pub struct Producer {
    pub shapes: Receiver<Arc<Shape>>,
    handle: JoinHandle<ProcessingReport>,
}

impl Producer {
    /// Waits for the producer thread. A panicked producer reports as
    /// cancelled.
    pub fn join(self) -> ProcessingReport {
        self.handle.join().unwrap_or_else(|_| ProcessingReport {
            cancelled: true,
            ..ProcessingReport::default()
        })
    }
}

/// Starts producing shapes on a new thread. The token is checked between
/// entities; the producer also stops once the receiver is dropped.
pub fn spawn_producer(
    provider: Arc<OsmProvider>,
    options: ProcessingOptions,
    token: CancellationToken,
) -> Producer {
    let (sender, shapes) = bounded(options.queue_capacity.max(1));

    let handle = thread::spawn(move || {
        let mut report = ProcessingReport::default();
        if !provider.is_loaded() {
            return report;
        }
        let limit = options.max_entities.unwrap_or(usize::MAX);
        let mut sent = 0usize;

        let send = |shape: Shape, report: &mut ProcessingReport| -> bool {
            if options.compute_meshes && shape.mesh().is_some() {
                report.meshes_built += 1;
            }
            sender.send(Arc::new(shape)).is_ok()
        };

        let mut open = true;
        if options.include_buildings {
            if let Some(mut parts) = provider.building_parts() {
                while open && sent < limit {
                    if token.is_cancelled() {
                        report.cancelled = true;
                        break;
                    }
                    let Some(part) = parts.next() else {
                        break;
                    };
                    report.buildings += 1;
                    sent += 1;
                    open = send(Shape::Building(part), &mut report);
                }
                if parts.is_finished() {
                    report.unconsumed_buildings = parts.unconsumed_buildings();
                }
            }
        }

        if options.include_naturals && open && !report.cancelled {
            for natural in provider.naturals() {
                if !open || sent >= limit {
                    break;
                }
                if token.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                report.naturals += 1;
                sent += 1;
                open = send(Shape::Natural(natural), &mut report);
            }
        }

        if report.cancelled {
            console_log!("Producer {} cancelled after {} shapes", token.id, sent);
        }
        report
    });

    Producer { shapes, handle }
}

/// Builds every mesh in parallel. Already-built meshes are reused.
pub fn prewarm_meshes(shapes: &[Arc<Shape>]) -> usize {
    shapes
        .par_iter()
        .filter(|shape| shape.mesh().is_some())
        .count()
}
