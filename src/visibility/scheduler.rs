//! Visibility-driven lazy loading
//!
//! Containers are registered in watch sets. `observe` is fed the current
//! viewport; each record triggers at most once, on its first overlap with
//! the viewport grown by the set's margin, and is not observed afterwards.

use std::collections::BTreeMap;

use crate::host::{ContainerId, ContainerRegistry};
use crate::math::Rect;
use crate::preview::classify::FileKind;
use crate::preview::request::PreviewRequest;
use crate::render::RendererPool;
use crate::visibility::record::{ContainerObservationRecord, ObservedSubject, ScheduledLoad, WatchOptions};

/// Handle of one watch registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

#[derive(Debug)]
struct WatchSet {
    options: WatchOptions,
    records: Vec<ContainerObservationRecord>,
}

#[derive(Debug, Default)]
pub struct VisibilityScheduler {
    next_id: u64,
    watches: BTreeMap<WatchId, WatchSet>,
}

impl VisibilityScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set of containers
    pub fn watch(
        &mut self,
        records: impl IntoIterator<Item = ContainerObservationRecord>,
        options: WatchOptions,
    ) -> WatchId {
        self.next_id += 1;
        let id = WatchId(self.next_id);
        let records: Vec<_> = records.into_iter().collect();
        log::debug!("Watching {} containers ({:?}, margin {})", records.len(), options.size_class, options.margin);
        self.watches.insert(id, WatchSet { options, records });
        id
    }

    /// Trigger loads for records that just became visible.
    ///
    /// Containers missing from `containers` are not visible.
    pub fn observe(&mut self, viewport: Rect, containers: &ContainerRegistry) -> Vec<ScheduledLoad> {
        let mut loads = Vec::new();
        for set in self.watches.values_mut() {
            let area = viewport.expanded(set.options.margin);
            for record in set.records.iter_mut().filter(|r| !r.loaded) {
                let Some(container) = containers.get(record.container) else {
                    continue;
                };
                if !container.bounds.intersects(&area) {
                    continue;
                }
                record.loaded = true;
                match decide(record, &set.options) {
                    Some(load) => {
                        log::debug!("Container {} visible: {:?}", record.container, load);
                        loads.push(load);
                    }
                    None => log::debug!("Container {} visible, nothing to preview", record.container),
                }
            }
        }
        loads
    }

    /// Drop a watch set and stop the sessions of its containers.
    ///
    /// Loads still in flight for those containers are cancelled and never
    /// start a session.
    pub fn unwatch(&mut self, id: WatchId, pool: &mut RendererPool, containers: &mut ContainerRegistry) -> usize {
        let Some(set) = self.watches.remove(&id) else {
            return 0;
        };
        set.records
            .iter()
            .filter(|r| {
                containers.cancel_load(r.container);
                pool.release(r.container)
            })
            .count()
    }

    /// Drop every watch set and stop all of their sessions
    pub fn unwatch_all(&mut self, pool: &mut RendererPool, containers: &mut ContainerRegistry) -> usize {
        let ids: Vec<WatchId> = self.watches.keys().copied().collect();
        ids.into_iter().map(|id| self.unwatch(id, pool, containers)).sum()
    }

    /// Most recent record for `container`
    pub fn record(&self, container: ContainerId) -> Option<&ContainerObservationRecord> {
        self.watches
            .values()
            .rev()
            .flat_map(|set| set.records.iter())
            .find(|r| r.container == container)
    }

    /// Records still waiting for their first visibility
    pub fn observed(&self) -> usize {
        self.watches
            .values()
            .map(|set| set.records.iter().filter(|r| !r.loaded).count())
            .sum()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }
}

/// Images always load; 3D files load up to the size threshold and otherwise
/// wait for the user; other files have no preview
fn decide(record: &ContainerObservationRecord, options: &WatchOptions) -> Option<ScheduledLoad> {
    match &record.subject {
        ObservedSubject::Model { model_id } => Some(ScheduledLoad::ModelCard {
            model_id: *model_id,
            container: record.container,
        }),
        ObservedSubject::File { file_id, kind, byte_size } => {
            let request = PreviewRequest {
                file_id: *file_id,
                container: record.container,
                size_class: options.size_class,
                format_hint: *kind,
            };
            match kind {
                FileKind::Image => Some(ScheduledLoad::Preview(request)),
                FileKind::Mesh(_) if *byte_size <= options.autoload_max_bytes => {
                    Some(ScheduledLoad::Preview(request))
                }
                FileKind::Mesh(_) => {
                    log::warn!(
                        "File {} is {} bytes, above the autoload limit; waiting for user",
                        file_id,
                        byte_size
                    );
                    Some(ScheduledLoad::ManualTrigger {
                        container: record.container,
                        file_id: *file_id,
                        byte_size: *byte_size,
                    })
                }
                FileKind::Other => None,
            }
        }
    }
}
