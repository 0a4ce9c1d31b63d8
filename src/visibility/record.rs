//! Observation records and scheduled loads

use crate::host::ContainerId;
use crate::preview::classify::FileKind;
use crate::preview::request::{PreviewRequest, SizeClass};

/// What a watched container previews
#[derive(Clone, Debug, PartialEq)]
pub enum ObservedSubject {
    /// A specific file, gated by kind and size
    File { file_id: i64, kind: FileKind, byte_size: u64 },
    /// A model card; its preview file is chosen when it becomes visible
    Model { model_id: i64 },
}

/// One container in a watch set
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerObservationRecord {
    pub container: ContainerId,
    /// Set on the first visibility transition; never cleared
    pub loaded: bool,
    pub subject: ObservedSubject,
}

impl ContainerObservationRecord {
    pub fn file(container: ContainerId, file_id: i64, kind: FileKind, byte_size: u64) -> Self {
        Self {
            container,
            loaded: false,
            subject: ObservedSubject::File { file_id, kind, byte_size },
        }
    }

    pub fn model(container: ContainerId, model_id: i64) -> Self {
        Self {
            container,
            loaded: false,
            subject: ObservedSubject::Model { model_id },
        }
    }
}

/// Options for one watch registration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatchOptions {
    /// Extra pixels around the viewport that count as visible
    pub margin: f32,
    pub size_class: SizeClass,
    /// 3D files larger than this wait for a user action
    pub autoload_max_bytes: u64,
}

/// What the scheduler decided for a newly visible container
#[derive(Clone, Debug, PartialEq)]
pub enum ScheduledLoad {
    Preview(PreviewRequest),
    ModelCard { model_id: i64, container: ContainerId },
    ManualTrigger { container: ContainerId, file_id: i64, byte_size: u64 },
}

impl ScheduledLoad {
    pub fn container(&self) -> ContainerId {
        match self {
            ScheduledLoad::Preview(request) => request.container,
            ScheduledLoad::ModelCard { container, .. } => *container,
            ScheduledLoad::ManualTrigger { container, .. } => *container,
        }
    }
}
