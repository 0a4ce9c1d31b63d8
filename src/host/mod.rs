//! Host environment: preview containers and the capability gate

pub mod container;
pub mod gate;

pub use container::{
    fit_image, Container, ContainerContent, ContainerId, ContainerRegistry, ImageFit, SharedContainers,
};
pub use gate::CapabilityGate;
