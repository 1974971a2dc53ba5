// Domain layer: core models and ports (interfaces). No vendor SDKs here.

pub mod model;
pub mod ports;
