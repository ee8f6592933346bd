// Domain layer: models and ports (store interfaces). No I/O lives here.

pub mod model;
pub mod ports;
