// Domain layer: source records, target entities and the two ports the sync talks through.

pub mod model;
pub mod ports;
