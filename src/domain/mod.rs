// Domain layer: lock and open modes, outcomes, and the ports the sessions plug into.

pub mod model;
pub mod ports;
