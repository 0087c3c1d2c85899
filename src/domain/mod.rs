// Domain layer - Geometry and numeric core, free of I/O
pub mod footprint;
pub mod geometry;
pub mod horizon;
pub mod metrics;
pub mod orientation;
pub mod peak_power;
pub mod projection;
pub mod result;
pub mod sensitivity;
