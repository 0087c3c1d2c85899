// Application layer - use cases and the ports they depend on
pub mod analysis_service;
pub mod batch_stream_service;
pub mod building_service;
pub mod results_store;
pub mod simulation;

#[cfg(test)]
pub(crate) mod testing;
