// Application state for HTTP handlers
use crate::application::analysis_service::AnalysisService;
use crate::application::batch_stream_service::BatchStreamService;
use crate::application::building_service::BuildingService;

#[derive(Clone)]
pub struct AppState {
    pub building_service: BuildingService,
    pub analysis_service: AnalysisService,
    pub batch_stream_service: BatchStreamService,
    pub horizon_impact_on_batch: bool,
}
