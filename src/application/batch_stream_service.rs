// Batch runner streaming per-building progress over a channel
use tokio::sync::mpsc;

use crate::application::building_service::{BatchEvent, BuildingService};

const EVENT_BUFFER: usize = 100;

#[derive(Clone)]
pub struct BatchStreamService {
    buildings: BuildingService,
}

impl BatchStreamService {
    pub fn new(buildings: BuildingService) -> Self {
        Self { buildings }
    }

    /// Start a batch in the background. The receiver yields `started`, one
    /// event per building, then `completed`, and closes when the run ends.
    pub fn stream_batch(&self, with_horizon_impact: bool) -> mpsc::Receiver<BatchEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let buildings = self.buildings.clone();

        tokio::spawn(async move {
            buildings.process_all(with_horizon_impact, Some(tx)).await;
        });

        rx
    }
}
