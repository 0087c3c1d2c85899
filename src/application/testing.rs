// Scriptable simulator for service tests
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::simulation::{PvSimulator, SimulationError, SimulationOutput, SimulationRequest};
use crate::domain::metrics::tests::stamps;
use crate::domain::metrics::HourlySeries;

type Responder = Box<dyn Fn(&SimulationRequest) -> Result<SimulationOutput, SimulationError> + Send + Sync>;

pub(crate) struct FakeSimulator {
    calls: AtomicUsize,
    requests: Mutex<Vec<SimulationRequest>>,
    respond: Responder,
}

impl FakeSimulator {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&SimulationRequest) -> Result<SimulationOutput, SimulationError> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Two complete days at a constant `power_w`.
    pub(crate) fn output(power_w: f64) -> SimulationOutput {
        SimulationOutput {
            series: HourlySeries::new(stamps(2), vec![power_w; 48]),
            radiation_db: Some("PVGIS-SARAH2".to_string()),
        }
    }

    pub(crate) fn constant(power_w: f64) -> Self {
        Self::new(move |_| Ok(Self::output(power_w)))
    }

    pub(crate) fn failing() -> Self {
        Self::new(|_| Err(SimulationError::Transport("connection refused".to_string())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<SimulationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PvSimulator for FakeSimulator {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationOutput, SimulationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}
