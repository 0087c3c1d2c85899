use serde::Deserialize;

use crate::application::building_service::ProcessingSettings;
use crate::domain::footprint::{DEFAULT_HEIGHT_M, LEVEL_HEIGHT_M};
use crate::domain::horizon::{DEFAULT_RAY_LENGTH_M, DEFAULT_STEP_DEG};
use crate::domain::peak_power::{POWER_DENSITY_W_PER_M2, ROOF_AREA_FACTOR};
use crate::domain::sensitivity::DEFAULT_TILT_VALUES;

pub const PVGIS_SERIESCALC_URL: &str = "https://re.jrc.ec.europa.eu/api/v5_2/seriescalc";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub input: InputSettings,
    pub pvgis: PvgisSettings,
    pub horizon: HorizonSettings,
    pub roof: RoofSettings,
    pub analysis: AnalysisSettings,
    pub store: StoreSettings,
    pub batch: BatchSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputSettings {
    pub footprints_path: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            footprints_path: "data/buildings.geojson".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PvgisSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub year: i32,
    pub default_tilt_deg: f64,
}

impl Default for PvgisSettings {
    fn default() -> Self {
        Self {
            endpoint: PVGIS_SERIESCALC_URL.to_string(),
            timeout_secs: 60,
            year: 2020,
            default_tilt_deg: 35.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HorizonSettings {
    pub step_deg: u32,
    pub ray_length_m: f64,
}

impl Default for HorizonSettings {
    fn default() -> Self {
        Self {
            step_deg: DEFAULT_STEP_DEG,
            ray_length_m: DEFAULT_RAY_LENGTH_M,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoofSettings {
    pub area_factor: f64,
    pub power_density_w_per_m2: f64,
    pub default_height_m: f64,
    pub level_height_m: f64,
}

impl Default for RoofSettings {
    fn default() -> Self {
        Self {
            area_factor: ROOF_AREA_FACTOR,
            power_density_w_per_m2: POWER_DENSITY_W_PER_M2,
            default_height_m: DEFAULT_HEIGHT_M,
            level_height_m: LEVEL_HEIGHT_M,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisSettings {
    pub tilt_values: Vec<f64>,
    pub horizon_impact_on_batch: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            tilt_values: DEFAULT_TILT_VALUES.to_vec(),
            horizon_impact_on_batch: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: "data/results.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BatchSettings {
    pub run_on_startup: bool,
}

impl AppConfig {
    pub fn processing_settings(&self) -> ProcessingSettings {
        ProcessingSettings {
            step_deg: self.horizon.step_deg,
            ray_length_m: self.horizon.ray_length_m,
            roof_area_factor: self.roof.area_factor,
            power_density_w_per_m2: self.roof.power_density_w_per_m2,
            default_tilt_deg: self.pvgis.default_tilt_deg,
            tilt_values: self.analysis.tilt_values.clone(),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let step = self.horizon.step_deg;
        if step == 0 || 360 % step != 0 {
            anyhow::bail!("horizon.step_deg must divide 360, got {}", step);
        }
        if self.horizon.ray_length_m <= 0.0 {
            anyhow::bail!("horizon.ray_length_m must be positive, got {}", self.horizon.ray_length_m);
        }
        if self.pvgis.timeout_secs == 0 {
            anyhow::bail!("pvgis.timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Load settings from the optional `config/pv` file, overridden by `PV__*`
/// environment variables (e.g. `PV__HORIZON__STEP_DEG=15`).
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/pv").required(false))
        .add_source(
            config::Environment::with_prefix("PV")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("analysis.tilt_values")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}
