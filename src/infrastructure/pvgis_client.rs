// PVGIS seriescalc client implementing the simulation port
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::application::simulation::{PvSimulator, SimulationError, SimulationOutput, SimulationRequest};
use crate::domain::metrics::HourlySeries;

#[derive(Debug, Clone)]
pub struct PvgisClient {
    endpoint: String,
    year: i32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SeriesCalcResponse {
    #[serde(default)]
    inputs: Option<SeriesCalcInputs>,
    #[serde(default)]
    outputs: Option<SeriesCalcOutputs>,
}

#[derive(Debug, Deserialize)]
struct SeriesCalcInputs {
    #[serde(default)]
    meteo_data: Option<MeteoData>,
}

#[derive(Debug, Deserialize)]
struct MeteoData {
    #[serde(default)]
    radiation_db: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesCalcOutputs {
    #[serde(default)]
    hourly: Option<Vec<Map<String, Value>>>,
}

impl PvgisClient {
    pub fn new(endpoint: String, year: i32, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build PVGIS HTTP client")?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            year,
            client,
        })
    }

    fn build_query_url(&self, request: &SimulationRequest) -> String {
        format!(
            "{}?lat={}&lon={}&peakpower={}&pvcalculation=1&outputformat=json&browser=0\
             &startyear={}&endyear={}&usehorizon=1&userhorizon={}&mountingplace=free&loss=0.0\
             &optimalinclination=0&optimalangles=0&angle={}&aspect={}",
            self.endpoint,
            request.lat,
            request.lon,
            request.peak_power_kwp,
            self.year,
            self.year,
            urlencoding::encode(&request.userhorizon),
            request.tilt_deg,
            request.aspect_deg
        )
    }
}

fn transport_error(e: reqwest::Error) -> SimulationError {
    if e.is_timeout() {
        SimulationError::Timeout
    } else {
        SimulationError::Transport(e.to_string())
    }
}

/// Column-oriented series from the hourly rows. The power column is absent
/// when no row carries a numeric `P`; rows without one count as 0 W.
fn parse_series(rows: &[Map<String, Value>]) -> HourlySeries {
    let time = rows
        .iter()
        .map(|row| row.get("time").and_then(Value::as_str).map(str::to_string))
        .collect::<Option<Vec<String>>>();

    let has_power = rows.iter().any(|row| row.get("P").and_then(Value::as_f64).is_some());
    let power_w = has_power.then(|| {
        rows.iter()
            .map(|row| row.get("P").and_then(Value::as_f64).unwrap_or(0.0))
            .collect()
    });

    HourlySeries { time, power_w }
}

fn into_output(response: SeriesCalcResponse) -> Result<SimulationOutput, SimulationError> {
    let rows = response
        .outputs
        .and_then(|o| o.hourly)
        .ok_or_else(|| SimulationError::Malformed("response has no outputs.hourly".to_string()))?;

    let series = parse_series(&rows);
    if series.power_w.is_none() {
        tracing::warn!("PVGIS response has no power column ({} rows)", rows.len());
    }
    tracing::debug!("PVGIS returned {} hourly rows", series.len());

    Ok(SimulationOutput {
        series,
        radiation_db: response
            .inputs
            .and_then(|i| i.meteo_data)
            .and_then(|m| m.radiation_db),
    })
}

#[async_trait]
impl PvSimulator for PvgisClient {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationOutput, SimulationError> {
        let url = self.build_query_url(request);
        tracing::debug!("PVGIS request: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SimulationError::Status { status, body });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let data: SeriesCalcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| SimulationError::Malformed(e.to_string()))?;

        into_output(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> PvgisClient {
        PvgisClient::new(
            "https://re.jrc.ec.europa.eu/api/v5_2/seriescalc/".to_string(),
            2020,
            Duration::from_secs(60),
        )
        .unwrap()
    }

    fn request() -> SimulationRequest {
        SimulationRequest {
            lat: 45.5,
            lon: 9.25,
            userhorizon: "0.0,36.87,0.0".to_string(),
            peak_power_kwp: 8.0,
            tilt_deg: 35.0,
            aspect_deg: -90.0,
        }
    }

    #[test]
    fn test_build_query_url() {
        let url = client().build_query_url(&request());
        assert_eq!(
            url,
            "https://re.jrc.ec.europa.eu/api/v5_2/seriescalc?lat=45.5&lon=9.25&peakpower=8\
             &pvcalculation=1&outputformat=json&browser=0&startyear=2020&endyear=2020\
             &usehorizon=1&userhorizon=0.0%2C36.87%2C0.0&mountingplace=free&loss=0.0\
             &optimalinclination=0&optimalangles=0&angle=35&aspect=-90"
        );
    }

    #[test]
    fn test_parse_full_response() {
        let data: SeriesCalcResponse = serde_json::from_value(json!({
            "inputs": {"meteo_data": {"radiation_db": "PVGIS-SARAH2"}},
            "outputs": {"hourly": [
                {"time": "20200101:0010", "P": 0.0, "G(i)": 0.0},
                {"time": "20200101:0110", "P": 125.5, "G(i)": 10.0}
            ]}
        }))
        .unwrap();

        let output = into_output(data).unwrap();
        assert_eq!(output.radiation_db.as_deref(), Some("PVGIS-SARAH2"));
        assert_eq!(output.series.len(), 2);
        assert_eq!(output.series.power_w, Some(vec![0.0, 125.5]));
        assert_eq!(
            output.series.time,
            Some(vec!["20200101:0010".to_string(), "20200101:0110".to_string()])
        );
    }

    #[test]
    fn test_missing_power_column_is_tolerated() {
        let data: SeriesCalcResponse = serde_json::from_value(json!({
            "outputs": {"hourly": [{"time": "20200101:0010", "G(i)": 1.0}]}
        }))
        .unwrap();

        let output = into_output(data).unwrap();
        assert_eq!(output.series.power_w, None);
        assert_eq!(output.series.energy_kwh(), 0.0);
        assert_eq!(output.radiation_db, None);
    }

    #[test]
    fn test_partial_power_rows_count_as_zero() {
        let data: SeriesCalcResponse = serde_json::from_value(json!({
            "outputs": {"hourly": [
                {"time": "20200101:0010", "P": 100.0},
                {"time": "20200101:0110", "P": null}
            ]}
        }))
        .unwrap();

        assert_eq!(into_output(data).unwrap().series.power_w, Some(vec![100.0, 0.0]));
    }

    #[test]
    fn test_missing_hourly_is_malformed() {
        let data: SeriesCalcResponse = serde_json::from_value(json!({"outputs": {}})).unwrap();
        assert!(matches!(into_output(data), Err(SimulationError::Malformed(_))));
    }
}
