// Annual and best/worst-day metrics from an hourly power series
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::geometry::round_to;

/// Timestamp format used by the simulation service, e.g. `20200101:0010`.
pub const SERIES_TIME_FORMAT: &str = "%Y%m%d:%H%M";
const HOURS_PER_YEAR: f64 = 8760.0;
const HOURS_PER_DAY: usize = 24;

/// Hourly simulation output, column oriented. A column is `None` when the
/// service response did not carry it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    pub time: Option<Vec<String>>,
    pub power_w: Option<Vec<f64>>,
}

impl HourlySeries {
    #[cfg(test)]
    pub fn new(time: Vec<String>, power_w: Vec<f64>) -> Self {
        Self {
            time: Some(time),
            power_w: Some(power_w),
        }
    }

    /// Number of rows, whichever column is present.
    pub fn len(&self) -> usize {
        self.power_w
            .as_ref()
            .map(Vec::len)
            .or_else(|| self.time.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total energy in kWh, unrounded; zero without a power column.
    pub fn energy_kwh(&self) -> f64 {
        self.power_w
            .as_ref()
            .map(|p| p.iter().sum::<f64>() / 1000.0)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualMetrics {
    pub energy_kwh: f64,
    pub capacity_factor: f64,
    pub specific_yield_kwh_kw: f64,
    pub avg_power_w: f64,
    pub max_power_w: f64,
    pub min_power_w: f64,
    pub peak_hours_h: f64,
    pub num_hours: usize,
}

pub fn compute_annual_metrics(series: &HourlySeries, peak_power_kwp: f64) -> AnnualMetrics {
    let power = match series.power_w.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return AnnualMetrics::default(),
    };

    let energy_kwh = power.iter().sum::<f64>() / 1000.0;
    let avg_power_w = power.iter().sum::<f64>() / power.len() as f64;
    let max_power_w = power.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_power_w = power.iter().copied().fold(f64::INFINITY, f64::min);

    let nominal_annual_kwh = peak_power_kwp * HOURS_PER_YEAR;
    let capacity_factor = if nominal_annual_kwh > 0.0 {
        energy_kwh / nominal_annual_kwh
    } else {
        0.0
    };
    let specific_yield = if peak_power_kwp > 0.0 {
        energy_kwh / peak_power_kwp
    } else {
        0.0
    };

    AnnualMetrics {
        energy_kwh: round_to(energy_kwh, 2),
        capacity_factor: round_to(capacity_factor, 4),
        specific_yield_kwh_kw: round_to(specific_yield, 2),
        avg_power_w: round_to(avg_power_w, 2),
        max_power_w: round_to(max_power_w, 2),
        min_power_w: round_to(min_power_w, 2),
        // Equivalent full-load hours equal the specific yield.
        peak_hours_h: round_to(specific_yield, 2),
        num_hours: power.len(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayProfile {
    pub date: Option<NaiveDate>,
    pub energy_kwh: f64,
    pub profile: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestWorstDays {
    pub best: DayProfile,
    pub worst: DayProfile,
}

impl BestWorstDays {
    pub fn is_empty(&self) -> bool {
        self.best.date.is_none() && self.worst.date.is_none()
    }
}

const FALLBACK_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_all(times: &[String], formats: &[&str]) -> Option<Vec<NaiveDateTime>> {
    times
        .iter()
        .map(|t| {
            formats
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(t.trim(), f).ok())
                .or_else(|| chrono::DateTime::parse_from_rfc3339(t.trim()).ok().map(|d| d.naive_utc()))
        })
        .collect()
}

/// Parse the time column with the service format, then generic formats.
/// Either every timestamp parses under one attempt or `None` is returned.
fn parse_times(times: &[String]) -> Option<Vec<NaiveDateTime>> {
    let strict: Option<Vec<NaiveDateTime>> = times
        .iter()
        .map(|t| NaiveDateTime::parse_from_str(t, SERIES_TIME_FORMAT).ok())
        .collect();
    if strict.is_some() {
        return strict;
    }

    tracing::warn!(
        "could not parse series time with format '{}', trying generic formats",
        SERIES_TIME_FORMAT
    );
    let generic = parse_all(times, &FALLBACK_TIME_FORMATS);
    if generic.is_none() {
        tracing::warn!("could not parse series time column at all");
    }
    generic
}

/// Highest- and lowest-energy complete days (exactly 24 samples).
pub fn compute_best_worst_days(series: &HourlySeries) -> BestWorstDays {
    let (Some(times), Some(power)) = (series.time.as_deref(), series.power_w.as_deref()) else {
        return BestWorstDays::default();
    };
    if times.is_empty() || times.len() != power.len() {
        return BestWorstDays::default();
    }
    let Some(stamps) = parse_times(times) else {
        return BestWorstDays::default();
    };

    let mut days: BTreeMap<NaiveDate, Vec<(NaiveDateTime, f64)>> = BTreeMap::new();
    for (stamp, p) in stamps.into_iter().zip(power.iter().copied()) {
        days.entry(stamp.date()).or_default().push((stamp, p));
    }
    days.retain(|_, samples| samples.len() == HOURS_PER_DAY);

    let energy = |samples: &Vec<(NaiveDateTime, f64)>| samples.iter().map(|(_, p)| p).sum::<f64>() / 1000.0;

    // First date wins ties, in calendar order.
    let mut best: Option<(NaiveDate, f64)> = None;
    let mut worst: Option<(NaiveDate, f64)> = None;
    for (date, samples) in &days {
        let e = energy(samples);
        if best.is_none_or(|(_, b)| e > b) {
            best = Some((*date, e));
        }
        if worst.is_none_or(|(_, w)| e < w) {
            worst = Some((*date, e));
        }
    }

    let profile_of = |pick: Option<(NaiveDate, f64)>| -> DayProfile {
        let Some((date, e)) = pick else {
            return DayProfile::default();
        };
        let mut samples = days[&date].clone();
        samples.sort_by_key(|(stamp, _)| *stamp);
        DayProfile {
            date: Some(date),
            energy_kwh: round_to(e, 2),
            profile: samples.into_iter().map(|(_, p)| round_to(p, 2)).collect(),
        }
    };

    BestWorstDays {
        best: profile_of(best),
        worst: profile_of(worst),
    }
}
