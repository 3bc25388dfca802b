//! Demand model fitting and horizon generation
//!
//! A deliberately small model: least-squares linear trend over the day index
//! plus additive day-of-week adjustments, floored at zero. Everything outside
//! this module treats the serialized artifact as opaque bytes, so a heavier
//! forecasting engine can replace this one behind the same seam.

use crate::error::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum number of distinct dates required to fit a model
pub const MIN_TRAINING_POINTS: usize = 14;

/// A fitted per-product demand model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    intercept: f64,
    slope: f64,
    /// Additive adjustment per weekday, Monday first
    weekday_adjust: [f64; 7],
    first_date: NaiveDate,
    last_date: NaiveDate,
    distinct_points: usize,
}

/// One forecast horizon entry
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub quantity: f64,
}

/// Sum same-date observations: duplicate dates in the source are additive,
/// not replacements
fn aggregate_by_date(series: &[(NaiveDate, i32)]) -> BTreeMap<NaiveDate, f64> {
    let mut by_date = BTreeMap::new();
    for (date, quantity) in series {
        *by_date.entry(*date).or_insert(0.0) += f64::from(*quantity);
    }
    by_date
}

impl ForecastModel {
    /// Fit a model from a product's sales series.
    ///
    /// Requires at least [`MIN_TRAINING_POINTS`] distinct dates; fewer
    /// returns `InsufficientData` without producing a model.
    pub fn fit(product_id: &str, series: &[(NaiveDate, i32)]) -> Result<Self> {
        let by_date = aggregate_by_date(series);
        if by_date.len() < MIN_TRAINING_POINTS {
            return Err(Error::InsufficientData {
                product_id: product_id.to_string(),
                points: by_date.len(),
                required: MIN_TRAINING_POINTS,
            });
        }

        let points: Vec<(NaiveDate, f64)> = by_date.into_iter().collect();
        let first_date = points[0].0;
        let last_date = points[points.len() - 1].0;

        let n = points.len() as f64;
        let ts: Vec<f64> = points
            .iter()
            .map(|(date, _)| (*date - first_date).num_days() as f64)
            .collect();

        let mean_t = ts.iter().sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut var_t = 0.0;
        let mut cov_ty = 0.0;
        for (t, (_, y)) in ts.iter().zip(&points) {
            var_t += (t - mean_t) * (t - mean_t);
            cov_ty += (t - mean_t) * (y - mean_y);
        }

        // var_t > 0 is guaranteed: at least 14 distinct dates means distinct
        // day indices
        let slope = cov_ty / var_t;
        let intercept = mean_y - slope * mean_t;

        // Weekly seasonality as mean residual per weekday
        let mut sums = [0.0_f64; 7];
        let mut counts = [0usize; 7];
        for (t, (date, y)) in ts.iter().zip(&points) {
            let residual = y - (intercept + slope * t);
            let weekday = date.weekday().num_days_from_monday() as usize;
            sums[weekday] += residual;
            counts[weekday] += 1;
        }

        let mut weekday_adjust = [0.0_f64; 7];
        for i in 0..7 {
            if counts[i] > 0 {
                weekday_adjust[i] = sums[i] / counts[i] as f64;
            }
        }

        Ok(ForecastModel {
            intercept,
            slope,
            weekday_adjust,
            first_date,
            last_date,
            distinct_points: points.len(),
        })
    }

    /// Generate exactly `horizon_days` chronological predictions starting the
    /// day after the last fitted date. Quantities are floored at zero and
    /// left unrounded; output encoding is the caller's concern.
    pub fn predict(&self, horizon_days: u32) -> Vec<ForecastPoint> {
        (1..=i64::from(horizon_days))
            .map(|offset| {
                let date = self.last_date + Duration::days(offset);
                let t = (date - self.first_date).num_days() as f64;
                let weekday = date.weekday().num_days_from_monday() as usize;
                let quantity = (self.intercept + self.slope * t + self.weekday_adjust[weekday]).max(0.0);
                ForecastPoint { date, quantity }
            })
            .collect()
    }

    /// Number of distinct dates the model was fitted on
    pub fn distinct_points(&self) -> usize {
        self.distinct_points
    }

    /// Last date of the fitted series
    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }
}
