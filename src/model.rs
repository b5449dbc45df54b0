//! The predictive safety model. The site only depends on the [`Model`]
//! trait; the bundled `ReachModel` is a per-reach logistic fit whose
//! coefficients are maintained outside this repository and updated when the
//! model is re-trained.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::database::schema::model_outputs;
use crate::processor::ProcessedRow;

/// Flags flip to unsafe once the predicted probability of a bacterial
/// exceedance reaches this level.
pub(crate) const SAFETY_THRESHOLD: f64 = 0.65;

#[derive(Clone, Debug, Insertable, Queryable, Serialize)]
#[table_name = "model_outputs"]
pub(crate) struct ModelOutput {
    pub(crate) reach: i32,
    pub(crate) time: NaiveDateTime,
    pub(crate) log_odds: f64,
    pub(crate) probability: f64,
    pub(crate) safe: bool,
}

/// Maps processed feature rows to safety verdicts, one output per input row.
pub(crate) trait Model {
    fn predict(&self, rows: &[ProcessedRow]) -> Vec<ModelOutput>;
}

struct Coefficients {
    intercept: f64,
    rain_0_to_24h_sum: f64,
    rain_0_to_48h_sum: f64,
    log_stream_flow: f64,
    par: f64,
    water_temp: f64,
}

/// Per-reach logistic regression predicting the log odds of an exceedance.
pub(crate) struct ReachModel;

impl ReachModel {
    fn coefficients(reach: i32) -> Coefficients {
        match reach {
            2 => Coefficients {
                intercept: -3.68,
                rain_0_to_24h_sum: 1.23,
                rain_0_to_48h_sum: 0.52,
                log_stream_flow: 0.34,
                par: -0.00041,
                water_temp: 0.018,
            },
            3 => Coefficients {
                intercept: -3.41,
                rain_0_to_24h_sum: 1.06,
                rain_0_to_48h_sum: 0.67,
                log_stream_flow: 0.29,
                par: -0.00037,
                water_temp: 0.021,
            },
            4 => Coefficients {
                intercept: -3.24,
                rain_0_to_24h_sum: 0.98,
                rain_0_to_48h_sum: 0.71,
                log_stream_flow: 0.31,
                par: -0.00033,
                water_temp: 0.024,
            },
            _ => Coefficients {
                intercept: -3.02,
                rain_0_to_24h_sum: 0.91,
                rain_0_to_48h_sum: 0.78,
                log_stream_flow: 0.27,
                par: -0.00029,
                water_temp: 0.027,
            },
        }
    }
}

impl Model for ReachModel {
    fn predict(&self, rows: &[ProcessedRow]) -> Vec<ModelOutput> {
        rows.iter()
            .map(|row| {
                let c = Self::coefficients(row.reach);
                let log_odds = c.intercept
                    + c.rain_0_to_24h_sum * row.rain_0_to_24h_sum
                    + c.rain_0_to_48h_sum * row.rain_0_to_48h_sum
                    + c.log_stream_flow * row.stream_flow.max(1.0).ln()
                    + c.par * row.par
                    + c.water_temp * row.water_temp;
                let probability = 1.0 / (1.0 + (-log_odds).exp());
                ModelOutput {
                    reach: row.reach,
                    time: row.time,
                    log_odds,
                    probability,
                    safe: probability < SAFETY_THRESHOLD,
                }
            })
            .collect()
    }
}
