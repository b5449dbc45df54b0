use std::collections::HashMap;

use actix_web::{
    http,
    web::{Data, Query},
    HttpResponse,
};
use chrono::{Duration, Local, NaiveDateTime};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;

use super::schema::model_outputs;
use crate::app::Config;
use crate::database::{build_http_500_response, Error, Pool};
use crate::model::ModelOutput;

/// Query-string filters shared by `/output_model` and `/api/v1/model`.
/// `reach` of -1 selects every reach.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelOutputQuery {
    pub(crate) reach: Option<i32>,
    pub(crate) hours: Option<i64>,
}

pub(crate) const DEFAULT_HOURS: i64 = 24;
pub(crate) const ALL_REACHES: i32 = -1;

/// Clamps a requested hour window to `[1, max_hours]`.
pub(crate) fn clamp_hours(requested: i64, max_hours: i64) -> i64 {
    requested.max(1).min(max_hours)
}

/// Model outputs within `hours` of the most recent persisted timestamp,
/// newest first within each reach. Empty table gives an empty result.
pub(crate) fn latest_model_outputs(
    conn: &PgConnection,
    hours: i64,
) -> Result<Vec<ModelOutput>, Error> {
    use model_outputs::dsl;
    let latest: Option<NaiveDateTime> = dsl::model_outputs
        .select(diesel::dsl::max(dsl::time))
        .first(conn)?;
    let latest = match latest {
        Some(latest) => latest,
        None => return Ok(Vec::new()),
    };
    dsl::model_outputs
        .filter(dsl::time.gt(latest - Duration::hours(hours)))
        .order((dsl::reach.asc(), dsl::time.desc()))
        .load::<ModelOutput>(conn)
        .map_err(Into::into)
}

/// The newest verdict per reach.
pub(crate) fn latest_flag_per_reach(outputs: &[ModelOutput]) -> HashMap<i32, bool> {
    let mut newest: HashMap<i32, (NaiveDateTime, bool)> = HashMap::new();
    for output in outputs {
        let entry = newest
            .entry(output.reach)
            .or_insert((output.time, output.safe));
        if output.time > entry.0 {
            *entry = (output.time, output.safe);
        }
    }
    newest.into_iter().map(|(k, (_, safe))| (k, safe)).collect()
}

pub(crate) fn filter_reach(outputs: Vec<ModelOutput>, reach: i32) -> Vec<ModelOutput> {
    if reach == ALL_REACHES {
        outputs
    } else {
        outputs.into_iter().filter(|o| o.reach == reach).collect()
    }
}

/// `GET /api/v1/model`: JSON model outputs grouped per reach, with the same
/// reach/hours filters as the HTML table view.
pub(crate) async fn get_model_api(
    pool: Data<Pool>,
    config: Data<Config>,
    query: Query<ModelOutputQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let hours = clamp_hours(
        query.hours.unwrap_or(DEFAULT_HOURS),
        config.api_max_hours,
    );
    let reach = query.reach.unwrap_or(ALL_REACHES);

    let query_result: Result<Vec<ModelOutput>, Error> = pool
        .get()
        .map_err(Into::into)
        .and_then(|conn| latest_model_outputs(&conn, hours));

    match query_result {
        Ok(outputs) => {
            let mut models: HashMap<String, Vec<ModelOutput>> = HashMap::new();
            for output in filter_reach(outputs, reach) {
                models.entry(output.reach.to_string()).or_default().push(output);
            }
            Ok(HttpResponse::Ok()
                .header(http::header::CONTENT_TYPE, "application/json")
                .json(json!({
                    "version": "2020",
                    "time_returned": Local::now().naive_local().to_string(),
                    "models": models,
                })))
        }
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(reach: i32, time: &str, safe: bool) -> ModelOutput {
        ModelOutput {
            reach,
            time: NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").unwrap(),
            log_odds: 0.0,
            probability: 0.5,
            safe,
        }
    }

    #[test]
    fn hours_are_clamped_to_the_configured_maximum() {
        assert_eq!(clamp_hours(10_000, 24), 24);
        assert_eq!(clamp_hours(2, 24), 2);
        assert_eq!(clamp_hours(0, 24), 1);
        assert_eq!(clamp_hours(-5, 24), 1);
        assert_eq!(clamp_hours(24, 24), 24);
    }

    #[test]
    fn newest_verdict_wins_per_reach() {
        let outputs = vec![
            output(2, "2020-06-13 10:00", true),
            output(2, "2020-06-13 11:00", false),
            output(3, "2020-06-13 11:00", true),
            output(3, "2020-06-13 09:00", false),
        ];
        let flags = latest_flag_per_reach(&outputs);
        assert_eq!(flags.get(&2), Some(&false));
        assert_eq!(flags.get(&3), Some(&true));
    }

    #[test]
    fn reach_filter_keeps_only_that_reach() {
        let outputs = vec![
            output(2, "2020-06-13 10:00", true),
            output(3, "2020-06-13 10:00", true),
        ];
        let filtered = filter_reach(outputs, 3);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].reach, 3);
    }

    #[test]
    fn reach_minus_one_keeps_everything() {
        let outputs = vec![
            output(2, "2020-06-13 10:00", true),
            output(3, "2020-06-13 10:00", true),
        ];
        assert_eq!(filter_reach(outputs, ALL_REACHES).len(), 2);
    }
}
