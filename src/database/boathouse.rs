use actix_web::{http, web::Data, HttpResponse};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use super::schema::boathouses;
use crate::database::{
    active_overrides, apply_overrides, build_http_500_response, latest_flag_per_reach,
    latest_model_outputs, latest_time, Error, Pool, DEFAULT_HOURS,
};

/// Static reference data for one boathouse. Seeded by the schema migration
/// and essentially never changes.
#[derive(Debug, Queryable, Serialize)]
pub(crate) struct Boathouse {
    pub(crate) boathouse: String,
    pub(crate) reach: i32,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
}

/// One boathouse's flag after model output and overrides are combined.
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct BoathouseFlag {
    pub(crate) boathouse: String,
    pub(crate) reach: i32,
    pub(crate) safe: bool,
}

pub(crate) fn boathouse_table(conn: &PgConnection) -> Result<Vec<Boathouse>, Error> {
    boathouses::dsl::boathouses
        .order(boathouses::dsl::boathouse.asc())
        .load::<Boathouse>(conn)
        .map_err(Into::into)
}

/// Reads everything a flag view needs in one pass: per-boathouse flags with
/// overrides applied, plus the latest model timestamp.
pub(crate) fn assemble_flags(
    conn: &PgConnection,
    now: NaiveDateTime,
) -> Result<(Vec<BoathouseFlag>, Option<NaiveDateTime>), Error> {
    let outputs = latest_model_outputs(conn, DEFAULT_HOURS)?;
    let reach_flags = latest_flag_per_reach(&outputs);
    let flags = boathouse_table(conn)?
        .into_iter()
        .filter_map(|b| {
            reach_flags.get(&b.reach).map(|&safe| BoathouseFlag {
                boathouse: b.boathouse,
                reach: b.reach,
                safe,
            })
        })
        .collect();
    let active = active_overrides(conn, now)?;
    let flags = apply_overrides(flags, &active);
    let latest = latest_time(conn)?;
    Ok((flags, latest))
}

/// One-line summary of the current flags, suitable for the log or a status
/// feed. Overrides are expected to be applied already.
pub(crate) fn compose_status(flags: &[BoathouseFlag], now: NaiveDateTime) -> String {
    let time = now.format("%I:%M:%S %p, %m/%d/%Y");
    let unsafe_names: Vec<&str> = flags
        .iter()
        .filter(|flag| !flag.safe)
        .map(|flag| flag.boathouse.as_str())
        .collect();
    if unsafe_names.is_empty() {
        format!(
            "Our predictive model is reporting all boathouses are safe for \
             recreational activities as of {}.",
            time
        )
    } else {
        format!(
            "Our predictive model is reporting that the following boathouses \
             are unsafe as of {}: {}.",
            time,
            unsafe_names.join(", ")
        )
    }
}

pub(crate) async fn get_boathouses(pool: Data<Pool>) -> Result<HttpResponse, actix_web::Error> {
    let query_result: Result<Vec<Boathouse>, Error> = pool
        .get()
        .map_err(Into::into)
        .and_then(|conn| boathouse_table(&conn));

    match query_result {
        Ok(boathouses) => Ok(HttpResponse::Ok()
            .header(http::header::CONTENT_TYPE, "application/json")
            .json(serde_json::json!({ "boathouses": boathouses }))),
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(boathouse: &str, safe: bool) -> BoathouseFlag {
        BoathouseFlag {
            boathouse: boathouse.to_string(),
            reach: 4,
            safe,
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2020-06-13 12:30:15", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn all_safe_status_mentions_no_boathouses() {
        let flags = vec![flag("Union Boat Club", true), flag("Community Boating", true)];
        let status = compose_status(&flags, noon());
        assert_eq!(
            status,
            "Our predictive model is reporting all boathouses are safe for \
             recreational activities as of 12:30:15 PM, 06/13/2020."
        );
    }

    #[test]
    fn unsafe_boathouses_are_listed_by_name() {
        let flags = vec![
            flag("Union Boat Club", true),
            flag("Riverside Boat Club", false),
            flag("Newton Yacht Club", false),
        ];
        let status = compose_status(&flags, noon());
        assert!(status.contains("unsafe as of 12:30:15 PM, 06/13/2020"));
        assert!(status.contains("Riverside Boat Club, Newton Yacht Club"));
        assert!(!status.contains("Union Boat Club"));
    }
}
