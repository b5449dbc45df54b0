use std::collections::HashSet;

use actix_web::{
    http,
    web::{Data, Json, Path},
    HttpRequest, HttpResponse,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::{boathouses, manual_overrides};
use crate::app::Config;
use crate::auth;
use crate::database::{
    build_http_400_response, build_http_500_response, BoathouseFlag, Error, Pool,
};

/// Accepted reason codes for a manual override.
pub(crate) const REASON_CODES: [&str; 3] = ["cyanobacteria", "sewage", "other"];

/// A time-bounded record forcing a boathouse's flag to unsafe regardless of
/// the model output, e.g. after a reported sewage discharge.
#[derive(Debug, Identifiable, Queryable, Serialize)]
#[table_name = "manual_overrides"]
pub(crate) struct ManualOverride {
    pub(crate) id: i32,
    pub(crate) boathouse: String,
    pub(crate) start_time: NaiveDateTime,
    pub(crate) end_time: NaiveDateTime,
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize, Insertable, AsChangeset)]
#[table_name = "manual_overrides"]
pub(crate) struct NewManualOverride {
    pub(crate) boathouse: String,
    pub(crate) start_time: NaiveDateTime,
    pub(crate) end_time: NaiveDateTime,
    pub(crate) reason: String,
}

/// An override is active iff the current time falls within its window,
/// bounds included.
pub(crate) fn window_contains(
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    now: NaiveDateTime,
) -> bool {
    start_time <= now && now <= end_time
}

/// Boathouses with at least one override window containing `now`. The table
/// is admin-entered and small, so the scan happens here rather than in SQL.
pub(crate) fn active_overrides(
    conn: &PgConnection,
    now: NaiveDateTime,
) -> Result<HashSet<String>, Error> {
    use manual_overrides::dsl;
    let rows = dsl::manual_overrides.load::<ManualOverride>(conn)?;
    Ok(rows
        .into_iter()
        .filter(|row| window_contains(row.start_time, row.end_time, now))
        .map(|row| row.boathouse)
        .collect())
}

/// Forces every actively overridden boathouse to unsafe. Flags for other
/// boathouses pass through unchanged; an override never makes a flag safe.
pub(crate) fn apply_overrides(
    mut flags: Vec<BoathouseFlag>,
    active: &HashSet<String>,
) -> Vec<BoathouseFlag> {
    for flag in &mut flags {
        if active.contains(&flag.boathouse) {
            flag.safe = false;
        }
    }
    flags
}

fn validate(conn: &PgConnection, record: &NewManualOverride) -> Result<Option<String>, Error> {
    if !REASON_CODES.contains(&record.reason.as_str()) {
        return Ok(Some(format!("unknown reason code: {}", record.reason)));
    }
    if record.start_time >= record.end_time {
        return Ok(Some("start_time must precede end_time".to_string()));
    }
    let known: i64 = boathouses::dsl::boathouses
        .filter(boathouses::dsl::boathouse.eq(&record.boathouse))
        .count()
        .get_result(conn)?;
    if known == 0 {
        return Ok(Some(format!("unknown boathouse: {}", record.boathouse)));
    }
    Ok(None)
}

pub(crate) async fn get_manual_overrides(
    req: HttpRequest,
    pool: Data<Pool>,
    config: Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    use manual_overrides::dsl;
    if let Some(challenge) = auth::check_basic_auth(&req, &config) {
        return Ok(challenge);
    }
    let query_result: Result<Vec<ManualOverride>, Error> =
        pool.get().map_err(Into::into).and_then(|conn| {
            dsl::manual_overrides
                .order(dsl::start_time.desc())
                .load::<ManualOverride>(&conn)
                .map_err(Into::into)
        });

    match query_result {
        Ok(overrides) => Ok(HttpResponse::Ok()
            .header(http::header::CONTENT_TYPE, "application/json")
            .json(overrides)),
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

pub(crate) async fn add_manual_override(
    req: HttpRequest,
    pool: Data<Pool>,
    config: Data<Config>,
    record: Json<NewManualOverride>,
) -> Result<HttpResponse, actix_web::Error> {
    use manual_overrides::dsl;
    if let Some(challenge) = auth::check_basic_auth(&req, &config) {
        return Ok(challenge);
    }
    let record = record.into_inner();
    let insert_result: Result<Result<ManualOverride, String>, Error> =
        pool.get().map_err(Into::into).and_then(|conn| {
            if let Some(message) = validate(&conn, &record)? {
                return Ok(Err(message));
            }
            diesel::insert_into(dsl::manual_overrides)
                .values(&record)
                .get_result::<ManualOverride>(&conn)
                .map(Ok)
                .map_err(Into::into)
        });

    match insert_result {
        Ok(Ok(inserted)) => Ok(HttpResponse::Created()
            .header(http::header::CONTENT_TYPE, "application/json")
            .json(inserted)),
        Ok(Err(message)) => Ok(build_http_400_response(&message)),
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

pub(crate) async fn update_manual_override(
    req: HttpRequest,
    pool: Data<Pool>,
    config: Data<Config>,
    id: Path<i32>,
    record: Json<NewManualOverride>,
) -> Result<HttpResponse, actix_web::Error> {
    use manual_overrides::dsl;
    if let Some(challenge) = auth::check_basic_auth(&req, &config) {
        return Ok(challenge);
    }
    let id = id.into_inner();
    let record = record.into_inner();
    let update_result: Result<Result<usize, String>, Error> =
        pool.get().map_err(Into::into).and_then(|conn| {
            if let Some(message) = validate(&conn, &record)? {
                return Ok(Err(message));
            }
            diesel::update(dsl::manual_overrides.filter(dsl::id.eq(id)))
                .set(&record)
                .execute(&conn)
                .map(Ok)
                .map_err(Into::into)
        });

    match update_result {
        Ok(Ok(0)) => Ok(HttpResponse::NotFound().into()),
        Ok(Ok(_)) => Ok(HttpResponse::Ok().into()),
        Ok(Err(message)) => Ok(build_http_400_response(&message)),
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

pub(crate) async fn delete_manual_override(
    req: HttpRequest,
    pool: Data<Pool>,
    config: Data<Config>,
    id: Path<i32>,
) -> Result<HttpResponse, actix_web::Error> {
    use manual_overrides::dsl;
    if let Some(challenge) = auth::check_basic_auth(&req, &config) {
        return Ok(challenge);
    }
    let delete_result: Result<usize, Error> = pool.get().map_err(Into::into).and_then(|conn| {
        diesel::delete(dsl::manual_overrides.filter(dsl::id.eq(id.into_inner())))
            .execute(&conn)
            .map_err(Into::into)
    });

    match delete_result {
        Ok(0) => Ok(HttpResponse::NotFound().into()),
        Ok(_) => Ok(HttpResponse::Ok().into()),
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn flag(boathouse: &str, safe: bool) -> BoathouseFlag {
        BoathouseFlag {
            boathouse: boathouse.to_string(),
            reach: 4,
            safe,
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = parse("2023-06-01T00:00");
        let end = parse("2023-06-03T00:00");
        assert!(window_contains(start, end, start));
        assert!(window_contains(start, end, end));
        assert!(window_contains(start, end, parse("2023-06-02T12:00")));
        assert!(!window_contains(start, end, parse("2023-05-31T23:59")));
        assert!(!window_contains(start, end, parse("2023-06-03T00:01")));
    }

    #[test]
    fn overridden_boathouse_is_forced_unsafe() {
        // Riverside is overridden 2023-06-01 through 2023-06-03; at noon on
        // the 2nd its flag must come out unsafe even though the model said
        // safe.
        let flags = vec![
            flag("Riverside Boat Club", true),
            flag("Union Boat Club", true),
        ];
        let active: HashSet<String> = vec!["Riverside Boat Club".to_string()]
            .into_iter()
            .collect();
        let flags = apply_overrides(flags, &active);
        assert_eq!(flags[0], flag("Riverside Boat Club", false));
        assert_eq!(flags[1], flag("Union Boat Club", true));
    }

    #[test]
    fn overrides_never_make_a_flag_safe() {
        let flags = vec![flag("Union Boat Club", false)];
        let active: HashSet<String> =
            vec!["Union Boat Club".to_string()].into_iter().collect();
        let flags = apply_overrides(flags, &active);
        assert!(!flags[0].safe);
    }

    #[test]
    fn empty_active_set_passes_flags_through() {
        let flags = vec![flag("Community Boating", true), flag("Union Boat Club", false)];
        let out = apply_overrides(flags, &HashSet::new());
        assert!(out[0].safe);
        assert!(!out[1].safe);
    }
}
