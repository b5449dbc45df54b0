//! The data refresh cycle: fetch both upstream feeds, derive features, run
//! the model, and replace the four data tables wholesale.

use actix_web::{web::Data, HttpRequest, HttpResponse};
use chrono::{Local, NaiveDateTime};
use diesel::prelude::*;

use super::schema::{hobolink, model_outputs, processed_data, usgs};
use crate::app::Config;
use crate::auth;
use crate::database::{assemble_flags, build_http_500_response, compose_status, Error, Pool};
use crate::fetch::hobolink::HobolinkReading;
use crate::fetch::usgs::UsgsReading;
use crate::fetch::{self, hobolink as hobolink_fetch, usgs as usgs_fetch};
use crate::model::Model;
use crate::processor;

/// Postgres caps bind parameters per statement; batches this size stay well
/// under the limit for the widest table.
const INSERT_CHUNK: usize = 1_000;

const USGS_DAYS_AGO: i64 = 5;

/// Fetches both upstream series, live or from the data-store snapshots
/// depending on `use_mock_data`.
pub(crate) fn fetch_source_data(
    config: &Config,
) -> Result<(Vec<UsgsReading>, Vec<HobolinkReading>), fetch::Error> {
    if config.use_mock_data {
        let usgs_rows = fetch::load_snapshot(&config.data_store, usgs_fetch::SNAPSHOT_FILE)?;
        let hobolink_rows =
            fetch::load_snapshot(&config.data_store, hobolink_fetch::SNAPSHOT_FILE)?;
        return Ok((usgs_rows, hobolink_rows));
    }
    let client = reqwest::blocking::Client::new();
    let usgs_rows = usgs_fetch::get_live_data(&client, config, USGS_DAYS_AGO)?;
    let hobolink_rows = hobolink_fetch::get_live_data(&client, config)?;
    Ok((usgs_rows, hobolink_rows))
}

/// Runs one refresh cycle. Both fetches complete before the first write, so
/// an upstream failure aborts the job with nothing persisted. The four
/// replacements are not wrapped in a single transaction, matching the system
/// this one replaces; a reader racing a refresh can observe some tables
/// already replaced and others not yet.
pub(crate) fn update_database(
    conn: &PgConnection,
    config: &Config,
    model: &dyn Model,
) -> Result<(), Error> {
    let (usgs_rows, hobolink_rows) = fetch_source_data(config)?;
    let processed = processor::process(&hobolink_rows, &usgs_rows);
    let outputs = model.predict(&processed);
    log::info!(
        "refreshing database: {} usgs rows, {} hobolink rows, {} processed rows",
        usgs_rows.len(),
        hobolink_rows.len(),
        processed.len()
    );

    diesel::delete(usgs::dsl::usgs).execute(conn)?;
    for chunk in usgs_rows.chunks(INSERT_CHUNK) {
        diesel::insert_into(usgs::dsl::usgs)
            .values(chunk)
            .execute(conn)?;
    }

    diesel::delete(hobolink::dsl::hobolink).execute(conn)?;
    for chunk in hobolink_rows.chunks(INSERT_CHUNK) {
        diesel::insert_into(hobolink::dsl::hobolink)
            .values(chunk)
            .execute(conn)?;
    }

    diesel::delete(processed_data::dsl::processed_data).execute(conn)?;
    for chunk in processed.chunks(INSERT_CHUNK) {
        diesel::insert_into(processed_data::dsl::processed_data)
            .values(chunk)
            .execute(conn)?;
    }

    diesel::delete(model_outputs::dsl::model_outputs).execute(conn)?;
    for chunk in outputs.chunks(INSERT_CHUNK) {
        diesel::insert_into(model_outputs::dsl::model_outputs)
            .values(chunk)
            .execute(conn)?;
    }

    let now = Local::now().naive_local();
    let (flags, _) = assemble_flags(conn, now)?;
    log::info!("{}", compose_status(&flags, now));

    Ok(())
}

/// Most recent timestamp in the processed data, if any.
pub(crate) fn latest_time(conn: &PgConnection) -> Result<Option<NaiveDateTime>, Error> {
    use processed_data::dsl;
    dsl::processed_data
        .select(diesel::dsl::max(dsl::time))
        .first(conn)
        .map_err(Into::into)
}

/// `POST /admin/update_db`: runs one refresh cycle from the web process.
pub(crate) async fn update_db(
    req: HttpRequest,
    pool: Data<Pool>,
    config: Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    if let Some(challenge) = auth::check_basic_auth(&req, &config) {
        return Ok(challenge);
    }
    let refresh_result: Result<(), Error> = pool.get().map_err(Into::into).and_then(|conn| {
        update_database(&conn, &config, &crate::model::ReachModel)
    });

    match refresh_result {
        Ok(()) => Ok(HttpResponse::Ok().into()),
        Err(e) => Ok(build_http_500_response(&e)),
    }
}
