use actix_web::{http, HttpResponse};
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use serde_json::json;
use thiserror::Error;

mod boathouse;
mod manual_override;
mod model_output;
mod refresh;
pub(crate) mod schema;

pub(crate) use self::boathouse::*;
pub(crate) use self::manual_override::*;
pub(crate) use self::model_output::*;
pub(crate) use self::refresh::*;

pub(crate) type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("query error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("connection error: {0}")]
    R2D2(#[from] r2d2::Error),
    #[error("upstream fetch error: {0}")]
    Fetch(#[from] crate::fetch::Error),
}

pub(crate) fn build_err_msg(err: &dyn std::error::Error) -> String {
    log::error!("{}", err);
    let mut err_msg = err.to_string();
    let mut cause = err.source();
    while let Some(err) = cause {
        log::error!("\tcaused by: {}", err);
        err_msg.push_str(&format!("\n\tcaused by: {}", err));
        cause = err.source();
    }

    json!({ "message": err_msg }).to_string()
}

pub(crate) fn build_http_500_response(err: &dyn std::error::Error) -> HttpResponse {
    HttpResponse::InternalServerError()
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(build_err_msg(err))
}

pub(crate) fn build_http_400_response(message: &str) -> HttpResponse {
    HttpResponse::BadRequest()
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(json!({ "message": message }).to_string())
}
