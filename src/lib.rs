#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod app;
mod auth;
mod database;
mod fetch;
mod model;
mod processor;
mod server;

use log::error;

pub fn log_error(err: &dyn std::error::Error) {
    error!("{}", err);
    let mut cause = err.source();
    while let Some(err) = cause {
        error!("\tcaused by: {}", err);
        cause = err.source();
    }
}
