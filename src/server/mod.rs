use actix_files::Files;
use actix_web::{dev::Server, middleware, App, HttpServer};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::io;
use thiserror::Error;

use crate::app::Config;

mod page;
mod route;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not bind server address: {0}")]
    Bind(io::Error),
    #[error("could not connect to database: {0}")]
    DatabaseConnection(r2d2::Error),
    #[error("could not initialize/migrate database: {0}")]
    DatabaseMigration(diesel_migrations::RunMigrationsError),
    #[error("could not create a database connection pool: {0}")]
    PoolInitialization(r2d2::Error),
}

embed_migrations!();

pub fn run(config: &Config) -> Result<Server, Error> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::new(manager).map_err(Error::PoolInitialization)?;
    let conn = pool.get().map_err(Error::DatabaseConnection)?;
    embedded_migrations::run(&conn).map_err(Error::DatabaseMigration)?;

    log::info!(
        "serving on {} (boating season: {}, mock data: {}, API hour cap: {})",
        config.bind_addr,
        config.boating_season,
        config.use_mock_data,
        config.api_max_hours
    );

    let bind_addr = config.bind_addr;
    let config = config.clone();
    let server = HttpServer::new(move || {
        App::new()
            .data(pool.clone())
            .data(config.clone())
            .configure(route::init_app)
            .service(Files::new("/static", config.static_dir.as_str()))
            .wrap(middleware::Logger::default())
    })
    .bind(bind_addr)
    .map_err(Error::Bind)?
    .run();
    Ok(server)
}
