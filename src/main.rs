use clap::{App, Arg, SubCommand};
use flagging::{app, log_error};

#[actix_rt::main]
async fn main() {
    env_logger::init();
    let matches = App::new("flagging")
        .version(env!("CARGO_PKG_VERSION"))
        .about("River-safety flag dashboard")
        .subcommand(
            SubCommand::with_name("update-db")
                .about("Run one data refresh cycle against the database"),
        )
        .subcommand(
            SubCommand::with_name("refresh-data-store")
                .about("Re-fetch live data and write the offline snapshot files")
                .arg(
                    Arg::with_name("days")
                        .long("days")
                        .takes_value(true)
                        .default_value("5")
                        .help("How many days of gauge data to request"),
                ),
        )
        .get_matches();

    let result = match matches.subcommand() {
        ("update-db", _) => app::run_update_db(),
        ("refresh-data-store", Some(sub)) => {
            app::parse_days(sub.value_of("days").unwrap_or("5"))
                .and_then(app::refresh_data_store)
        }
        _ => app::serve().await,
    };

    if let Err(e) = result {
        log_error(e.as_ref());
        std::process::exit(1);
    }
}
