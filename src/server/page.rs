//! HTML pages: homepage, embeddable flag iframe, about, raw model-output
//! tables, and the API landing page. Handlers only assemble persisted state;
//! nothing here recomputes the model.

use actix_web::{
    http,
    web::{Data, Query},
    HttpResponse,
};
use chrono::{Duration, Local, NaiveDateTime};

use crate::app::Config;
use crate::database::{
    assemble_flags, build_http_500_response, clamp_hours, filter_reach, latest_model_outputs,
    latest_time, BoathouseFlag, Error, ModelOutputQuery, Pool, ALL_REACHES, DEFAULT_HOURS,
};
use crate::model::ModelOutput;

const STALENESS_LIMIT_HOURS: i64 = 48;

/// The database has not refreshed for two days or more.
pub(crate) fn is_stale(latest: NaiveDateTime, now: NaiveDateTime) -> bool {
    now - latest >= Duration::hours(STALENESS_LIMIT_HOURS)
}

/// Banner notes shown at the top of every HTML page. The iframe gets a
/// shorter off-season message because it suppresses the flags entirely.
pub(crate) fn page_notes(
    latest: Option<NaiveDateTime>,
    now: NaiveDateTime,
    boating_season: bool,
    iframe: bool,
) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(latest) = latest {
        if is_stale(latest, now) {
            notes.push(
                "<b>Note:</b> The database has not updated in at least 48 hours. \
                 The information displayed on this page may be outdated."
                    .to_string(),
            );
        }
    }
    if !boating_season {
        let mut msg = "<b>Note:</b> It is currently not boating season. ".to_string();
        if iframe {
            msg.push_str(
                "We do not display flags when it is not boating season. \
                 We hope to see you again this spring!",
            );
        } else {
            msg.push_str(
                "We may update our database and our predictive model while it is not \
                 boating season, but these model outputs are not intended to be used to \
                 make decisions regarding recreational activities along the river.",
            );
        }
        notes.push(msg);
    }
    notes
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn flag_cell(safe: bool) -> &'static str {
    if safe {
        "<span class=\"blue-flag\">Safe</span>"
    } else {
        "<span class=\"red-flag\">Unsafe</span>"
    }
}

fn render_page(title: &str, notes: &[String], body: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    html.push_str("<link rel=\"stylesheet\" href=\"/static/style.css\">\n");
    html.push_str("</head>\n<body>\n");
    for note in notes {
        html.push_str(&format!("<div class=\"note\">{}</div>\n", note));
    }
    html.push_str(body);
    html.push_str("\n</body>\n</html>\n");
    html
}

fn html_response(page: String) -> HttpResponse {
    HttpResponse::Ok()
        .header(http::header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(page)
}

fn flag_table(flags: &[BoathouseFlag]) -> String {
    let mut table = String::from(
        "<table class=\"flags\">\n<tr><th>Boathouse</th><th>Flag</th></tr>\n",
    );
    for flag in flags {
        table.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(&flag.boathouse),
            flag_cell(flag.safe)
        ));
    }
    table.push_str("</table>\n");
    table
}

fn last_updated(latest: Option<NaiveDateTime>) -> String {
    match latest {
        Some(latest) => format!("<p>Model last updated: {}</p>\n", latest),
        None => "<p>No model outputs are available yet.</p>\n".to_string(),
    }
}

pub(crate) async fn index(
    pool: Data<Pool>,
    config: Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let now = Local::now().naive_local();
    let query_result = pool
        .get()
        .map_err(Error::from)
        .and_then(|conn| assemble_flags(&conn, now));

    match query_result {
        Ok((flags, latest)) => {
            let mut body = String::from(
                "<h1>Is it safe to boat on the river?</h1>\n\
                 <p>Flags below come from our predictive safety model, updated several \
                 times a day from stream-gauge and weather-station data, and from \
                 manually reported advisories.</p>\n",
            );
            body.push_str(&flag_table(&flags));
            body.push_str(&last_updated(latest));
            let notes = page_notes(latest, now, config.boating_season, false);
            Ok(html_response(render_page("River flags", &notes, &body)))
        }
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

pub(crate) async fn flags(
    pool: Data<Pool>,
    config: Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let now = Local::now().naive_local();
    let query_result = pool
        .get()
        .map_err(Error::from)
        .and_then(|conn| assemble_flags(&conn, now));

    match query_result {
        Ok((flags, latest)) => {
            let notes = page_notes(latest, now, config.boating_season, true);
            // Off-season the iframe shows the notes alone.
            let body = if config.boating_season {
                let mut body = flag_table(&flags);
                body.push_str(&last_updated(latest));
                body
            } else {
                String::new()
            };
            Ok(html_response(render_page("Flags", &notes, &body)))
        }
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

pub(crate) async fn about(
    pool: Data<Pool>,
    config: Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let now = Local::now().naive_local();
    let query_result = pool
        .get()
        .map_err(Error::from)
        .and_then(|conn| latest_time(&conn));

    match query_result {
        Ok(latest) => {
            let body = "<h1>About</h1>\n\
                <p>This site publishes a per-boathouse safety flag for the river. The flag \
                combines a predictive model of water quality, driven by live stream-gauge and \
                weather-station data, with manually entered advisories for events the model \
                cannot see, such as reported sewage discharges or cyanobacteria blooms.</p>\n\
                <p>A blue flag means our model considers the water safe for boating; a red \
                flag means it does not. Flags are informational and are only shown during \
                boating season.</p>\n";
            let notes = page_notes(latest, now, config.boating_season, false);
            Ok(html_response(render_page("About", &notes, body)))
        }
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

fn output_model_tables(outputs: &[ModelOutput]) -> String {
    let mut body = String::new();
    let mut current_reach = None;
    for output in outputs {
        if current_reach != Some(output.reach) {
            if current_reach.is_some() {
                body.push_str("</table>\n");
            }
            current_reach = Some(output.reach);
            body.push_str(&format!("<h2>Reach {}</h2>\n", output.reach));
            body.push_str(
                "<table class=\"model-outputs\">\n\
                 <tr><th>Time</th><th>Log Odds</th><th>Probability</th><th>Safe</th></tr>\n",
            );
        }
        body.push_str(&format!(
            "<tr><td>{}</td><td>{:.4}</td><td>{:.4}</td><td>{}</td></tr>\n",
            output.time, output.log_odds, output.probability, flag_cell(output.safe)
        ));
    }
    if current_reach.is_some() {
        body.push_str("</table>\n");
    }
    body
}

pub(crate) async fn output_model(
    pool: Data<Pool>,
    config: Data<Config>,
    query: Query<ModelOutputQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let hours = clamp_hours(query.hours.unwrap_or(DEFAULT_HOURS), config.api_max_hours);
    let reach = query.reach.unwrap_or(ALL_REACHES);
    let now = Local::now().naive_local();

    let query_result: Result<(Vec<ModelOutput>, Option<NaiveDateTime>), Error> =
        pool.get().map_err(Into::into).and_then(|conn| {
            let outputs = latest_model_outputs(&conn, hours)?;
            let latest = latest_time(&conn)?;
            Ok((filter_reach(outputs, reach), latest))
        });

    match query_result {
        Ok((outputs, latest)) => {
            let mut body = String::from("<h1>Model outputs</h1>\n");
            body.push_str(&output_model_tables(&outputs));
            let notes = page_notes(latest, now, config.boating_season, false);
            Ok(html_response(render_page("Model outputs", &notes, &body)))
        }
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

pub(crate) async fn api_index(
    pool: Data<Pool>,
    config: Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let now = Local::now().naive_local();
    let query_result = pool
        .get()
        .map_err(Error::from)
        .and_then(|conn| latest_time(&conn));

    match query_result {
        Ok(latest) => {
            let body = "<h1>API</h1>\n\
                <p>Read-only JSON endpoints:</p>\n\
                <ul>\n\
                <li><code>GET /api/v1/model?reach=&amp;hours=</code> — latest model outputs \
                per reach; <code>reach</code> defaults to all, <code>hours</code> is capped \
                by the server.</li>\n\
                <li><code>GET /api/v1/boathouses</code> — boathouse metadata.</li>\n\
                </ul>\n";
            let notes = page_notes(latest, now, config.boating_season, false);
            Ok(html_response(render_page("API", &notes, body)))
        }
        Err(e) => Ok(build_http_500_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn banner_appears_at_exactly_48_hours_not_before() {
        let latest = parse("2020-06-13 10:00");
        assert!(!is_stale(latest, parse("2020-06-15 09:59")));
        assert!(is_stale(latest, parse("2020-06-15 10:00")));
        assert!(is_stale(latest, parse("2020-06-20 10:00")));
    }

    #[test]
    fn fresh_data_in_season_shows_no_notes() {
        let latest = parse("2020-06-13 10:00");
        let notes = page_notes(Some(latest), parse("2020-06-13 12:00"), true, false);
        assert!(notes.is_empty());
    }

    #[test]
    fn off_season_message_differs_for_the_iframe() {
        let now = parse("2020-12-01 10:00");
        let page = page_notes(None, now, false, false);
        let iframe = page_notes(None, now, false, true);
        assert_eq!(page.len(), 1);
        assert_eq!(iframe.len(), 1);
        assert_ne!(page[0], iframe[0]);
        assert!(iframe[0].contains("We do not display flags"));
    }

    #[test]
    fn stale_banner_shows_on_pages_without_a_flag_table() {
        // /about and /api reuse the same notes as the flag pages, so stale
        // data must surface there too.
        let latest = parse("2020-06-01 10:00");
        let notes = page_notes(Some(latest), parse("2020-06-10 10:00"), true, false);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("has not updated in at least 48 hours"));
    }

    #[test]
    fn stale_and_off_season_notes_stack() {
        let latest = parse("2020-06-01 10:00");
        let notes = page_notes(Some(latest), parse("2020-06-10 10:00"), false, false);
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn missing_data_never_reports_stale() {
        let notes = page_notes(None, parse("2020-06-13 10:00"), true, false);
        assert!(notes.is_empty());
    }

    #[test]
    fn boathouse_names_are_escaped() {
        assert_eq!(escape("A & B <Boat>"), "A &amp; B &lt;Boat&gt;");
    }
}
