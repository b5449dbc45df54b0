//! Client for the USGS instantaneous values service, which reports stream
//! flow and gage height for the Waltham gauge.
//!
//! Web interface (not the API): https://waterdata.usgs.gov/nwis/uv?site_no=01104500

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::Error;
use crate::app::Config;
use crate::database::schema::usgs;

const USGS_URL: &str = "https://waterdata.usgs.gov/nwis/uv";

pub(crate) const SNAPSHOT_FILE: &str = "usgs.json";

/// One sample from the stream gauge. Flow is in cubic feet per second,
/// height in feet.
#[derive(Clone, Debug, Deserialize, Insertable, Queryable, Serialize)]
#[table_name = "usgs"]
pub(crate) struct UsgsReading {
    pub(crate) time: NaiveDateTime,
    pub(crate) stream_flow: f64,
    pub(crate) gage_height: f64,
}

/// Requests the last `days_ago` days of gauge data and parses the response.
pub(crate) fn get_live_data(
    client: &reqwest::blocking::Client,
    config: &Config,
    days_ago: i64,
) -> Result<Vec<UsgsReading>, Error> {
    let end_date = Local::now().naive_local().date();
    let begin_date = end_date - Duration::days(days_ago);
    let res = client
        .get(USGS_URL)
        .query(&[
            ("cb_00060", "on"),
            ("cb_00065", "on"),
            ("format", "rdb"),
            ("site_no", config.usgs_site_no.as_str()),
            ("begin_date", begin_date.to_string().as_str()),
            ("end_date", end_date.to_string().as_str()),
        ])
        .send()?;
    let res = super::check_status("USGS", res)?;
    parse_rdb(&res.text()?)
}

/// Parses the USGS RDB format: `#` comment lines, then a tab-separated
/// header row, then a column-format row, then the data. The flow and height
/// columns carry a site-specific numeric prefix, so they are located by
/// their parameter-code suffix. Rows with non-numeric values (e.g. the
/// "Ice" and "Eqp" status codes) are dropped.
pub(crate) fn parse_rdb(text: &str) -> Result<Vec<UsgsReading>, Error> {
    let mut lines = text
        .lines()
        .filter(|line| !line.starts_with('#') && !line.is_empty());

    let header = lines
        .next()
        .ok_or_else(|| Error::Parse("USGS", "empty response".to_string()))?;
    let columns: Vec<&str> = header.split('\t').collect();
    let time_idx = column_index(&columns, "datetime")?;
    let flow_idx = suffix_index(&columns, "_00060")?;
    let height_idx = suffix_index(&columns, "_00065")?;

    // The second non-comment row describes column widths, not data.
    let readings = lines
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let time = NaiveDateTime::parse_from_str(fields.get(time_idx)?, "%Y-%m-%d %H:%M").ok()?;
            let stream_flow = fields.get(flow_idx)?.parse::<f64>().ok()?;
            let gage_height = fields.get(height_idx)?.parse::<f64>().ok()?;
            Some(UsgsReading {
                time,
                stream_flow,
                gage_height,
            })
        })
        .collect();
    Ok(readings)
}

fn column_index(columns: &[&str], name: &str) -> Result<usize, Error> {
    columns
        .iter()
        .position(|c| *c == name)
        .ok_or_else(|| Error::Parse("USGS", format!("missing column: {}", name)))
}

fn suffix_index(columns: &[&str], suffix: &str) -> Result<usize, Error> {
    columns
        .iter()
        .position(|c| c.ends_with(suffix))
        .ok_or_else(|| Error::Parse("USGS", format!("missing column ending with: {}", suffix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Data provided for site 01104500
# Some more commentary from the USGS.
agency_cd\tsite_no\tdatetime\ttz_cd\t66190_00060\t66190_00060_cd\t66191_00065\t66191_00065_cd
5s\t15s\t20d\t6s\t14n\t10s\t14n\t10s
USGS\t01104500\t2020-06-13 10:00\tEDT\t135\tP\t2.31\tP
USGS\t01104500\t2020-06-13 10:15\tEDT\t139\tP\t2.32\tP
USGS\t01104500\t2020-06-13 10:30\tEDT\tIce\tP\t2.33\tP
";

    #[test]
    fn parses_data_rows_and_drops_status_codes() {
        let readings = parse_rdb(SAMPLE).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].stream_flow, 135.0);
        assert_eq!(readings[0].gage_height, 2.31);
        assert_eq!(
            readings[1].time,
            NaiveDateTime::parse_from_str("2020-06-13 10:15", "%Y-%m-%d %H:%M").unwrap()
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        let text = "a\tb\n1\t2\n3\t4\n";
        assert!(parse_rdb(text).is_err());
    }

    #[test]
    fn empty_response_is_an_error() {
        assert!(parse_rdb("# only comments\n").is_err());
    }
}
