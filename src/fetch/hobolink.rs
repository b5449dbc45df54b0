//! Client for the HOBOlink web service, which exports readings from the
//! Charles River weather station as a text preamble followed by CSV.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Error;
use crate::app::Config;
use crate::database::schema::hobolink;

const HOBOLINK_URL: &str = "http://webservice.hobolink.com/restv2/data/custom/file";

/// Everything before this marker in the response is a YAML-ish preamble.
const TABLE_SEPARATOR: &str = "------------";

pub(crate) const SNAPSHOT_FILE: &str = "hobolink.json";

/// Export columns we keep, as (header prefix, renamed column) pairs. The
/// export sometimes returns multiple columns sharing a name prefix with the
/// real data spread across them, so matching is by prefix and the first
/// non-empty cell wins.
const COLUMNS: [(&str, &str); 11] = [
    ("Time, GMT-04:00", "time"),
    ("Pressure", "pressure"),
    ("PAR", "par"),
    ("Rain", "rain"),
    ("RH", "rh"),
    ("DewPt", "dew_point"),
    ("Wind Speed", "wind_speed"),
    ("Gust Speed", "gust_speed"),
    ("Wind Dir", "wind_dir"),
    ("Water Temp", "water_temp"),
    ("Temp", "air_temp"),
];

#[derive(Clone, Debug, Deserialize, Insertable, Queryable, Serialize)]
#[table_name = "hobolink"]
pub(crate) struct HobolinkReading {
    pub(crate) time: NaiveDateTime,
    pub(crate) pressure: f64,
    pub(crate) par: f64,
    pub(crate) rain: f64,
    pub(crate) rh: f64,
    pub(crate) dew_point: f64,
    pub(crate) wind_speed: f64,
    pub(crate) gust_speed: f64,
    pub(crate) wind_dir: f64,
    pub(crate) water_temp: f64,
    pub(crate) air_temp: f64,
}

/// Requests the configured export and parses the CSV part of the response.
pub(crate) fn get_live_data(
    client: &reqwest::blocking::Client,
    config: &Config,
) -> Result<Vec<HobolinkReading>, Error> {
    let body = json!({
        "query": config.hobolink_export,
        "authentication": {
            "user": config.hobolink_user,
            "password": config.hobolink_password,
            "token": config.hobolink_token,
        },
    });
    let res = client.post(HOBOLINK_URL).json(&body).send()?;
    let res = super::check_status("HOBOlink", res)?;
    parse_export(&res.text()?)
}

/// Parses the CSV table after the preamble separator. Rows that carry no
/// water temperature (the five-minute battery-status samples) are dropped,
/// as are rows with any unparsable measurement.
pub(crate) fn parse_export(text: &str) -> Result<Vec<HobolinkReading>, Error> {
    let start = text
        .find(TABLE_SEPARATOR)
        .ok_or_else(|| Error::Parse("HOBOlink", "missing table separator".to_string()))?;
    let table = &text[start + TABLE_SEPARATOR.len()..];

    let mut lines = table.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| Error::Parse("HOBOlink", "missing CSV header".to_string()))?;
    let header_cells = split_csv_line(header);

    // Per wanted column, every header index matching its prefix.
    let mut column_indexes = Vec::with_capacity(COLUMNS.len());
    for (prefix, renamed) in &COLUMNS {
        let indexes: Vec<usize> = header_cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.starts_with(prefix))
            .map(|(i, _)| i)
            .collect();
        if indexes.is_empty() {
            return Err(Error::Parse(
                "HOBOlink",
                format!("missing column: {}", renamed),
            ));
        }
        column_indexes.push(indexes);
    }

    let readings = lines
        .filter_map(|line| {
            let cells = split_csv_line(line);
            let mut values = column_indexes
                .iter()
                .map(|indexes| coalesce(&cells, indexes));
            let time = parse_time(values.next()??)?;
            let mut numbers = [0.0; 10];
            for slot in numbers.iter_mut() {
                *slot = values.next()??.parse::<f64>().ok()?;
            }
            Some(HobolinkReading {
                time,
                pressure: numbers[0],
                par: numbers[1],
                rain: numbers[2],
                rh: numbers[3],
                dew_point: numbers[4],
                wind_speed: numbers[5],
                gust_speed: numbers[6],
                wind_dir: numbers[7],
                water_temp: numbers[8],
                air_temp: numbers[9],
            })
        })
        .collect();
    Ok(readings)
}

/// First non-empty cell among the columns matching one prefix.
fn coalesce<'a>(cells: &'a [String], indexes: &[usize]) -> Option<&'a str> {
    indexes
        .iter()
        .filter_map(|&i| cells.get(i))
        .map(|cell| cell.as_str())
        .find(|cell| !cell.is_empty())
}

fn parse_time(cell: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(cell, "%m/%d/%y %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Splits one CSV line, honoring double-quoted cells. The export quotes any
/// header containing a comma; escaped quotes do not occur.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Export name: code_for_boston_export
Date range: ...
------------
\"Time, GMT-04:00\",\"Pressure, psi\",PAR,Rain,RH,DewPt,\"Wind Speed\",\"Gust Speed\",\"Wind Dir\",\"Water Temp\",Temp,\"Batt, V\"
06/13/20 10:00:00,14.68,1201.2,0.00,67.3,58.1,3.1,5.2,180.0,71.2,74.5,
06/13/20 10:05:00,,,,,,,,,,,3.9
06/13/20 10:10:00,14.67,1250.0,0.04,68.0,58.4,2.8,4.9,175.0,71.3,74.8,
";

    #[test]
    fn parses_rows_and_drops_battery_only_samples() {
        let readings = parse_export(SAMPLE).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].pressure, 14.68);
        assert_eq!(readings[0].water_temp, 71.2);
        assert_eq!(readings[0].air_temp, 74.5);
        assert_eq!(readings[1].rain, 0.04);
    }

    #[test]
    fn coalesces_duplicated_columns() {
        let text = "\
------------
\"Time, GMT-04:00\",Pressure,Pressure (2),PAR,Rain,RH,DewPt,\"Wind Speed\",\"Gust Speed\",\"Wind Dir\",\"Water Temp\",Temp
06/13/20 10:00:00,,14.70,1201.2,0.00,67.3,58.1,3.1,5.2,180.0,71.2,74.5
";
        let readings = parse_export(text).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].pressure, 14.70);
    }

    #[test]
    fn missing_separator_is_an_error() {
        assert!(parse_export("just,a,csv\n1,2,3\n").is_err());
    }

    #[test]
    fn quoted_cells_keep_embedded_commas() {
        let cells = split_csv_line("\"Time, GMT-04:00\",Rain,\"Batt, V\"");
        assert_eq!(cells, vec!["Time, GMT-04:00", "Rain", "Batt, V"]);
    }
}
