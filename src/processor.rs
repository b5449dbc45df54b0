//! Turns the two raw time series into model-ready rows. Pure and
//! deterministic: the same inputs always produce the same output sequence.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::database::schema::processed_data;
use crate::fetch::hobolink::HobolinkReading;
use crate::fetch::usgs::UsgsReading;

/// River reaches covered by the predictive models.
pub(crate) const MODELED_REACHES: [i32; 4] = [2, 3, 4, 5];

#[derive(Clone, Debug, Insertable, Queryable, Serialize)]
#[table_name = "processed_data"]
pub(crate) struct ProcessedRow {
    pub(crate) reach: i32,
    pub(crate) time: NaiveDateTime,
    pub(crate) rain_0_to_24h_sum: f64,
    pub(crate) rain_0_to_48h_sum: f64,
    pub(crate) rain_0_to_72h_sum: f64,
    pub(crate) stream_flow: f64,
    pub(crate) gage_height: f64,
    pub(crate) par: f64,
    pub(crate) water_temp: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct HourlyWeather {
    par: f64,
    rain: f64,
    water_temp: f64,
    samples: u32,
}

#[derive(Clone, Copy, Debug, Default)]
struct HourlyGauge {
    stream_flow: f64,
    gage_height: f64,
    samples: u32,
}

/// Merges the weather-station and stream-gauge series into per-reach feature
/// rows. Both series are bucketed to the hour (rain summed, everything else
/// averaged), inner-joined on the hour so timestamps missing either input are
/// discarded, and rolling rain sums computed over the trailing 24/48/72
/// hours of the joined sequence.
pub(crate) fn process(
    hobolink: &[HobolinkReading],
    usgs: &[UsgsReading],
) -> Vec<ProcessedRow> {
    let mut weather: BTreeMap<NaiveDateTime, HourlyWeather> = BTreeMap::new();
    for reading in hobolink {
        let bucket = weather.entry(hour_bucket(reading.time)).or_default();
        bucket.par += reading.par;
        bucket.rain += reading.rain;
        bucket.water_temp += reading.water_temp;
        bucket.samples += 1;
    }

    let mut gauge: BTreeMap<NaiveDateTime, HourlyGauge> = BTreeMap::new();
    for reading in usgs {
        let bucket = gauge.entry(hour_bucket(reading.time)).or_default();
        bucket.stream_flow += reading.stream_flow;
        bucket.gage_height += reading.gage_height;
        bucket.samples += 1;
    }

    // Joined hourly sequence, oldest first. BTreeMap iteration keeps the
    // output order deterministic.
    let joined: Vec<(NaiveDateTime, &HourlyWeather, &HourlyGauge)> = weather
        .iter()
        .filter_map(|(time, w)| gauge.get(time).map(|g| (*time, w, g)))
        .collect();

    let mut rows = Vec::with_capacity(joined.len() * MODELED_REACHES.len());
    for (i, (time, w, g)) in joined.iter().enumerate() {
        let rain_sum = |hours: i64| -> f64 {
            let window_start = *time - Duration::hours(hours);
            joined[..=i]
                .iter()
                .rev()
                .take_while(|(t, _, _)| *t > window_start)
                .map(|(_, w, _)| w.rain)
                .sum()
        };
        let samples = f64::from(w.samples);
        for &reach in &MODELED_REACHES {
            rows.push(ProcessedRow {
                reach,
                time: *time,
                rain_0_to_24h_sum: rain_sum(24),
                rain_0_to_48h_sum: rain_sum(48),
                rain_0_to_72h_sum: rain_sum(72),
                stream_flow: g.stream_flow / f64::from(g.samples),
                gage_height: g.gage_height / f64::from(g.samples),
                par: w.par / samples,
                water_temp: w.water_temp / samples,
            });
        }
    }
    rows
}

fn hour_bucket(time: NaiveDateTime) -> NaiveDateTime {
    time.date()
        .and_hms_opt(time.hour(), 0, 0)
        .unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_at(time: &str, rain: f64) -> HobolinkReading {
        HobolinkReading {
            time: parse(time),
            pressure: 14.7,
            par: 1000.0,
            rain,
            rh: 60.0,
            dew_point: 55.0,
            wind_speed: 3.0,
            gust_speed: 5.0,
            wind_dir: 180.0,
            water_temp: 70.0,
            air_temp: 75.0,
        }
    }

    fn gauge_at(time: &str, stream_flow: f64) -> UsgsReading {
        UsgsReading {
            time: parse(time),
            stream_flow,
            gage_height: 2.3,
        }
    }

    fn parse(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn unmatched_timestamps_are_discarded() {
        let hobolink = vec![
            weather_at("2020-06-13 10:00", 0.0),
            weather_at("2020-06-13 11:00", 0.0),
        ];
        let usgs = vec![gauge_at("2020-06-13 10:00", 100.0)];
        let rows = process(&hobolink, &usgs);
        assert_eq!(rows.len(), MODELED_REACHES.len());
        assert!(rows.iter().all(|r| r.time == parse("2020-06-13 10:00")));
    }

    #[test]
    fn one_row_per_reach_per_timestamp() {
        let hobolink = vec![weather_at("2020-06-13 10:00", 0.1)];
        let usgs = vec![gauge_at("2020-06-13 10:00", 100.0)];
        let rows = process(&hobolink, &usgs);
        let mut reaches: Vec<i32> = rows.iter().map(|r| r.reach).collect();
        reaches.sort_unstable();
        assert_eq!(reaches, vec![2, 3, 4, 5]);
    }

    #[test]
    fn samples_within_an_hour_are_combined() {
        let hobolink = vec![
            weather_at("2020-06-13 10:00", 0.1),
            weather_at("2020-06-13 10:30", 0.3),
        ];
        let usgs = vec![
            gauge_at("2020-06-13 10:00", 100.0),
            gauge_at("2020-06-13 10:15", 140.0),
        ];
        let rows = process(&hobolink, &usgs);
        // Rain accumulates within the hour; flow is averaged.
        assert!((rows[0].rain_0_to_24h_sum - 0.4).abs() < 1e-9);
        assert!((rows[0].stream_flow - 120.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_rain_windows_look_back_not_forward() {
        let hobolink = vec![
            weather_at("2020-06-11 10:00", 1.0),
            weather_at("2020-06-12 10:00", 0.5),
            weather_at("2020-06-13 10:00", 0.25),
        ];
        let usgs = vec![
            gauge_at("2020-06-11 10:00", 100.0),
            gauge_at("2020-06-12 10:00", 100.0),
            gauge_at("2020-06-13 10:00", 100.0),
        ];
        let rows = process(&hobolink, &usgs);
        let last = rows.iter().rev().find(|r| r.reach == 2).unwrap();
        assert!((last.rain_0_to_24h_sum - 0.25).abs() < 1e-9);
        assert!((last.rain_0_to_48h_sum - 0.75).abs() < 1e-9);
        assert!((last.rain_0_to_72h_sum - 1.75).abs() < 1e-9);
        let first = rows.iter().find(|r| r.reach == 2).unwrap();
        assert!((first.rain_0_to_72h_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn process_is_deterministic() {
        let hobolink = vec![
            weather_at("2020-06-13 10:00", 0.1),
            weather_at("2020-06-13 11:00", 0.2),
        ];
        let usgs = vec![
            gauge_at("2020-06-13 10:00", 100.0),
            gauge_at("2020-06-13 11:00", 110.0),
        ];
        let first = process(&hobolink, &usgs);
        let second = process(&hobolink, &usgs);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.reach, b.reach);
            assert_eq!(a.time, b.time);
            assert_eq!(a.rain_0_to_48h_sum, b.rain_0_to_48h_sum);
            assert_eq!(a.stream_flow, b.stream_flow);
        }
    }
}
