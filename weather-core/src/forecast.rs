//! Views over a 3-hour forecast series: one representative reading per day
//! and the next 24 hours.

use chrono::{Local, NaiveDate, TimeZone, Timelike};

use crate::model::ForecastItem;

/// Hour of day a daily representative should be closest to.
pub const REPRESENTATIVE_HOUR: i32 = 13;

/// Number of days the dashboard shows.
pub const DAILY_FORECAST_DAYS: usize = 5;

/// Number of 3-hour readings covering the next 24 hours.
pub const HOURLY_FORECAST_ITEMS: usize = 8;

/// One reading per local calendar date, in first-seen date order.
pub fn daily_forecast(items: &[ForecastItem]) -> Vec<ForecastItem> {
    daily_forecast_in(items, &Local)
}

/// Same as [`daily_forecast`], with dates and hours taken in `tz`.
///
/// For each date the kept reading is the one whose hour is closest to 13:00;
/// on a tie the reading seen first stays.
pub fn daily_forecast_in<Tz: TimeZone>(items: &[ForecastItem], tz: &Tz) -> Vec<ForecastItem> {
    let mut days: Vec<(NaiveDate, &ForecastItem)> = Vec::new();

    for item in items {
        let local = item.dt.with_timezone(tz);
        let date = local.date_naive();
        let distance = hour_distance(local.hour());

        match days.iter_mut().find(|(d, _)| *d == date) {
            Some((_, kept)) => {
                let kept_distance = hour_distance(kept.dt.with_timezone(tz).hour());
                if distance < kept_distance {
                    *kept = item;
                }
            }
            None => days.push((date, item)),
        }
    }

    days.into_iter().map(|(_, item)| item.clone()).collect()
}

/// Daily view truncated to the dashboard's day count.
pub fn five_day_forecast(items: &[ForecastItem]) -> Vec<ForecastItem> {
    let mut daily = daily_forecast(items);
    daily.truncate(DAILY_FORECAST_DAYS);
    daily
}

/// The first 24 hours of the series.
pub fn hourly_forecast(items: &[ForecastItem]) -> &[ForecastItem] {
    &items[..items.len().min(HOURLY_FORECAST_ITEMS)]
}

fn hour_distance(hour: u32) -> i32 {
    (hour as i32 - REPRESENTATIVE_HOUR).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Temperatures, WeatherCondition};
    use chrono::{DateTime, FixedOffset, Utc};

    fn item_at(dt: DateTime<Utc>, temp: f64) -> ForecastItem {
        ForecastItem {
            dt,
            temperature: Temperatures {
                current: temp,
                feels_like: temp,
                min: temp - 1.0,
                max: temp + 1.0,
            },
            precipitation_probability: 0.0,
            condition: WeatherCondition {
                code: 800,
                description: "clear sky".into(),
                icon: "01d".into(),
            },
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    /// `count` readings every 3 hours starting at `start`.
    fn series(start: DateTime<Utc>, count: usize) -> Vec<ForecastItem> {
        (0..count)
            .map(|i| item_at(start + chrono::Duration::hours(3 * i as i64), i as f64))
            .collect()
    }

    #[test]
    fn keeps_noon_reading_for_full_day() {
        let items = series(utc(2024, 6, 1, 0), 8);

        let daily = daily_forecast_in(&items, &Utc);

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].dt, utc(2024, 6, 1, 12));
    }

    #[test]
    fn tie_keeps_earlier_reading() {
        // 12:00 and 14:00 are both one hour from 13:00.
        let items = vec![item_at(utc(2024, 6, 1, 12), 1.0), item_at(utc(2024, 6, 1, 14), 2.0)];

        let daily = daily_forecast_in(&items, &Utc);

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].dt, utc(2024, 6, 1, 12));
    }

    #[test]
    fn later_reading_replaces_when_strictly_closer() {
        let items = vec![
            item_at(utc(2024, 6, 1, 9), 1.0),
            item_at(utc(2024, 6, 1, 15), 2.0),
            item_at(utc(2024, 6, 1, 13), 3.0),
        ];

        let daily = daily_forecast_in(&items, &Utc);

        assert_eq!(daily[0].dt, utc(2024, 6, 1, 13));
    }

    #[test]
    fn five_day_series_has_one_entry_per_date_in_order() {
        // 40 readings starting mid-day span six calendar dates.
        let items = series(utc(2024, 6, 1, 15), 40);

        let daily = daily_forecast_in(&items, &Utc);

        let dates: Vec<_> = daily.iter().map(|i| i.dt.date_naive()).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(dates, sorted);
        assert_eq!(dates.len(), 6);

        // First date only has 15:00..21:00; 15:00 is closest.
        assert_eq!(daily[0].dt, utc(2024, 6, 1, 15));
        for item in &daily[1..daily.len() - 1] {
            assert_eq!(item.dt.with_timezone(&Utc).hour(), 12);
        }
    }

    #[test]
    fn dates_follow_the_given_timezone() {
        // 22:00 UTC on June 1st is already June 2nd at UTC+3.
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        let items = vec![item_at(utc(2024, 6, 1, 9), 1.0), item_at(utc(2024, 6, 1, 21), 2.0)];

        assert_eq!(daily_forecast_in(&items, &Utc).len(), 1);

        let shifted = daily_forecast_in(&items, &plus_three);
        assert_eq!(shifted.len(), 2);
        assert_eq!(shifted[1].dt, utc(2024, 6, 1, 21));
    }

    #[test]
    fn short_series_is_not_padded() {
        let items = series(utc(2024, 6, 1, 0), 10);

        let daily = daily_forecast_in(&items, &Utc);

        assert_eq!(daily.len(), 2);
    }

    #[test]
    fn empty_series_yields_nothing() {
        assert!(daily_forecast(&[]).is_empty());
        assert!(hourly_forecast(&[]).is_empty());
    }

    #[test]
    fn five_day_view_truncates() {
        let items = series(utc(2024, 6, 1, 15), 40);
        assert!(five_day_forecast(&items).len() <= DAILY_FORECAST_DAYS);
    }

    #[test]
    fn hourly_view_takes_first_eight() {
        let items = series(utc(2024, 6, 1, 0), 40);

        let hourly = hourly_forecast(&items);

        assert_eq!(hourly.len(), HOURLY_FORECAST_ITEMS);
        assert_eq!(hourly[0].dt, items[0].dt);
        assert_eq!(hourly[7].dt, items[7].dt);
        assert_eq!(hourly_forecast(&items[..3]).len(), 3);
    }
}
