//! Turnstile hardware model.
//!
//! Estimates how many riders pass a station's turnstiles during a window of
//! simulated time, from the station's average daily ridership and the share
//! of daily traffic that falls in each hour of the day.

use crate::station::{Ridership, Station};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::Chicago;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Share of a day's entries per local hour, midnight first. Sums to 1.
pub const HOURLY_CURVE: [f64; 24] = [
    0.004, 0.002, 0.002, 0.002, 0.006, 0.021, 0.052, 0.094, 0.098, 0.058, 0.041, 0.040, 0.044,
    0.043, 0.045, 0.053, 0.072, 0.094, 0.081, 0.052, 0.035, 0.026, 0.020, 0.015,
];

/// Maximum relative deviation applied to each estimate.
const JITTER: f64 = 0.1;

/// Computes entry counts for a window of simulated time.
pub trait EntryCounter: Send {
    fn get_entries(&mut self, timestamp: DateTime<Utc>, time_step: Duration) -> u64;
}

pub struct TurnstileHardware {
    ridership: Ridership,
    rng: StdRng,
}

impl TurnstileHardware {
    /// Model a station's turnstiles. `seed` is mixed with the station id so
    /// stations sharing a seed still diverge.
    pub fn new(station: &Station, seed: u64) -> Self {
        Self {
            ridership: station.ridership,
            rng: StdRng::seed_from_u64(seed ^ station.station_id as u64),
        }
    }

    /// Expected entries for the window, before jitter.
    pub fn expected_entries(&self, timestamp: DateTime<Utc>, time_step: Duration) -> f64 {
        let local = timestamp.with_timezone(&Chicago);
        let daily = match local.weekday() {
            Weekday::Sat => self.ridership.saturday,
            Weekday::Sun => self.ridership.sunday,
            _ => self.ridership.weekday,
        };
        let hourly = f64::from(daily) * HOURLY_CURVE[local.hour() as usize];
        hourly * time_step.as_secs_f64() / 3600.0
    }
}

impl EntryCounter for TurnstileHardware {
    fn get_entries(&mut self, timestamp: DateTime<Utc>, time_step: Duration) -> u64 {
        let expected = self.expected_entries(timestamp, time_step);
        let factor = self.rng.random_range((1.0 - JITTER)..=(1.0 + JITTER));
        (expected * factor).round().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::Line;
    use chrono::TimeZone;

    fn station() -> Station {
        Station {
            station_id: 40820,
            name: "Clark/Lake".to_string(),
            line: Line::Blue,
            ridership: Ridership {
                weekday: 24000,
                saturday: 12000,
                sunday: 6000,
            },
        }
    }

    fn chicago(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Chicago
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_curve_sums_to_one() {
        let total: f64 = HOURLY_CURVE.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_entries_weekday_rush_hour() {
        let hardware = TurnstileHardware::new(&station(), 42);
        // Wednesday 8am, one hour window
        let expected =
            hardware.expected_entries(chicago(2024, 5, 15, 8), Duration::from_secs(3600));
        assert!((expected - 24000.0 * 0.098).abs() < 1e-6);
    }

    #[test]
    fn test_expected_entries_scales_with_step() {
        let hardware = TurnstileHardware::new(&station(), 42);
        let ts = chicago(2024, 5, 15, 8);
        let hour = hardware.expected_entries(ts, Duration::from_secs(3600));
        let five_minutes = hardware.expected_entries(ts, Duration::from_secs(300));
        assert!((hour / 12.0 - five_minutes).abs() < 1e-6);
    }

    #[test]
    fn test_weekend_uses_weekend_ridership() {
        let hardware = TurnstileHardware::new(&station(), 42);
        let step = Duration::from_secs(3600);
        let saturday = hardware.expected_entries(chicago(2024, 5, 18, 12), step);
        let sunday = hardware.expected_entries(chicago(2024, 5, 19, 12), step);
        assert!((saturday - 12000.0 * 0.044).abs() < 1e-6);
        assert!((sunday - 6000.0 * 0.044).abs() < 1e-6);
    }

    #[test]
    fn test_entries_within_jitter_bounds() {
        let mut hardware = TurnstileHardware::new(&station(), 7);
        let ts = chicago(2024, 5, 15, 17);
        let step = Duration::from_secs(300);
        let expected = hardware.expected_entries(ts, step);

        for _ in 0..100 {
            let entries = hardware.get_entries(ts, step) as f64;
            assert!(entries >= (expected * (1.0 - JITTER)).floor());
            assert!(entries <= (expected * (1.0 + JITTER)).ceil());
        }
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let ts = chicago(2024, 5, 15, 17);
        let step = Duration::from_secs(300);
        let mut a = TurnstileHardware::new(&station(), 99);
        let mut b = TurnstileHardware::new(&station(), 99);
        for _ in 0..10 {
            assert_eq!(a.get_entries(ts, step), b.get_entries(ts, step));
        }
    }

    #[test]
    fn test_zero_step_yields_no_entries() {
        let mut hardware = TurnstileHardware::new(&station(), 1);
        assert_eq!(hardware.get_entries(chicago(2024, 5, 15, 8), Duration::ZERO), 0);
    }
}
