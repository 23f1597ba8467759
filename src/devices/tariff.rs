//! Time-of-use tariff schedule: rate classes and on-peak windows.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::Deserialize;

/// Prices attached to one rate class, all in dollars per kWh.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateClass {
    /// Price paid for imported energy.
    pub purchase_per_kwh: f64,
    /// Credit earned for exported energy.
    pub generation_credit_per_kwh: f64,
    /// Maximum banked credit that may be applied per imported kWh.
    pub creditable_per_kwh: f64,
}

impl RateClass {
    /// A class where every price equals `per_kwh`.
    pub fn flat(per_kwh: f64) -> Self {
        Self {
            purchase_per_kwh: per_kwh,
            generation_credit_per_kwh: per_kwh,
            creditable_per_kwh: per_kwh,
        }
    }

    /// Credit-offset rate, never above the purchase rate.
    pub fn effective_creditable_per_kwh(&self) -> f64 {
        self.creditable_per_kwh.min(self.purchase_per_kwh).max(0.0)
    }
}

/// Rates and on-peak window for one kind of day (weekday or weekend).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DayTariff {
    /// Start of the on-peak window (inclusive).
    pub on_peak_start: NaiveTime,
    /// End of the on-peak window (exclusive).
    pub on_peak_end: NaiveTime,
    pub on_peak: RateClass,
    pub off_peak: RateClass,
}

impl DayTariff {
    /// Returns `true` if `time` falls within `[on_peak_start, on_peak_end)`.
    ///
    /// An empty window (`start == end`) is never on-peak; a window with
    /// `start > end` wraps past midnight.
    pub fn is_on_peak(&self, time: NaiveTime) -> bool {
        let (start, end) = (self.on_peak_start, self.on_peak_end);
        if start <= end {
            start <= time && time < end
        } else {
            time >= start || time < end
        }
    }
}

/// Where a timestamp falls in the tariff calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TariffPeriod {
    pub weekend: bool,
    pub on_peak: bool,
}

/// Immutable weekday/weekend × on-peak/off-peak rate schedule.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TariffSchedule {
    pub weekday: DayTariff,
    pub weekend: DayTariff,
}

impl TariffSchedule {
    /// A schedule charging and crediting `per_kwh` around the clock.
    pub fn flat(per_kwh: f64) -> Self {
        let day = DayTariff {
            on_peak_start: NaiveTime::MIN,
            on_peak_end: NaiveTime::MIN,
            on_peak: RateClass::flat(per_kwh),
            off_peak: RateClass::flat(per_kwh),
        };
        Self {
            weekday: day,
            weekend: day,
        }
    }

    /// Classifies `timestamp` as weekend/weekday and on/off-peak.
    pub fn period(&self, timestamp: NaiveDateTime) -> TariffPeriod {
        let weekend = matches!(timestamp.weekday(), Weekday::Sat | Weekday::Sun);
        let day = if weekend { &self.weekend } else { &self.weekday };
        TariffPeriod {
            weekend,
            on_peak: day.is_on_peak(timestamp.time()),
        }
    }

    /// Rate class in force at `timestamp`.
    pub fn rate(&self, timestamp: NaiveDateTime) -> &RateClass {
        let period = self.period(timestamp);
        let day = if period.weekend {
            &self.weekend
        } else {
            &self.weekday
        };
        if period.on_peak {
            &day.on_peak
        } else {
            &day.off_peak
        }
    }
}

impl Default for TariffSchedule {
    /// Net-metering tariff with a 15:00 to 19:00 weekday peak and no weekend peak.
    fn default() -> Self {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        Self {
            weekday: DayTariff {
                on_peak_start: hm(15, 0),
                on_peak_end: hm(19, 0),
                on_peak: RateClass {
                    purchase_per_kwh: 0.19374,
                    generation_credit_per_kwh: 0.10467,
                    creditable_per_kwh: 0.19374,
                },
                off_peak: RateClass {
                    purchase_per_kwh: 0.17885,
                    generation_credit_per_kwh: 0.08978,
                    creditable_per_kwh: 0.17885,
                },
            },
            weekend: DayTariff {
                on_peak_start: hm(0, 0),
                on_peak_end: hm(0, 0),
                on_peak: RateClass {
                    purchase_per_kwh: 0.17885,
                    generation_credit_per_kwh: 0.08978,
                    creditable_per_kwh: 0.17885,
                },
                off_peak: RateClass {
                    purchase_per_kwh: 0.17885,
                    generation_credit_per_kwh: 0.08978,
                    creditable_per_kwh: 0.17885,
                },
            },
        }
    }
}
