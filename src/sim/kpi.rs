//! Post-hoc KPI computation from simulation rows.

use std::fmt;

use super::types::IntervalRow;

/// Aggregate key performance indicators derived from a complete simulation run.
///
/// Computed post-hoc from the row sequence so that reported metrics always
/// agree with the exported rows.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    /// Number of simulated intervals.
    pub intervals: usize,
    /// Energy produced by the simulated array (kWh).
    pub produced_kwh: f64,
    /// Net load served (kWh).
    pub consumed_kwh: f64,
    /// Energy bought from the grid (kWh).
    pub imported_kwh: f64,
    pub on_peak_imported_kwh: f64,
    pub off_peak_imported_kwh: f64,
    /// Energy sent to the grid (kWh).
    pub exported_kwh: f64,
    pub on_peak_exported_kwh: f64,
    pub off_peak_exported_kwh: f64,
    /// Net purchase cost after credits (dollars).
    pub total_cost_dollars: f64,
    pub credits_earned_dollars: f64,
    pub credits_used_dollars: f64,
    /// Credit balance after the last interval (dollars).
    pub final_credits_dollars: f64,
    /// Percentage of intervals ending with an empty battery.
    pub depleted_pct: f64,
    /// Percentage of intervals ending with a full battery.
    pub saturated_pct: f64,
    /// Imported energy as a percentage of the load served.
    pub grid_dependence_pct: f64,
    /// Battery lifetime throughput at the end of the run (kWh).
    pub battery_throughput_kwh: f64,
}

impl KpiReport {
    /// Computes all KPIs from the complete row sequence.
    ///
    /// An empty sequence yields an all-zero report.
    pub fn from_rows(rows: &[IntervalRow]) -> Self {
        let mut report = Self {
            intervals: rows.len(),
            produced_kwh: 0.0,
            consumed_kwh: 0.0,
            imported_kwh: 0.0,
            on_peak_imported_kwh: 0.0,
            off_peak_imported_kwh: 0.0,
            exported_kwh: 0.0,
            on_peak_exported_kwh: 0.0,
            off_peak_exported_kwh: 0.0,
            total_cost_dollars: 0.0,
            credits_earned_dollars: 0.0,
            credits_used_dollars: 0.0,
            final_credits_dollars: 0.0,
            depleted_pct: 0.0,
            saturated_pct: 0.0,
            grid_dependence_pct: 0.0,
            battery_throughput_kwh: 0.0,
        };
        let Some(last) = rows.last() else {
            return report;
        };

        let mut depleted = 0_usize;
        let mut saturated = 0_usize;
        for r in rows {
            let imported = r.imported_wh / 1000.0;
            let exported = r.exported_wh / 1000.0;
            report.produced_kwh += r.produced_wh / 1000.0;
            report.consumed_kwh += r.consumed_wh / 1000.0;
            report.imported_kwh += imported;
            report.exported_kwh += exported;
            if r.is_peak {
                report.on_peak_imported_kwh += imported;
                report.on_peak_exported_kwh += exported;
            } else {
                report.off_peak_imported_kwh += imported;
                report.off_peak_exported_kwh += exported;
            }

            report.total_cost_dollars += r.cost_dollars;
            report.credits_earned_dollars += r.credit_earned_dollars;
            report.credits_used_dollars += r.credit_used_dollars;

            if r.battery_soc <= 0.0 {
                depleted += 1;
            }
            if r.battery_soc >= 1.0 {
                saturated += 1;
            }
        }

        let n = rows.len() as f64;
        report.depleted_pct = 100.0 * depleted as f64 / n;
        report.saturated_pct = 100.0 * saturated as f64 / n;
        report.grid_dependence_pct = if report.consumed_kwh > 0.0 {
            100.0 * report.imported_kwh / report.consumed_kwh
        } else {
            0.0
        };
        report.final_credits_dollars = last.available_credits_dollars;
        report.battery_throughput_kwh = last.battery_throughput_wh / 1000.0;
        report
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ({} intervals) ---", self.intervals)?;
        writeln!(f, "Solar produced:        {:.2} kWh", self.produced_kwh)?;
        writeln!(f, "Load served:           {:.2} kWh", self.consumed_kwh)?;
        writeln!(
            f,
            "Grid import:           {:.2} kWh (peak {:.2}, off-peak {:.2})",
            self.imported_kwh, self.on_peak_imported_kwh, self.off_peak_imported_kwh
        )?;
        writeln!(
            f,
            "Grid export:           {:.2} kWh (peak {:.2}, off-peak {:.2})",
            self.exported_kwh, self.on_peak_exported_kwh, self.off_peak_exported_kwh
        )?;
        writeln!(f, "Grid dependence:       {:.1}%", self.grid_dependence_pct)?;
        writeln!(f, "Net cost:              ${:.2}", self.total_cost_dollars)?;
        writeln!(
            f,
            "Credits:               earned ${:.2}, used ${:.2}, final ${:.2}",
            self.credits_earned_dollars, self.credits_used_dollars, self.final_credits_dollars
        )?;
        writeln!(
            f,
            "Battery:               {:.1}% depleted, {:.1}% saturated",
            self.depleted_pct, self.saturated_pct
        )?;
        write!(f, "Battery throughput:    {:.2} kWh", self.battery_throughput_kwh)
    }
}

/// Spend of a simulated system compared with its no-solar baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavingsReport {
    pub baseline_spent_dollars: f64,
    pub simulated_spent_dollars: f64,
    /// Baseline spend minus simulated spend (dollars).
    pub savings_dollars: f64,
    /// Savings as a percentage of baseline spend; 0 when the baseline is free.
    pub savings_pct: f64,
}

impl SavingsReport {
    pub fn compare(simulated: &KpiReport, baseline: &KpiReport) -> Self {
        let savings_dollars = baseline.total_cost_dollars - simulated.total_cost_dollars;
        let savings_pct = if baseline.total_cost_dollars > 0.0 {
            100.0 * savings_dollars / baseline.total_cost_dollars
        } else {
            0.0
        };
        Self {
            baseline_spent_dollars: baseline.total_cost_dollars,
            simulated_spent_dollars: simulated.total_cost_dollars,
            savings_dollars,
            savings_pct,
        }
    }
}

impl fmt::Display for SavingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Solar Savings ---")?;
        writeln!(f, "Baseline spend:        ${:.2}", self.baseline_spent_dollars)?;
        writeln!(f, "Simulated spend:       ${:.2}", self.simulated_spent_dollars)?;
        write!(
            f,
            "Savings:               ${:.2} ({:.1}%)",
            self.savings_dollars, self.savings_pct
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn make_row(imported_wh: f64, exported_wh: f64, soc: f64, is_peak: bool) -> IntervalRow {
        IntervalRow {
            timestamp: ts(),
            produced_wh: exported_wh,
            consumed_wh: imported_wh,
            stored_wh: 0.0,
            battery_charge_wh: 0.0,
            battery_discharge_wh: 0.0,
            exported_wh,
            imported_wh,
            battery_soc: soc,
            battery_throughput_wh: 0.0,
            cost_dollars: imported_wh / 1000.0 * 0.2,
            credit_earned_dollars: exported_wh / 1000.0 * 0.1,
            credit_used_dollars: 0.0,
            available_credits_dollars: 0.0,
            cumulative_spent_dollars: 0.0,
            is_peak,
            is_weekend: false,
        }
    }

    #[test]
    fn peak_split_sums_to_total() {
        let rows = vec![
            make_row(1000.0, 0.0, 0.5, true),
            make_row(500.0, 200.0, 0.5, false),
            make_row(0.0, 800.0, 0.5, true),
        ];
        let kpi = KpiReport::from_rows(&rows);
        assert_abs_diff_eq!(kpi.imported_kwh, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(kpi.on_peak_imported_kwh, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kpi.off_peak_imported_kwh, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(kpi.exported_kwh, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kpi.on_peak_exported_kwh, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(kpi.total_cost_dollars, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(kpi.credits_earned_dollars, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn depleted_and_saturated_percentages() {
        let rows = vec![
            make_row(0.0, 0.0, 0.0, false),
            make_row(0.0, 0.0, 0.0, false),
            make_row(0.0, 0.0, 1.0, false),
            make_row(0.0, 0.0, 0.4, false),
        ];
        let kpi = KpiReport::from_rows(&rows);
        assert_eq!(kpi.depleted_pct, 50.0);
        assert_eq!(kpi.saturated_pct, 25.0);
    }

    #[test]
    fn grid_dependence() {
        let mut rows = vec![make_row(250.0, 0.0, 0.5, false)];
        rows[0].consumed_wh = 1000.0;
        let kpi = KpiReport::from_rows(&rows);
        assert_abs_diff_eq!(kpi.grid_dependence_pct, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn final_values_come_from_last_row() {
        let mut rows = vec![make_row(0.0, 0.0, 0.5, false); 3];
        rows[2].available_credits_dollars = 12.5;
        rows[2].battery_throughput_wh = 4200.0;
        let kpi = KpiReport::from_rows(&rows);
        assert_eq!(kpi.final_credits_dollars, 12.5);
        assert_abs_diff_eq!(kpi.battery_throughput_kwh, 4.2, epsilon = 1e-12);
    }

    #[test]
    fn empty_rows() {
        let kpi = KpiReport::from_rows(&[]);
        assert_eq!(kpi.intervals, 0);
        assert_eq!(kpi.imported_kwh, 0.0);
        assert_eq!(kpi.grid_dependence_pct, 0.0);
        assert_eq!(kpi.depleted_pct, 0.0);
    }

    #[test]
    fn display_does_not_panic() {
        let kpi = KpiReport::from_rows(&[make_row(100.0, 50.0, 0.5, true)]);
        let s = format!("{kpi}");
        assert!(s.contains("KPI Report"));
        assert!(s.contains("Grid dependence"));
    }

    #[test]
    fn savings_against_baseline() {
        let simulated = KpiReport::from_rows(&[make_row(1000.0, 0.0, 0.5, false)]);
        let baseline = KpiReport::from_rows(&[make_row(4000.0, 0.0, 1.0, false)]);
        let savings = SavingsReport::compare(&simulated, &baseline);
        assert_abs_diff_eq!(savings.savings_dollars, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(savings.savings_pct, 75.0, epsilon = 1e-9);
    }

    #[test]
    fn savings_with_free_baseline_is_zero_percent() {
        let simulated = KpiReport::from_rows(&[make_row(0.0, 0.0, 0.5, false)]);
        let baseline = KpiReport::from_rows(&[]);
        let savings = SavingsReport::compare(&simulated, &baseline);
        assert_eq!(savings.savings_dollars, 0.0);
        assert_eq!(savings.savings_pct, 0.0);
    }
}
