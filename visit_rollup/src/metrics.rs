use chrono::NaiveDate;

use crate::config::{Figures, Metrics, ProjectMeta};

/// Below this completion (in percent) a row may get the focus flag.
pub const FOCUS_COMPLETION_THRESHOLD: f64 = 80.0;
/// Above this share of elapsed time (in percent) a row may get the focus flag.
pub const FOCUS_TIME_THRESHOLD: f64 = 80.0;

/// 100 * num / den, or 0 when there is nothing to divide by.
pub fn percent(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        100.0 * num / den
    } else {
        0.0
    }
}

/// Days of the project elapsed at the end of the reporting window, between 0
/// and the duration.
pub fn days_spent(meta: &ProjectMeta, period_end: NaiveDate) -> u32 {
    match meta.start {
        Some(start) => {
            let days = (period_end - start).num_days() + 1;
            days.clamp(0, meta.duration as i64) as u32
        }
        None => 0,
    }
}

/// Days of the project left after the end of the reporting window.
pub fn days_remaining(meta: &ProjectMeta, period_end: NaiveDate) -> u32 {
    match meta.end {
        Some(end) => (end - period_end).num_days().max(0) as u32,
        None => 0,
    }
}

/// A row is in focus when it lags behind while most of its time is spent.
pub fn is_focus(percent_of_project: f64, time_utilization_percent: f64) -> bool {
    percent_of_project < FOCUS_COMPLETION_THRESHOLD
        && time_utilization_percent > FOCUS_TIME_THRESHOLD
        && time_utilization_percent < 100.0
}

/// Derives the indicators of one row. The same computation applies at every
/// level of the hierarchy.
pub fn compute_metrics(figures: &Figures, meta: &ProjectMeta, period_end: NaiveDate) -> Metrics {
    let fact_period = figures.fact_for_period as f64;
    let fact_project = figures.fact_for_project as f64;
    let plan_project = figures.plan_for_project;

    let percent_of_period = percent(fact_period, figures.plan_for_period);
    let percent_of_project = percent(fact_project, plan_project);

    let forecast_quantity = if percent_of_project > 100.0 {
        plan_project
    } else if percent_of_project > 0.0 {
        percent_of_project / 100.0 * plan_project
    } else {
        0.0
    };

    let spent = days_spent(meta, period_end);
    let duration = meta.duration as f64;
    let time_utilization_percent = percent(spent as f64, duration);
    let daily_plan_for_completion = if meta.duration > 0 {
        plan_project / duration
    } else {
        0.0
    };

    Metrics {
        percent_of_period,
        delta_for_period: figures.plan_for_period - fact_period,
        percent_of_project,
        delta_for_project: plan_project - fact_project,
        forecast_quantity,
        forecast_percent: percent_of_project.min(100.0),
        days_spent: spent,
        days_remaining: days_remaining(meta, period_end),
        time_utilization_percent,
        daily_plan_for_completion,
        focus: is_focus(percent_of_project, time_utilization_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Portal;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn may() -> ProjectMeta {
        ProjectMeta {
            portal: Portal::Checker,
            start: Some(date(5, 1)),
            end: Some(date(5, 31)),
            duration: 31,
        }
    }

    fn figures(plan_period: f64, plan_project: f64, fact_period: u64, fact_project: u64) -> Figures {
        Figures {
            plan_for_period: plan_period,
            plan_for_project: plan_project,
            fact_for_period: fact_period,
            fact_for_project: fact_project,
            to_assign: 0,
        }
    }

    #[test]
    fn ratios_and_deltas() {
        let m = compute_metrics(&figures(20.0, 100.0, 15, 40), &may(), date(5, 10));
        assert_eq!(m.percent_of_period, 75.0);
        assert_eq!(m.delta_for_period, 5.0);
        assert_eq!(m.percent_of_project, 40.0);
        assert_eq!(m.delta_for_project, 60.0);
        assert!((m.forecast_quantity - 40.0).abs() < 1e-9);
        assert_eq!(m.forecast_percent, 40.0);
        assert_eq!(m.days_spent, 10);
        assert_eq!(m.days_remaining, 21);
        assert!((m.daily_plan_for_completion - 100.0 / 31.0).abs() < 1e-9);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let m = compute_metrics(&figures(0.0, 0.0, 3, 3), &ProjectMeta::UNKNOWN, date(5, 10));
        assert_eq!(m.percent_of_period, 0.0);
        assert_eq!(m.percent_of_project, 0.0);
        assert_eq!(m.forecast_quantity, 0.0);
        assert_eq!(m.time_utilization_percent, 0.0);
        assert_eq!(m.daily_plan_for_completion, 0.0);
        assert_eq!(m.days_spent, 0);
        assert_eq!(m.days_remaining, 0);
        assert_eq!(m.delta_for_project, -3.0);
        assert!(!m.focus);
    }

    #[test]
    fn over_completion_is_capped() {
        let m = compute_metrics(&figures(10.0, 50.0, 12, 60), &may(), date(5, 31));
        assert_eq!(m.percent_of_project, 120.0);
        assert_eq!(m.forecast_quantity, 50.0);
        assert_eq!(m.forecast_percent, 100.0);
    }

    #[test]
    fn elapsed_days_are_clamped() {
        assert_eq!(days_spent(&may(), date(4, 20)), 0);
        assert_eq!(days_spent(&may(), date(5, 1)), 1);
        assert_eq!(days_spent(&may(), date(6, 20)), 31);
        assert_eq!(days_remaining(&may(), date(6, 20)), 0);
        assert_eq!(days_remaining(&may(), date(4, 30)), 31);
    }

    #[test]
    fn focus_boundaries() {
        assert!(is_focus(50.0, 90.0));
        assert!(is_focus(79.9, 80.1));
        assert!(!is_focus(80.0, 90.0));
        assert!(!is_focus(50.0, 80.0));
        assert!(!is_focus(50.0, 100.0));
        assert!(!is_focus(90.0, 90.0));
    }

    #[test]
    fn focus_from_figures() {
        let meta = ProjectMeta {
            portal: Portal::Checker,
            start: Some(date(5, 1)),
            end: Some(date(5, 10)),
            duration: 10,
        };
        // 9 of 10 days spent, 50% done.
        let m = compute_metrics(&figures(90.0, 100.0, 50, 50), &meta, date(5, 9));
        assert_eq!(m.time_utilization_percent, 90.0);
        assert!(m.focus);
        // 8 of 10 days: exactly 80%, excluded.
        let m = compute_metrics(&figures(80.0, 100.0, 50, 50), &meta, date(5, 8));
        assert_eq!(m.time_utilization_percent, 80.0);
        assert!(!m.focus);
        // Whole project elapsed: 100%, excluded.
        let m = compute_metrics(&figures(100.0, 100.0, 50, 50), &meta, date(5, 10));
        assert!(!m.focus);
    }
}
