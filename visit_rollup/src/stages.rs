//! Splitting the plan of a project into four weighted stages.

use chrono::{Duration, NaiveDate};
use log::debug;

use crate::config::{ProjectMeta, StageWeights};

pub const STAGE_COUNT: usize = 4;

/// The calendar window of a project, both ends inclusive.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ProjectWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ProjectWindow {
    /// end - start + 1, never negative.
    pub fn duration(&self) -> u32 {
        let days = (self.end - self.start).num_days() + 1;
        days.max(0) as u32
    }
}

impl ProjectMeta {
    /// The window of the project, if both dates are known.
    pub fn window(&self) -> Option<ProjectWindow> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(ProjectWindow { start, end }),
            _ => None,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Stage {
    /// First calendar day of the stage. None when the stage is empty.
    pub start: Option<NaiveDate>,
    pub length: u32,
    pub plan: f64,
    pub daily_rate: f64,
}

impl Stage {
    const EMPTY: Stage = Stage {
        start: None,
        length: 0,
        plan: 0.0,
        daily_rate: 0.0,
    };

    /// The number of days of this stage that fall in [from, to].
    pub fn days_within(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        let start = match self.start {
            Some(s) if self.length > 0 => s,
            _ => return 0,
        };
        let end = start + Duration::days(self.length as i64 - 1);
        let lo = start.max(from);
        let hi = end.min(to);
        if hi < lo {
            0
        } else {
            ((hi - lo).num_days() + 1) as u32
        }
    }
}

/// The allocation of one plan over the four stages of a project.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct StageSchedule {
    pub stages: [Stage; STAGE_COUNT],
}

impl StageSchedule {
    pub const EMPTY: StageSchedule = StageSchedule {
        stages: [Stage::EMPTY; STAGE_COUNT],
    };

    /// The sum of the stage plans, regardless of any reporting window.
    pub fn plan_total(&self) -> f64 {
        self.stages.iter().map(|s| s.plan).sum()
    }

    /// The part of the plan whose days fall in [from, to].
    pub fn plan_within(&self, from: NaiveDate, to: NaiveDate) -> f64 {
        self.stages
            .iter()
            .map(|s| s.daily_rate * s.days_within(from, to) as f64)
            .sum()
    }
}

/// Splits a duration into four stage lengths. The remainder goes to the
/// first stages, one extra day each.
pub fn stage_lengths(duration: u32) -> [u32; STAGE_COUNT] {
    let base = duration / STAGE_COUNT as u32;
    let remainder = (duration % STAGE_COUNT as u32) as usize;
    let mut res = [base; STAGE_COUNT];
    for l in res.iter_mut().take(remainder) {
        *l += 1;
    }
    res
}

/// Scales the weights to sum to 1. All-zero weights fall back to equal
/// shares.
pub fn normalized_weights(weights: &StageWeights) -> [f64; STAGE_COUNT] {
    let sum: f64 = weights.0.iter().sum();
    if sum <= 0.0 {
        return [1.0 / STAGE_COUNT as f64; STAGE_COUNT];
    }
    let mut res = [0.0; STAGE_COUNT];
    for (r, w) in res.iter_mut().zip(weights.0.iter()) {
        *r = w / sum;
    }
    res
}

/// The plan of each stage. The last stage receives whatever the first three
/// did not take, so that the stages always add back to the total.
pub fn stage_plans(total: f64, normalized: &[f64; STAGE_COUNT]) -> [f64; STAGE_COUNT] {
    let mut res = [0.0; STAGE_COUNT];
    let mut allocated = 0.0;
    for i in 0..STAGE_COUNT - 1 {
        res[i] = total * normalized[i];
        allocated += res[i];
    }
    res[STAGE_COUNT - 1] = total - allocated;
    res
}

/// Allocates the total plan of a project over its window.
///
/// Without a window, with an empty window or with nothing to plan, every
/// stage is empty.
pub fn allocate(total: f64, window: Option<ProjectWindow>, weights: &StageWeights) -> StageSchedule {
    let window = match window {
        Some(w) if w.duration() > 0 && total > 0.0 => w,
        _ => return StageSchedule::EMPTY,
    };
    let lengths = stage_lengths(window.duration());
    let plans = stage_plans(total, &normalized_weights(weights));
    // Projects shorter than four days have empty trailing stages. Their plan
    // is spread over the days of the last stage that has some.
    let mut spread = plans;
    for i in (1..STAGE_COUNT).rev() {
        if lengths[i] == 0 {
            spread[i - 1] += spread[i];
            spread[i] = 0.0;
        }
    }

    let mut stages = [Stage::EMPTY; STAGE_COUNT];
    // Each stage starts the day after the previous one ends.
    let mut day_pointer = window.start;
    for (i, stage) in stages.iter_mut().enumerate() {
        let length = lengths[i];
        *stage = Stage {
            start: if length > 0 { Some(day_pointer) } else { None },
            length,
            plan: plans[i],
            daily_rate: if length > 0 {
                spread[i] / length as f64
            } else {
                0.0
            },
        };
        day_pointer += Duration::days(length as i64);
    }
    debug!(
        "allocate: total: {:?} window: {:?} stages: {:?}",
        total, window, stages
    );
    StageSchedule { stages }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n - 1)
    }

    fn window(first: i64, last: i64) -> Option<ProjectWindow> {
        Some(ProjectWindow {
            start: day(first),
            end: day(last),
        })
    }

    #[test]
    fn lengths_add_up_to_duration() {
        for d in 0..200 {
            let lengths = stage_lengths(d);
            assert_eq!(lengths.iter().sum::<u32>(), d, "duration {}", d);
        }
    }

    #[test]
    fn remainder_days_go_to_the_first_stages() {
        assert_eq!(stage_lengths(10), [3, 3, 2, 2]);
        assert_eq!(stage_lengths(7), [2, 2, 2, 1]);
        assert_eq!(stage_lengths(2), [1, 1, 0, 0]);
        assert_eq!(stage_lengths(40), [10, 10, 10, 10]);
    }

    #[test]
    fn plans_add_up_to_total() {
        let weight_sets = [
            StageWeights([1.0, 1.0, 1.0, 1.0]),
            StageWeights([0.1, 0.2, 0.3, 0.4]),
            StageWeights([3.0, 0.0, 7.0, 1.0]),
            StageWeights([0.0, 0.0, 0.0, 0.0]),
            StageWeights([0.33, 0.33, 0.33, 0.0]),
        ];
        for w in weight_sets.iter() {
            for total in [0.0, 1.0, 7.0, 10.0, 99.0, 1234.0, 100_003.0] {
                let plans = stage_plans(total, &normalized_weights(w));
                let sum: f64 = plans.iter().sum();
                assert!((sum - total).abs() < 1e-9, "{:?} {} {}", w, total, sum);
            }
        }
    }

    #[test]
    fn zero_weights_fall_back_to_equal_shares() {
        let w = normalized_weights(&StageWeights([0.0; 4]));
        assert_eq!(w, [0.25; 4]);
    }

    #[test]
    fn ten_day_project() {
        let s = allocate(10.0, window(1, 10), &StageWeights::EQUAL);
        let lengths: Vec<u32> = s.stages.iter().map(|s| s.length).collect();
        assert_eq!(lengths, vec![3, 3, 2, 2]);
        for stage in s.stages.iter() {
            assert!((stage.plan - 2.5).abs() < 1e-9);
        }
        assert_eq!(s.stages[1].start, Some(day(4)));
        assert_eq!(s.stages[2].start, Some(day(7)));
        assert_eq!(s.stages[3].start, Some(day(9)));
    }

    #[test]
    fn forty_day_project_first_stage() {
        let s = allocate(100.0, window(1, 40), &StageWeights::EQUAL);
        for stage in s.stages.iter() {
            assert_eq!(stage.length, 10);
            assert!((stage.daily_rate - 2.5).abs() < 1e-9);
        }
        assert!((s.plan_within(day(1), day(10)) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_to_allocate() {
        assert_eq!(
            allocate(0.0, window(1, 10), &StageWeights::EQUAL),
            StageSchedule::EMPTY
        );
        assert_eq!(allocate(10.0, None, &StageWeights::EQUAL), StageSchedule::EMPTY);
        // End before start
        assert_eq!(
            allocate(10.0, window(5, 3), &StageWeights::EQUAL),
            StageSchedule::EMPTY
        );
    }

    #[test]
    fn full_window_recovers_the_plan() {
        for d in 1..120 {
            for total in [1.0, 13.0, 250.0] {
                let s = allocate(total, window(1, d), &StageWeights([0.1, 0.4, 0.3, 0.2]));
                let p = s.plan_within(day(1), day(d));
                assert!((p - total).abs() < 1e-6, "d: {} total: {} p: {}", d, total, p);
                assert!((s.plan_total() - total).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn short_projects_keep_their_plan() {
        // Two days: stages of [1, 1, 0, 0] days.
        let s = allocate(100.0, window(1, 2), &StageWeights::EQUAL);
        assert!((s.stages[2].plan - 25.0).abs() < 1e-9);
        assert_eq!(s.stages[3].start, None);
        assert!((s.stages[1].daily_rate - 75.0).abs() < 1e-9);
        assert!((s.plan_within(day(1), day(1)) - 25.0).abs() < 1e-9);
        assert!((s.plan_within(day(1), day(2)) - 100.0).abs() < 1e-9);

        let s = allocate(100.0, window(1, 1), &StageWeights::EQUAL);
        assert!((s.plan_within(day(1), day(1)) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn window_outside_the_project() {
        let s = allocate(100.0, window(10, 49), &StageWeights::EQUAL);
        assert_eq!(s.plan_within(day(60), day(70)), 0.0);
        assert_eq!(s.plan_within(day(1), day(9)), 0.0);
        assert!((s.plan_total() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn window_across_stages() {
        // Stages of 10 days each, 25 visits each.
        let s = allocate(100.0, window(1, 40), &StageWeights::EQUAL);
        assert_eq!(s.stages[0].days_within(day(8), day(12)), 3);
        assert_eq!(s.stages[1].days_within(day(8), day(12)), 2);
        assert!((s.plan_within(day(8), day(12)) - 12.5).abs() < 1e-9);
    }
}
