// src/plan.rs
//! Daily recommendation heuristic.
//!
//! Pure over (history, profile): counts how often each target group was trained
//! in the recent window, favours the least-trained groups, and always keeps one
//! cardio entry in the list.
use crate::catalog::{self, ExerciseDefinition, TargetGroup, CATALOG};
use crate::history::LogEntry;
use crate::profile::Profile;
use std::collections::HashMap;

/// How many of the newest log entries feed the group counts.
pub const HISTORY_WINDOW: usize = 20;
/// Size of the recommended list when the catalog is big enough.
pub const PLAN_SIZE: usize = 5;
const PER_GROUP: usize = 2;
const UNDERTRAINED_BONUS: f64 = 0.5;

const BASE_NARRATIVE: &str = "Desk-worker posture risk detected.";
const BACK_FOCUS: &str =
    "Today's focus: open up the chest and strengthen the back to correct rounded shoulders.";
const SHOULDER_FOCUS: &str =
    "Today's focus: build the side delts for broader-looking shoulders.";

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPlan {
    pub recommended: Vec<ExerciseDefinition>,
    pub narrative: String,
    /// BMI with one decimal, or "N/A".
    pub bmi: String,
    /// Highest-priority group of the day.
    pub focus: Option<TargetGroup>,
}

impl DailyPlan {
    pub fn contains(&self, name: &str) -> bool {
        self.recommended.iter().any(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.recommended.iter().map(|e| e.name)
    }

    pub fn total_minutes(&self) -> u32 {
        self.recommended.iter().map(|e| e.estimated_minutes).sum()
    }
}

/// Builds the day's plan from the built-in catalog.
pub fn compute_daily_plan(logs: &[LogEntry], profile: &Profile) -> DailyPlan {
    compute_daily_plan_with(CATALOG, logs, profile)
}

pub fn compute_daily_plan_with(
    catalog: &[ExerciseDefinition],
    logs: &[LogEntry],
    profile: &Profile,
) -> DailyPlan {
    let bmi = profile.bmi_display();
    let ranked = rank_groups(catalog, logs);
    let primary = ranked.first().map(|(g, _)| *g);
    let secondary = ranked.get(1).map(|(g, _)| *g);

    let mut recommended: Vec<ExerciseDefinition> = Vec::with_capacity(PLAN_SIZE);
    for group in [primary, secondary].into_iter().flatten() {
        recommended.extend(
            catalog
                .iter()
                .filter(|e| e.target_group == group)
                .take(PER_GROUP)
                .copied(),
        );
    }

    if !recommended
        .iter()
        .any(|e| e.target_group == TargetGroup::Cardio)
    {
        if let Some(cardio) = catalog
            .iter()
            .find(|e| e.target_group == TargetGroup::Cardio)
        {
            recommended.push(*cardio);
        }
    }

    for exercise in catalog {
        if recommended.len() >= PLAN_SIZE {
            break;
        }
        if !recommended.iter().any(|e| e.name == exercise.name) {
            recommended.push(*exercise);
        }
    }
    recommended.truncate(PLAN_SIZE);

    DailyPlan {
        narrative: build_narrative(&bmi, primary),
        recommended,
        bmi,
        focus: primary,
    }
}

/// Target groups ordered by need, most needed first, with their scores.
/// Score = completions in the recent window, minus a bonus for the groups the
/// persona under-trains. Ties keep the declared priority order.
pub fn rank_groups(catalog: &[ExerciseDefinition], logs: &[LogEntry]) -> Vec<(TargetGroup, f64)> {
    let window_start = logs.len().saturating_sub(HISTORY_WINDOW);
    let mut counts: HashMap<TargetGroup, u32> = HashMap::new();
    for log in &logs[window_start..] {
        if let Some(def) = catalog::find_in(catalog, &log.exercise_name) {
            *counts.entry(def.target_group).or_insert(0) += 1;
        }
    }

    let mut scored: Vec<(TargetGroup, f64)> = TargetGroup::PRIORITY
        .iter()
        .map(|g| {
            let count = f64::from(counts.get(g).copied().unwrap_or(0));
            let bonus = if g.is_undertrained() { UNDERTRAINED_BONUS } else { 0.0 };
            (*g, count - bonus)
        })
        .collect();
    // sort_by is stable, so equal scores stay in priority order.
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored
}

fn build_narrative(bmi: &str, focus: Option<TargetGroup>) -> String {
    let mut narrative = format!("Current BMI {bmi}. {BASE_NARRATIVE}");
    match focus {
        Some(TargetGroup::Back) => {
            narrative.push(' ');
            narrative.push_str(BACK_FOCUS);
        }
        Some(TargetGroup::Shoulder) => {
            narrative.push(' ');
            narrative.push_str(SHOULDER_FOCUS);
        }
        _ => {}
    }
    narrative
}
