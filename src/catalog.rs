// src/catalog.rs
use reqwest::Url;
use serde::Serialize;
use strum_macros::Display;

const TUTORIAL_SEARCH_URL: &str = "https://www.youtube.com/results";

/// Muscle/functional category an exercise trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetGroup {
    Back,
    Shoulder,
    Chest,
    Abs,
    Cardio,
}

impl TargetGroup {
    /// Declared priority order, used to break ties between equal need scores.
    pub const PRIORITY: [TargetGroup; 5] = [
        TargetGroup::Back,
        TargetGroup::Shoulder,
        TargetGroup::Abs,
        TargetGroup::Cardio,
        TargetGroup::Chest,
    ];

    /// Groups the persona chronically under-trains (rounded shoulders, hunched back).
    pub const fn is_undertrained(self) -> bool {
        matches!(self, TargetGroup::Back | TargetGroup::Shoulder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExerciseDefinition {
    pub name: &'static str,
    pub target_group: TargetGroup,
    pub sets_scheme: &'static str,
    pub estimated_minutes: u32,
    pub media_ref: &'static str,
    pub focus_note: &'static str,
}

impl ExerciseDefinition {
    /// Link to a video search for correct form.
    pub fn tutorial_url(&self) -> String {
        tutorial_search_url(self.name, "proper form gym tutorial")
    }
}

/// Posture drill shown alongside the gym plan; never scheduled or logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrectionDrill {
    pub name: &'static str,
    pub description: &'static str,
    pub media_ref: &'static str,
}

impl CorrectionDrill {
    pub fn tutorial_url(&self) -> String {
        tutorial_search_url(self.name, "posture correction physiotherapy")
    }
}

pub static CATALOG: &[ExerciseDefinition] = &[
    ExerciseDefinition {
        name: "Lat Pulldown",
        target_group: TargetGroup::Back,
        sets_scheme: "12 x 4",
        estimated_minutes: 8,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/02/Lat-Pulldown.gif",
        focus_note: "Fix the hunch / build back width",
    },
    ExerciseDefinition {
        name: "Seated Cable Row",
        target_group: TargetGroup::Back,
        sets_scheme: "15 x 3",
        estimated_minutes: 7,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/02/Seated-Cable-Row.gif",
        focus_note: "Fix rounded shoulders / squeeze the shoulder blades",
    },
    ExerciseDefinition {
        name: "Dumbbell Lateral Raise",
        target_group: TargetGroup::Shoulder,
        sets_scheme: "15 x 4",
        estimated_minutes: 8,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/02/Dumbbell-Lateral-Raise.gif",
        focus_note: "Wider shoulders for a narrow frame",
    },
    ExerciseDefinition {
        name: "Machine Shoulder Press",
        target_group: TargetGroup::Shoulder,
        sets_scheme: "12 x 3",
        estimated_minutes: 7,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/04/Lever-Shoulder-Press.gif",
        focus_note: "Rounder, fuller delts",
    },
    ExerciseDefinition {
        name: "Machine Chest Press",
        target_group: TargetGroup::Chest,
        sets_scheme: "12 x 3",
        estimated_minutes: 8,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/02/Chest-Press-Machine.gif",
        focus_note: "Chest thickness",
    },
    ExerciseDefinition {
        name: "Pec Deck Fly",
        target_group: TargetGroup::Chest,
        sets_scheme: "15 x 3",
        estimated_minutes: 8,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/02/Pec-Deck-Fly.gif",
        focus_note: "Inner chest line",
    },
    ExerciseDefinition {
        name: "Seated Crunch Machine",
        target_group: TargetGroup::Abs,
        sets_scheme: "20 x 3",
        estimated_minutes: 5,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/09/Seated-Crunch-Machine.gif",
        focus_note: "Pull flared ribs down / tighten the waist",
    },
    ExerciseDefinition {
        name: "Treadmill",
        target_group: TargetGroup::Cardio,
        sets_scheme: "10 min",
        estimated_minutes: 10,
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2023/01/treadmill-for-aerobic-exercises.gif",
        focus_note: "Burn belly fat",
    },
];

pub static CORRECTION_DRILLS: &[CorrectionDrill] = &[
    CorrectionDrill {
        name: "Diaphragmatic Breathing",
        description: "Draw the ribs down on every exhale, 10 minutes a day, to settle flared ribs",
        media_ref: "https://respelearning.scot/sites/default/files/breathing_diaphragm.gif",
    },
    CorrectionDrill {
        name: "Wall Angels",
        description: "Back flat against the wall, slide the arms up and down to undo desk-bound rounded shoulders",
        media_ref: "https://fa.pelank.com/wp-content/uploads/2025/10/wall-slide.gif",
    },
    CorrectionDrill {
        name: "Cat-Cow",
        description: "Mobilise the thoracic spine after long hours of sitting",
        media_ref: "https://fitnessprogramer.com/wp-content/uploads/2021/02/cat-cow.gif",
    },
];

/// Looks up an exercise by exact name in the given catalog.
pub fn find_in<'a>(catalog: &'a [ExerciseDefinition], name: &str) -> Option<&'a ExerciseDefinition> {
    catalog.iter().find(|e| e.name == name)
}

/// Looks up an exercise in the built-in catalog, ignoring ASCII case and surrounding spaces.
pub fn find_exercise(name: &str) -> Option<&'static ExerciseDefinition> {
    let wanted = name.trim();
    CATALOG.iter().find(|e| e.name.eq_ignore_ascii_case(wanted))
}

pub fn exercises_in(group: TargetGroup) -> impl Iterator<Item = &'static ExerciseDefinition> {
    CATALOG.iter().filter(move |e| e.target_group == group)
}

fn tutorial_search_url(name: &str, suffix: &str) -> String {
    let query = format!("{name} {suffix}");
    match Url::parse_with_params(TUTORIAL_SEARCH_URL, &[("search_query", query.as_str())]) {
        Ok(url) => url.to_string(),
        // Base URL is a constant, so this only happens if it is edited badly.
        Err(_) => TUTORIAL_SEARCH_URL.to_string(),
    }
}
