// src/profile.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_HEIGHT_CM: f64 = 174.0;
pub const DEFAULT_WEIGHT_KG: f64 = 71.5;
pub const DEFAULT_AGE_YEARS: u32 = 32;
pub const DEFAULT_OCCUPATION: &str = "Engineer";

/// Marker shown wherever BMI cannot be computed.
pub const BMI_UNAVAILABLE: &str = "N/A";

/// Biometric attributes of the (single) user. Stored with the short keys
/// `height`, `weight`, `age`, `job`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    #[serde(rename = "height")]
    pub height_cm: f64,
    #[serde(rename = "weight")]
    pub weight_kg: f64,
    #[serde(rename = "age")]
    pub age_years: u32,
    #[serde(rename = "job")]
    pub occupation: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            height_cm: DEFAULT_HEIGHT_CM,
            weight_kg: DEFAULT_WEIGHT_KG,
            age_years: DEFAULT_AGE_YEARS,
            occupation: DEFAULT_OCCUPATION.to_string(),
        }
    }
}

/// Partial edit of a profile; `None` leaves the field alone.
#[derive(Default, Debug, Clone)]
pub struct ProfileUpdate {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age_years: Option<u32>,
    pub occupation: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.height_cm.is_none()
            && self.weight_kg.is_none()
            && self.age_years.is_none()
            && self.occupation.is_none()
    }
}

impl Profile {
    /// Builds a profile from loosely-typed stored JSON. Anything that is not an
    /// object yields the default profile; individual fields that are missing,
    /// zero, negative or non-numeric fall back to their defaults.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let occupation = obj
            .get("job")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_OCCUPATION)
            .to_string();

        Self {
            height_cm: positive_number(obj.get("height")).unwrap_or(DEFAULT_HEIGHT_CM),
            weight_kg: positive_number(obj.get("weight")).unwrap_or(DEFAULT_WEIGHT_KG),
            age_years: positive_number(obj.get("age"))
                .map(|a| a.round() as u32)
                .filter(|a| *a > 0)
                .unwrap_or(DEFAULT_AGE_YEARS),
            occupation,
        }
    }

    /// Replaces zero or otherwise invalid numeric fields with the defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if !is_positive(self.height_cm) {
            self.height_cm = DEFAULT_HEIGHT_CM;
        }
        if !is_positive(self.weight_kg) {
            self.weight_kg = DEFAULT_WEIGHT_KG;
        }
        if self.age_years == 0 {
            self.age_years = DEFAULT_AGE_YEARS;
        }
        if self.occupation.trim().is_empty() {
            self.occupation = DEFAULT_OCCUPATION.to_string();
        }
        self
    }

    #[must_use]
    pub fn apply(&self, update: ProfileUpdate) -> Self {
        let mut next = self.clone();
        if let Some(h) = update.height_cm {
            next.height_cm = h;
        }
        if let Some(w) = update.weight_kg {
            next.weight_kg = w;
        }
        if let Some(a) = update.age_years {
            next.age_years = a;
        }
        if let Some(o) = update.occupation {
            next.occupation = o.trim().to_string();
        }
        next.sanitized()
    }

    /// Body-mass index from the raw fields. `None` when height is not a
    /// positive finite number, so the division never runs on a bad divisor.
    pub fn bmi(&self) -> Option<f64> {
        if !is_positive(self.height_cm) || !self.weight_kg.is_finite() {
            return None;
        }
        let meters = self.height_cm / 100.0;
        Some(self.weight_kg / (meters * meters))
    }

    /// BMI with one decimal place, or [`BMI_UNAVAILABLE`].
    pub fn bmi_display(&self) -> String {
        self.bmi()
            .map(|b| format!("{b:.1}"))
            .unwrap_or_else(|| BMI_UNAVAILABLE.to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "{}cm / {}kg ({}y)",
            self.height_cm, self.weight_kg, self.age_years
        )
    }
}

fn is_positive(n: f64) -> bool {
    n.is_finite() && n > 0.0
}

// Accepts numbers and numeric strings; the old web form stored both.
fn positive_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    is_positive(n).then_some(n)
}
