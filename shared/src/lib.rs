use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

mod request;

pub use request::{DetectionRequest, ImagePart, MultipartBody};

/// Display languages the diagnosis text is available in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[default]
    En,
    Hi,
    Ne,
}

impl Language {
    pub fn all() -> Vec<Language> {
        Language::iter().collect()
    }

    /// Parses a locale tag such as `hi`, `hi-IN` or `ne_NP`, looking only at
    /// the primary subtag.
    pub fn from_tag(tag: &str) -> Option<Language> {
        let primary = tag.trim().split(['-', '_']).next().unwrap_or("");
        if primary.is_empty() {
            return None;
        }
        primary.parse().ok()
    }

    /// Picks the first supported language out of an `Accept-Language` value,
    /// in the order the header lists them. Entries weighted `q=0` are refused.
    pub fn from_accept_language(header: &str) -> Option<Language> {
        header.split(',').find_map(|item| {
            let mut parts = item.split(';');
            let tag = parts.next()?;
            let refused = parts.any(|param| {
                let param = param.trim();
                param
                    .strip_prefix("q=")
                    .or_else(|| param.strip_prefix("Q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            });
            if refused {
                return None;
            }
            Language::from_tag(tag)
        })
    }

    pub fn native_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "हिन्दी",
            Language::Ne => "नेपाली",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentUrgency {
    Immediate,
    WithinWeek,
    Monitor,
}

/// One image's verdict as returned by `POST /api/detect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRecord {
    pub image_id: String,
    pub disease_id: Option<String>,
    pub disease_name: String,
    pub stage: String,
    pub confidence: u8,
    pub remedies: Vec<String>,
    pub is_healthy: bool,
    pub severity: Severity,
    pub treatment_urgency: TreatmentUrgency,
    pub preventive_measures: Vec<String>,
    pub expected_recovery_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: Language,
    pub name: String,
}

impl From<Language> for LanguageInfo {
    fn from(language: Language) -> Self {
        Self {
            code: language,
            name: language.native_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_tags_use_primary_subtag() {
        assert_eq!(Language::from_tag("hi-IN"), Some(Language::Hi));
        assert_eq!(Language::from_tag("NE_np"), Some(Language::Ne));
        assert_eq!(Language::from_tag(" en "), Some(Language::En));
        assert_eq!(Language::from_tag("fr-FR"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn accept_language_skips_unsupported_entries() {
        assert_eq!(
            Language::from_accept_language("fr-CH, fr;q=0.9, ne-NP;q=0.8, en;q=0.5"),
            Some(Language::Ne)
        );
        assert_eq!(Language::from_accept_language("de, fr"), None);
    }

    #[test]
    fn accept_language_ignores_refused_entries() {
        assert_eq!(Language::from_accept_language("hi;q=0, en"), Some(Language::En));
        assert_eq!(Language::from_accept_language("ne; q=0.000, hi;q=0.3"), Some(Language::Hi));
        assert_eq!(Language::from_accept_language("en;q=0"), None);
        assert_eq!(Language::from_accept_language("hi;q=0.1"), Some(Language::Hi));
    }

    #[test]
    fn language_codes_round_trip_through_display() {
        for language in Language::all() {
            assert_eq!(language.to_string().parse::<Language>().ok(), Some(language));
        }
        assert_eq!(Language::all().len(), 3);
    }

    #[test]
    fn healthy_record_serializes_with_camel_case_and_null_disease() {
        let record = DiagnosisRecord {
            image_id: "img_1".into(),
            disease_id: None,
            disease_name: String::new(),
            stage: String::new(),
            confidence: 91,
            remedies: vec![],
            is_healthy: true,
            severity: Severity::Low,
            treatment_urgency: TreatmentUrgency::Monitor,
            preventive_measures: vec!["Continue regular monitoring".into()],
            expected_recovery_time: "Plant is healthy".into(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["imageId"], json!("img_1"));
        assert_eq!(value["diseaseId"], json!(null));
        assert_eq!(value["isHealthy"], json!(true));
        assert_eq!(value["severity"], json!("low"));
        assert_eq!(value["treatmentUrgency"], json!("monitor"));
        assert_eq!(value["expectedRecoveryTime"], json!("Plant is healthy"));
    }

    #[test]
    fn urgency_uses_snake_case_tokens() {
        assert_eq!(
            serde_json::to_value(TreatmentUrgency::WithinWeek).unwrap(),
            json!("within_week")
        );
        let parsed: TreatmentUrgency = serde_json::from_value(json!("immediate")).unwrap();
        assert_eq!(parsed, TreatmentUrgency::Immediate);
    }

    #[test]
    fn language_info_carries_native_name() {
        let info = LanguageInfo::from(Language::Hi);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value, json!({"code": "hi", "name": "हिन्दी"}));
    }
}
