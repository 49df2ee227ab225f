use shared::{DiagnosisRecord, Language, Severity, TreatmentUrgency};
use std::ops::Range;
use std::sync::Arc;

use super::catalog::DiseaseCatalog;
use super::random::RandomSource;

pub const MIN_DISEASE_CONFIDENCE: i32 = 75;
const MAX_CONFIDENCE: i32 = 100;

// A rule without a keyword hit still fires when its draw exceeds this.
const RULE_GATE: f64 = 0.7;
const HEALTH_GATE: f64 = 0.8;

const RULE_JITTER: Range<i32> = -4..5;
const FALLBACK_CONFIDENCE: Range<i32> = 70..95;
const HEALTHY_CONFIDENCE: Range<i32> = 85..100;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown disease id: {0}")]
    UnknownDisease(String),
    #[error("No {language} text for {subject}")]
    MissingText { subject: String, language: Language },
}

/// Turns uploaded file names into diagnosis records using the keyword rules
/// and localized entries of a [`DiseaseCatalog`].
#[derive(Clone)]
pub struct LabelResolver {
    catalog: Arc<DiseaseCatalog>,
}

impl LabelResolver {
    pub fn new(catalog: Arc<DiseaseCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    /// One record per file name, in input order, with ids `img_1`, `img_2`, ...
    pub fn resolve<S, R>(
        &self,
        file_names: &[S],
        language: Language,
        rng: &mut R,
    ) -> Result<Vec<DiagnosisRecord>, ResolveError>
    where
        S: AsRef<str>,
        R: RandomSource + ?Sized,
    {
        file_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                self.resolve_one(format!("img_{}", i + 1), name.as_ref(), language, rng)
            })
            .collect()
    }

    fn resolve_one<R: RandomSource + ?Sized>(
        &self,
        image_id: String,
        file_name: &str,
        language: Language,
        rng: &mut R,
    ) -> Result<DiagnosisRecord, ResolveError> {
        let (disease_id, confidence) = self.select_disease(&file_name.to_lowercase(), rng);

        let is_healthy = confidence < MIN_DISEASE_CONFIDENCE && rng.unit() > HEALTH_GATE;
        if is_healthy {
            return self.healthy_record(image_id, language, rng);
        }

        let entry = self
            .catalog
            .get(&disease_id)
            .ok_or_else(|| ResolveError::UnknownDisease(disease_id.clone()))?;
        let text = entry
            .text(language)
            .ok_or_else(|| ResolveError::MissingText {
                subject: disease_id.clone(),
                language,
            })?;
        let stage = text.stages[rng.index(text.stages.len())].clone();

        Ok(DiagnosisRecord {
            image_id,
            disease_id: Some(disease_id),
            disease_name: text.name.clone(),
            stage,
            confidence: confidence.clamp(MIN_DISEASE_CONFIDENCE, MAX_CONFIDENCE) as u8,
            remedies: text.remedies.clone(),
            is_healthy: false,
            severity: entry.severity,
            treatment_urgency: entry.treatment_urgency,
            preventive_measures: text.preventive_measures.clone(),
            expected_recovery_time: text.recovery_time.clone(),
        })
    }

    // First rule that either matches the name or passes its random gate wins;
    // otherwise any catalog disease, uniformly.
    fn select_disease<R: RandomSource + ?Sized>(
        &self,
        lowered_file_name: &str,
        rng: &mut R,
    ) -> (String, i32) {
        for rule in self.catalog.rules() {
            if rule.matches(lowered_file_name) || rng.unit() > RULE_GATE {
                let confidence = rule.base_confidence as i32 + rng.int_in(RULE_JITTER);
                return (rule.disease_id.clone(), confidence);
            }
        }

        let diseases = self.catalog.diseases();
        let entry = &diseases[rng.index(diseases.len())];
        (entry.id.clone(), rng.int_in(FALLBACK_CONFIDENCE))
    }

    fn healthy_record<R: RandomSource + ?Sized>(
        &self,
        image_id: String,
        language: Language,
        rng: &mut R,
    ) -> Result<DiagnosisRecord, ResolveError> {
        let text = self
            .catalog
            .healthy_text(language)
            .ok_or_else(|| ResolveError::MissingText {
                subject: "healthy plants".to_string(),
                language,
            })?;

        Ok(DiagnosisRecord {
            image_id,
            disease_id: None,
            disease_name: String::new(),
            stage: String::new(),
            confidence: rng.int_in(HEALTHY_CONFIDENCE) as u8,
            remedies: Vec::new(),
            is_healthy: true,
            severity: Severity::Low,
            treatment_urgency: TreatmentUrgency::Monitor,
            preventive_measures: text.preventive_measures.clone(),
            expected_recovery_time: text.recovery_time.clone(),
        })
    }
}
