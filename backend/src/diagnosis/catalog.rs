use serde::Deserialize;
use shared::{Language, Severity, TreatmentUrgency};
use std::collections::HashMap;
use std::path::Path;

const EMBEDDED_CATALOG: &str = include_str!("../../../config/catalog.yaml");
const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Unsupported catalog version {0}")]
    UnsupportedVersion(u32),
    #[error("Catalog has no diseases")]
    Empty,
    #[error("Duplicate disease id: {0}")]
    DuplicateDisease(String),
    #[error("Disease {id} has no {language} text")]
    MissingText { id: String, language: Language },
    #[error("Disease {id} has an empty name or no stages in {language}")]
    IncompleteText { id: String, language: Language },
    #[error("No healthy-plant text for {0}")]
    MissingHealthyText(Language),
    #[error("Keyword rule #{index} is invalid: {reason}")]
    InvalidRule { index: usize, reason: String },
}

/// Filename heuristic: any keyword contained in the lower-cased name selects
/// `disease_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub disease_id: String,
    pub base_confidence: u8,
}

impl KeywordRule {
    pub fn matches(&self, lowered_file_name: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| lowered_file_name.contains(keyword.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseText {
    pub name: String,
    pub stages: Vec<String>,
    pub remedies: Vec<String>,
    #[serde(default)]
    pub preventive_measures: Vec<String>,
    pub recovery_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseEntry {
    pub id: String,
    pub severity: Severity,
    pub treatment_urgency: TreatmentUrgency,
    text: HashMap<Language, DiseaseText>,
}

impl DiseaseEntry {
    pub fn text(&self, language: Language) -> Option<&DiseaseText> {
        self.text.get(&language)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthyText {
    pub preventive_measures: Vec<String>,
    pub recovery_time: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: u32,
    keyword_rules: Vec<KeywordRule>,
    healthy: HashMap<Language, HealthyText>,
    diseases: Vec<DiseaseEntry>,
}

/// Localized disease reference data and the keyword rules that point into it.
/// Built once at start-up and never mutated.
#[derive(Debug, Clone)]
pub struct DiseaseCatalog {
    rules: Vec<KeywordRule>,
    healthy: HashMap<Language, HealthyText>,
    diseases: Vec<DiseaseEntry>,
    index: HashMap<String, usize>,
}

impl DiseaseCatalog {
    /// Loads `path` when given, otherwise the catalog compiled into the binary.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_yaml(&source)
            }
            None => Self::embedded(),
        }
    }

    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_yaml(EMBEDDED_CATALOG)
    }

    pub fn from_yaml(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(source)?;
        if file.version != SUPPORTED_VERSION {
            return Err(CatalogError::UnsupportedVersion(file.version));
        }
        if file.diseases.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = HashMap::new();
        for (position, entry) in file.diseases.iter().enumerate() {
            if index.insert(entry.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateDisease(entry.id.clone()));
            }
            for language in Language::all() {
                let text = entry.text(language).ok_or_else(|| CatalogError::MissingText {
                    id: entry.id.clone(),
                    language,
                })?;
                if text.name.trim().is_empty() || text.stages.is_empty() {
                    return Err(CatalogError::IncompleteText {
                        id: entry.id.clone(),
                        language,
                    });
                }
            }
        }

        for language in Language::all() {
            if !file.healthy.contains_key(&language) {
                return Err(CatalogError::MissingHealthyText(language));
            }
        }

        for (position, rule) in file.keyword_rules.iter().enumerate() {
            let invalid = |reason: String| CatalogError::InvalidRule {
                index: position,
                reason,
            };
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(invalid("no keywords".to_string()));
            }
            if rule.base_confidence > 100 {
                return Err(invalid(format!(
                    "base confidence {} exceeds 100",
                    rule.base_confidence
                )));
            }
            if !index.contains_key(&rule.disease_id) {
                return Err(invalid(format!("unknown disease {}", rule.disease_id)));
            }
        }

        // Keywords are matched against lower-cased file names.
        let rules = file
            .keyword_rules
            .into_iter()
            .map(|mut rule| {
                rule.keywords = rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                rule
            })
            .collect();

        Ok(Self {
            rules,
            healthy: file.healthy,
            diseases: file.diseases,
            index,
        })
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.diseases.len()
    }

    /// Entries in declaration order.
    pub fn diseases(&self) -> &[DiseaseEntry] {
        &self.diseases
    }

    pub fn get(&self, disease_id: &str) -> Option<&DiseaseEntry> {
        self.index.get(disease_id).map(|&i| &self.diseases[i])
    }

    pub fn healthy_text(&self, language: Language) -> Option<&HealthyText> {
        self.healthy.get(&language)
    }
}
