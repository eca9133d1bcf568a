//! Typed response payloads, one shape per category.
//!
//! Payloads are stored as JSON with an internal `kind` tag so a record can be
//! checked against its category when it is read back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::knowledge::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Interpretation,
    ClinicalPearls,
    TeachingQuestions,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Interpretation => "interpretation",
            PayloadKind::ClinicalPearls => "clinical_pearls",
            PayloadKind::TeachingQuestions => "teaching_questions",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload kind {found} does not match category {category} (expected {expected})")]
    KindMismatch {
        category: Category,
        expected: PayloadKind,
        found: PayloadKind,
    },

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty {kind} payload")]
    Empty { kind: PayloadKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    Interpretation(Interpretation),
    ClinicalPearls(ClinicalPearls),
    TeachingQuestions(TeachingQuestions),
}

impl ResponsePayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            ResponsePayload::Interpretation(_) => PayloadKind::Interpretation,
            ResponsePayload::ClinicalPearls(_) => PayloadKind::ClinicalPearls,
            ResponsePayload::TeachingQuestions(_) => PayloadKind::TeachingQuestions,
        }
    }

    /// Checks that this payload is the shape `category` requires.
    pub fn check_category(&self, category: Category) -> Result<(), PayloadError> {
        let expected = category.payload_kind();
        let found = self.kind();
        if expected != found {
            return Err(PayloadError::KindMismatch {
                category,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Rejects payloads with no usable content.
    pub fn check_not_empty(&self) -> Result<(), PayloadError> {
        let empty = match self {
            ResponsePayload::Interpretation(i) => {
                i.summary.trim().is_empty() && i.findings.is_empty()
            }
            ResponsePayload::ClinicalPearls(p) => p.pearls.is_empty(),
            ResponsePayload::TeachingQuestions(q) => q.questions.is_empty(),
        };
        if empty {
            return Err(PayloadError::Empty { kind: self.kind() });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a stored payload and verifies it against `category`.
    pub fn from_json_for(json: &str, category: Category) -> Result<Self, PayloadError> {
        let payload: ResponsePayload = serde_json::from_str(json)?;
        payload.check_category(category)?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Normal,
    Low,
    High,
    Critical,
    #[serde(other)]
    Abnormal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Routine,
    Soon,
    Urgent,
    Emergent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub name: String,
    pub value: String,
    pub status: FindingStatus,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pearl {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalPearls {
    pub pearls: Vec<Pearl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeachingQuestions {
    pub questions: Vec<Question>,
}
