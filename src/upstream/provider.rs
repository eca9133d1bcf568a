use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::knowledge::Category;
use crate::payload::{ClinicalPearls, Interpretation, TeachingQuestions};

use super::error::UpstreamResult;

pub const OP_INTERPRETATION: &str = "generate_interpretation";
pub const OP_PEARLS: &str = "generate_pearls";
pub const OP_QUESTIONS: &str = "generate_questions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Lab,
    Imaging,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Lab => "lab",
            ReportType::Imaging => "imaging",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Caller-supplied context passed through to generation on a miss.
///
/// Never part of the cache key.
pub struct RequestContext {
    pub report_type: Option<ReportType>,
    pub patient_age: Option<u32>,
    pub patient_sex: Option<String>,
    pub clinical_notes: Option<String>,
}

impl RequestContext {
    /// Report type for `category`: interpretations imply their own type,
    /// teaching categories use the caller's hint and default to lab.
    pub fn report_type_for(&self, category: Category) -> ReportType {
        match category {
            Category::LabInterpretation => ReportType::Lab,
            Category::ImagingInterpretation => ReportType::Imaging,
            Category::TeachingPearls | Category::TeachingQuestions => {
                self.report_type.unwrap_or_default()
            }
        }
    }
}

#[async_trait]
/// The expensive generation service the cache sits in front of.
pub trait UpstreamProvider: Send + Sync {
    async fn generate_interpretation(
        &self,
        query: &str,
        context: &RequestContext,
    ) -> UpstreamResult<Interpretation>;

    async fn generate_pearls(
        &self,
        interpretation: &str,
        report_type: ReportType,
    ) -> UpstreamResult<ClinicalPearls>;

    async fn generate_questions(
        &self,
        interpretation: &str,
        report_type: ReportType,
    ) -> UpstreamResult<TeachingQuestions>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
