//! Prompt text for JSON-mode generation.

use super::provider::{ReportType, RequestContext};

pub const INTERPRETATION_SYSTEM: &str = "You are a clinical decision-support assistant. \
Interpret the report for a clinician. Reply with a single JSON object and nothing else, shaped as \
{\"summary\": string, \"findings\": [{\"name\": string, \"value\": string, \
\"status\": \"normal\"|\"low\"|\"high\"|\"critical\"|\"abnormal\", \"explanation\": string}], \
\"recommendations\": [string], \"urgency\": \"routine\"|\"soon\"|\"urgent\"|\"emergent\"}.";

pub const PEARLS_SYSTEM: &str = "You are a medical educator. Produce concise clinical pearls \
for trainees. Reply with a single JSON object and nothing else, shaped as \
{\"pearls\": [{\"title\": string, \"content\": string, \"category\": string}]}.";

pub const QUESTIONS_SYSTEM: &str = "You are a medical educator writing multiple-choice \
teaching questions. Reply with a single JSON object and nothing else, shaped as \
{\"questions\": [{\"question\": string, \"options\": [string], \"answer\": string, \
\"explanation\": string, \"difficulty\": \"easy\"|\"medium\"|\"hard\"}]}. \
The answer must be one of the options verbatim.";

pub fn interpretation_user(query: &str, context: &RequestContext) -> String {
    let mut prompt = String::with_capacity(query.len() + 128);
    if let Some(report_type) = context.report_type {
        prompt.push_str(&format!("Report type: {}\n", report_type.as_str()));
    }
    if let Some(age) = context.patient_age {
        prompt.push_str(&format!("Patient age: {}\n", age));
    }
    if let Some(sex) = &context.patient_sex {
        prompt.push_str(&format!("Patient sex: {}\n", sex));
    }
    if let Some(notes) = &context.clinical_notes {
        prompt.push_str(&format!("Clinical notes: {}\n", notes));
    }
    prompt.push_str("Report:\n");
    prompt.push_str(query);
    prompt
}

pub fn pearls_user(interpretation: &str, report_type: ReportType) -> String {
    format!(
        "Write 3 to 5 clinical pearls for this {} report.\n\n{}",
        report_type.as_str(),
        interpretation
    )
}

pub fn questions_user(interpretation: &str, report_type: ReportType) -> String {
    format!(
        "Write 3 multiple-choice questions about this {} report.\n\n{}",
        report_type.as_str(),
        interpretation
    )
}

/// Extracts the JSON object from a model reply, tolerating code fences and
/// leading/trailing prose.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
