//! Keyword topic labels for stored entries.
//!
//! Diagnostics only; topics never take part in matching.

use crate::knowledge::Category;

/// Bytes of the query inspected.
const SCAN_PREFIX: usize = 512;

const VOCABULARY: &[(&str, &str)] = &[
    ("troponin", "cardiac"),
    ("bnp", "cardiac"),
    ("ecg", "cardiac"),
    ("echocardiogram", "cardiac"),
    ("hemoglobin", "hematology"),
    ("platelet", "hematology"),
    ("wbc", "hematology"),
    ("anemia", "hematology"),
    ("inr", "coagulation"),
    ("d-dimer", "coagulation"),
    ("sodium", "electrolytes"),
    ("potassium", "electrolytes"),
    ("calcium", "electrolytes"),
    ("magnesium", "electrolytes"),
    ("creatinine", "renal"),
    ("egfr", "renal"),
    ("bun", "renal"),
    ("alt", "hepatic"),
    ("ast", "hepatic"),
    ("bilirubin", "hepatic"),
    ("albumin", "hepatic"),
    ("glucose", "endocrine"),
    ("hba1c", "endocrine"),
    ("tsh", "endocrine"),
    ("thyroid", "endocrine"),
    ("cortisol", "endocrine"),
    ("cholesterol", "lipids"),
    ("ldl", "lipids"),
    ("triglyceride", "lipids"),
    ("lactate", "critical-care"),
    ("ph", "acid-base"),
    ("bicarbonate", "acid-base"),
    ("crp", "inflammation"),
    ("procalcitonin", "infection"),
    ("culture", "infection"),
    ("x-ray", "radiography"),
    ("chest", "thoracic"),
    ("pneumonia", "thoracic"),
    ("effusion", "thoracic"),
    ("nodule", "thoracic"),
    ("embolism", "vascular"),
    ("ct", "computed-tomography"),
    ("mri", "magnetic-resonance"),
    ("fracture", "musculoskeletal"),
    ("stroke", "neurology"),
    ("hemorrhage", "neurology"),
    ("ultrasound", "ultrasonography"),
];

/// Picks a topic label for `query`, falling back to the category name.
///
/// Only whole words match, so `ph` does not fire inside `phosphate`.
pub fn extract_topic(query: &str, category: Category) -> String {
    let mut end = query.len().min(SCAN_PREFIX);
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    let prefix = query[..end].to_lowercase();

    let words: Vec<&str> = prefix
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();

    VOCABULARY
        .iter()
        .find(|(keyword, _)| words.contains(keyword))
        .map(|(_, topic)| (*topic).to_string())
        .unwrap_or_else(|| category.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match() {
        assert_eq!(
            extract_topic("Troponin 0.4 ng/mL, chest pain", Category::LabInterpretation),
            "cardiac"
        );
    }

    #[test]
    fn test_fallback_to_category() {
        assert_eq!(
            extract_topic("nothing recognizable", Category::TeachingPearls),
            "teaching-pearls"
        );
    }

    #[test]
    fn test_whole_words_only() {
        assert_eq!(
            extract_topic("phosphate 2.1", Category::LabInterpretation),
            "lab-interpretation"
        );
    }

    #[test]
    fn test_hyphenated_keyword() {
        assert_eq!(
            extract_topic("elevated D-dimer", Category::LabInterpretation),
            "coagulation"
        );
    }

    #[test]
    fn test_scan_is_bounded() {
        let query = format!("{} troponin", "x ".repeat(SCAN_PREFIX));
        assert_eq!(
            extract_topic(&query, Category::LabInterpretation),
            "lab-interpretation"
        );
    }

    #[test]
    fn test_multibyte_boundary() {
        let query = "€".repeat(SCAN_PREFIX);
        assert_eq!(
            extract_topic(&query, Category::ImagingInterpretation),
            "imaging-interpretation"
        );
    }
}
