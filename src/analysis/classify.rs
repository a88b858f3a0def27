//! Keyword-weighted category and severity scoring.
//!
//! Both classifiers share one shape: each label owns a list of keyword
//! phrases, and a label's raw score is the sum of case-insensitive literal
//! substring counts of its phrases. Substring counting lets multi-word
//! phrases ("payment due") match and accepts hits inside longer words
//! ("immediate" in "immediately").
//!
//! Categories normalise the raw score by text length; severity does not.
//! See [`predict_severity`].

use crate::output::{CategoryPrediction, SeverityLevel, SeverityPrediction};
use tracing::debug;

/// Label returned when no category clears the threshold.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Category keyword table, in tie-break order.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Business", &["business", "strategy", "management", "marketing", "sales", "revenue", "profit"]),
    ("Technical", &["technical", "software", "hardware", "system", "code", "programming", "development", "API"]),
    ("Legal", &["legal", "contract", "agreement", "law", "compliance", "regulation", "clause", "liability"]),
    ("Financial", &["financial", "invoice", "payment", "budget", "cost", "expense", "accounting", "tax"]),
    ("Educational", &["education", "learning", "course", "training", "student", "teacher", "curriculum"]),
    ("Medical", &["medical", "health", "patient", "diagnosis", "treatment", "clinical", "hospital"]),
    ("Report", &["report", "summary", "analysis", "findings", "conclusion", "results", "data"]),
    ("Proposal", &["proposal", "plan", "recommendation", "suggest", "objective", "goal"]),
    ("Invoice", &["invoice", "bill", "payment due", "total amount", "items", "quantity"]),
    ("Contract", &["contract", "agreement", "parties", "terms", "conditions", "effective date"]),
    ("Research", &["research", "study", "experiment", "hypothesis", "methodology", "literature"]),
    ("Manual", &["manual", "guide", "instructions", "how to", "steps", "procedure"]),
    ("Correspondence", &["dear", "sincerely", "regards", "letter", "memo", "email"]),
];

/// Severity keyword table, in tie-break order (most urgent first).
pub const SEVERITY_KEYWORDS: &[(SeverityLevel, &[&str])] = &[
    (SeverityLevel::Critical, &["urgent", "critical", "emergency", "immediate", "asap", "deadline", "priority high"]),
    (SeverityLevel::Important, &["important", "significant", "priority", "attention", "required", "action needed"]),
    (SeverityLevel::Normal, &["normal", "standard", "regular", "routine"]),
    (SeverityLevel::LowPriority, &["low priority", "optional", "fyi", "for your information", "non-urgent"]),
];

const MAX_CATEGORY_MATCHES: usize = 5;
const MAX_SEVERITY_MATCHES: usize = 3;

/// Raw score of one label over already lower-cased text.
///
/// Returns the summed occurrence count and the matched phrases in table order.
fn score_label(lower: &str, keywords: &[&str]) -> (usize, Vec<String>) {
    let mut score = 0;
    let mut matches = Vec::new();
    for kw in keywords {
        let count = lower.matches(kw.to_lowercase().as_str()).count();
        if count > 0 {
            score += count;
            matches.push(kw.to_string());
        }
    }
    (score, matches)
}

/// Rank the categories of `text`.
///
/// Scores are occurrences per 1000 characters. The top `max_categories`
/// labels are kept, then those below `threshold` are dropped; confidence is
/// `min(score / 10, 1)`. If nothing survives, the single result is
/// `Other` with confidence 0.5.
pub fn predict_categories(
    text: &str,
    max_categories: usize,
    threshold: f64,
) -> Vec<CategoryPrediction> {
    let lower = text.to_lowercase();
    let text_length = text.chars().count();

    let mut scored: Vec<(&str, f64, Vec<String>)> = Vec::new();
    if text_length > 0 {
        for (category, keywords) in CATEGORY_KEYWORDS {
            let (raw, mut matches) = score_label(&lower, keywords);
            matches.truncate(MAX_CATEGORY_MATCHES);
            let normalised = raw as f64 / text_length as f64 * 1000.0;
            scored.push((category, normalised, matches));
        }
    }

    // Stable: equal scores keep table order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut results: Vec<CategoryPrediction> = scored
        .into_iter()
        .take(max_categories)
        .filter(|(_, score, _)| *score >= threshold)
        .map(|(category, score, matches)| CategoryPrediction {
            category: category.to_string(),
            confidence: (score / 10.0).min(1.0),
            matched_keywords: matches,
        })
        .collect();

    if results.is_empty() {
        results.push(CategoryPrediction {
            category: FALLBACK_CATEGORY.to_string(),
            confidence: 0.5,
            matched_keywords: Vec::new(),
        });
    }

    debug!("Predicted {} categories", results.len());
    results
}

/// Pick the single severity level of `text`.
///
/// Raw counts compete directly: unlike categories there is no length
/// normalisation and no per-level weighting, so a text mentioning both
/// urgent and low-priority phrases lands on whichever has more literal
/// hits. Stored records depend on this scoring, so it stays as is.
///
/// Zero hits overall gives `Normal` at 0.5. Otherwise confidence is the
/// winner's share of all hits. Ties go to the more urgent level.
pub fn predict_severity(text: &str) -> SeverityPrediction {
    let lower = text.to_lowercase();

    let mut best: Option<(SeverityLevel, usize, Vec<String>)> = None;
    let mut total = 0usize;
    for (level, keywords) in SEVERITY_KEYWORDS {
        let (score, matches) = score_label(&lower, keywords);
        total += score;
        let better = match &best {
            Some((_, best_score, _)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((*level, score, matches));
        }
    }

    match best {
        Some((level, score, mut matches)) if score > 0 => {
            matches.truncate(MAX_SEVERITY_MATCHES);
            SeverityPrediction {
                level,
                confidence: (score as f64 / total as f64).min(1.0),
                matched_keywords: matches,
            }
        }
        _ => SeverityPrediction {
            level: SeverityLevel::Normal,
            confidence: 0.5,
            matched_keywords: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCENARIO_A: &str =
        "# Q4 Report\n\nThis is urgent and critical. Please review immediately.";

    #[test]
    fn scenario_report_category() {
        let cats = predict_categories(SCENARIO_A, 3, 0.1);
        assert_eq!(cats[0].category, "Report");
        assert_eq!(cats[0].confidence, 1.0);
        assert_eq!(cats[0].matched_keywords, vec!["report"]);
    }

    #[test]
    fn scenario_critical_severity() {
        let sev = predict_severity(SCENARIO_A);
        assert_eq!(sev.level, SeverityLevel::Critical);
        assert_eq!(sev.confidence, 1.0);
        assert!(sev.matched_keywords.contains(&"urgent".to_string()));
        assert!(sev.matched_keywords.contains(&"critical".to_string()));
    }

    #[test]
    fn no_keywords_falls_back_to_other() {
        let cats = predict_categories("zzz qqq xxx", 3, 0.1);
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].category, FALLBACK_CATEGORY);
        assert_eq!(cats[0].confidence, 0.5);
        assert!(cats[0].matched_keywords.is_empty());
    }

    #[test]
    fn empty_text_is_valid() {
        let cats = predict_categories("", 3, 0.1);
        assert_eq!(cats[0].category, "Other");
        let sev = predict_severity("");
        assert_eq!(sev.level, SeverityLevel::Normal);
        assert_eq!(sev.confidence, 0.5);
    }

    #[test]
    fn normalised_by_length() {
        // One hit in 2000 characters = 0.5 per 1000 chars.
        let mut text = "invoice ".to_string();
        text.push_str(&"x".repeat(2000 - text.len()));
        let cats = predict_categories(&text, 3, 0.1);
        let financial = cats.iter().find(|c| c.category == "Financial").unwrap();
        assert!((financial.confidence - 0.05).abs() < 1e-9);

        // Same hit, threshold above the score: nothing qualifies.
        let cats = predict_categories(&text, 3, 0.6);
        assert_eq!(cats[0].category, "Other");
    }

    #[test]
    fn truncates_to_max_categories() {
        let text = "business software contract invoice student patient report proposal research manual dear";
        let cats = predict_categories(text, 2, 0.1);
        assert_eq!(cats.len(), 2);
        for c in &cats {
            assert!((0.0..=1.0).contains(&c.confidence));
            assert!(c.matched_keywords.len() <= 5);
        }
    }

    #[test]
    fn multi_word_phrases_match() {
        let text = "Reminder: payment due on the total amount of all items.";
        let cats = predict_categories(text, 3, 0.1);
        let invoice = cats.iter().find(|c| c.category == "Invoice").unwrap();
        assert!(invoice.matched_keywords.contains(&"payment due".to_string()));
        assert!(invoice.matched_keywords.contains(&"total amount".to_string()));
    }

    #[test]
    fn uppercase_keyword_matches_case_insensitively() {
        let cats = predict_categories("The api api api gateway", 1, 0.1);
        assert_eq!(cats[0].category, "Technical");
        assert_eq!(cats[0].matched_keywords, vec!["API"]);
    }

    #[test]
    fn severity_raw_counts_compete() {
        // 3 low-priority hits beat 1 critical hit, with no length discount.
        let text = "urgent. optional optional fyi";
        let sev = predict_severity(text);
        assert_eq!(sev.level, SeverityLevel::LowPriority);
        assert!((sev.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn severity_substring_inside_words() {
        // "priority" is counted inside "low priority" as well.
        let sev = predict_severity("low priority");
        assert_eq!(sev.level, SeverityLevel::Important);
        assert_eq!(sev.confidence, 0.5);
    }

    #[test]
    fn severity_keeps_three_matches() {
        let sev = predict_severity("urgent critical emergency asap deadline");
        assert_eq!(sev.level, SeverityLevel::Critical);
        assert_eq!(sev.matched_keywords.len(), 3);
    }

    #[test]
    fn deterministic() {
        let a = (predict_categories(SCENARIO_A, 3, 0.1), predict_severity(SCENARIO_A));
        let b = (predict_categories(SCENARIO_A, 3, 0.1), predict_severity(SCENARIO_A));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn categories_bounded_and_confident(
            text in any::<String>(),
            max in 0usize..8,
            threshold in 0.0f64..5.0,
        ) {
            let predictions = predict_categories(&text, max, threshold);
            prop_assert!(!predictions.is_empty());
            prop_assert!(predictions.len() <= max.max(1));
            for p in &predictions {
                prop_assert!((0.0..=1.0).contains(&p.confidence));
                prop_assert!(p.matched_keywords.len() <= MAX_CATEGORY_MATCHES);
            }
            for pair in predictions.windows(2) {
                prop_assert!(pair[0].confidence >= pair[1].confidence);
                prop_assert_ne!(&pair[0].category, &pair[1].category);
            }
        }

        #[test]
        fn severity_is_one_level_with_bounded_confidence(text in any::<String>()) {
            let severity = predict_severity(&text);
            prop_assert!((0.0..=1.0).contains(&severity.confidence));
            prop_assert!(severity.confidence > 0.0);
            prop_assert!(severity.matched_keywords.len() <= MAX_SEVERITY_MATCHES);
            if severity.matched_keywords.is_empty() {
                prop_assert_eq!(severity.level, SeverityLevel::Normal);
                prop_assert_eq!(severity.confidence, 0.5);
            }
        }

        #[test]
        fn severity_keywords_appear_in_text(
            words in prop::collection::vec("urgent|critical|emergency|minor|routine|[a-z]{3,8}", 0..30)
        ) {
            let text = words.join(" ");
            let severity = predict_severity(&text);
            for kw in &severity.matched_keywords {
                prop_assert!(text.contains(kw.as_str()));
            }
        }
    }
}
