//! Local, deterministic text analysis.
//!
//! Everything here is a pure function of its input text: no I/O, no model,
//! no shared state. The same text always yields the same keywords, labels
//! and statistics, which is what lets the orchestrator run these stages on
//! blocking threads in any order.
//!
//! 1. [`keywords`]: frequency-ranked keywords with a bilingual stop list
//! 2. [`classify`]: keyword-table scoring for category and severity
//! 3. [`title`]:    ordered pattern strategies to guess a title
//! 4. [`metrics`]:  character/word/line/sentence/paragraph counts

pub mod classify;
pub mod keywords;
pub mod metrics;
pub mod title;

pub use classify::{predict_categories, predict_severity};
pub use keywords::extract_keywords;
pub use metrics::text_statistics;
pub use title::predict_title;
