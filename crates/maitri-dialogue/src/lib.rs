//! Rule-based dialogue engine: a first-match keyword classifier feeding a
//! table of canned, partly vitals-aware replies.

use maitri_core::VitalsSnapshot;

pub mod intent;
pub mod responder;

pub use intent::{classify, Intent, IntentRule, INTENT_RULES};
pub use responder::{
    synthesize, template_for, Reply, ResponseTemplate, TemplateBody, DEFAULT_SUGGESTIONS,
    HEART_RATE_ELEVATED_ABOVE, O2_LOW_BELOW,
};

/// Classify `text` and synthesize the reply against `vitals`.
pub fn respond(text: &str, vitals: &VitalsSnapshot) -> Reply {
    synthesize(classify(text), vitals)
}
