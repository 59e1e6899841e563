use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Anxious,
    Vitals,
    Exercise,
    Sleep,
    Nutrition,
    DigitalTwin,
    Emergency,
    SystemStatus,
    Agents,
    About,
    Help,
    Default,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Anxious => "anxious",
            Intent::Vitals => "vitals",
            Intent::Exercise => "exercise",
            Intent::Sleep => "sleep",
            Intent::Nutrition => "nutrition",
            Intent::DigitalTwin => "digital_twin",
            Intent::Emergency => "emergency",
            Intent::SystemStatus => "system_status",
            Intent::Agents => "agents",
            Intent::About => "about",
            Intent::Help => "help",
            Intent::Default => "default",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
}

impl IntentRule {
    /// `lowered` must already be lower-cased. Matching is plain substring
    /// search, so "heartbreak" hits "heart" and "this" hits "hi".
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Evaluated top to bottom; the first rule with any hit decides.
pub const INTENT_RULES: [IntentRule; 12] = [
    IntentRule {
        intent: Intent::Greeting,
        keywords: &["hello", "hi", "hey", "greetings", "good morning", "good evening"],
    },
    IntentRule {
        intent: Intent::Anxious,
        keywords: &[
            "anxious",
            "stress",
            "worried",
            "nervous",
            "panic",
            "sad",
            "depressed",
            "lonely",
            "alone",
            "feeling down",
        ],
    },
    IntentRule {
        intent: Intent::Vitals,
        keywords: &["vital", "heart", "health", "oxygen", "o2", "temperature", "breath"],
    },
    IntentRule {
        intent: Intent::Exercise,
        keywords: &["exercise", "workout", "fitness", "training", "cardio", "strength"],
    },
    IntentRule {
        intent: Intent::Sleep,
        keywords: &["sleep", "tired", "exhausted", "rest", "insomnia", "bedtime"],
    },
    IntentRule {
        intent: Intent::Nutrition,
        keywords: &["food", "eat", "nutrition", "hungry", "meal", "water", "drink"],
    },
    IntentRule {
        intent: Intent::DigitalTwin,
        keywords: &["predict", "future", "simulation", "what if", "digital twin", "forecast"],
    },
    IntentRule {
        intent: Intent::Emergency,
        keywords: &["emergency", "danger", "alert", "critical", "warning"],
    },
    IntentRule {
        intent: Intent::SystemStatus,
        keywords: &["status", "system", "working", "operational", "performance", "how are you"],
    },
    IntentRule {
        intent: Intent::Agents,
        keywords: &["agent", "what can you do"],
    },
    IntentRule {
        intent: Intent::About,
        keywords: &["about", "who are you", "maitri"],
    },
    IntentRule {
        intent: Intent::Help,
        keywords: &["help", "how does", "guide", "tutorial", "commands"],
    },
];

pub fn classify(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::Default)
}
