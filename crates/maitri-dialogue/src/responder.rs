use crate::intent::Intent;
use maitri_core::{
    VitalsSnapshot, DEFAULT_CO2_LEVEL, DEFAULT_HEART_RATE, DEFAULT_O2_LEVEL, DEFAULT_STRESS_LEVEL,
    DEFAULT_TEMPERATURE,
};

pub const HEART_RATE_ELEVATED_ABOVE: f64 = 100.0;
pub const O2_LOW_BELOW: f64 = 95.0;

pub const DEFAULT_SUGGESTIONS: &[&str] = &[
    "Show my vitals",
    "What agents do you have?",
    "Generate a workout",
    "How are you?",
];

const GREETING_SUGGESTIONS: &[&str] = &[
    "Show my vitals",
    "What agents do you have?",
    "I'm feeling anxious",
    "Generate a workout",
];
const ANXIOUS_SUGGESTIONS: &[&str] = &[
    "Let's do breathing",
    "Play calming music",
    "I want to talk",
    "Connect me with someone",
];
const VITALS_SUGGESTIONS: &[&str] = &[
    "Show detailed analysis",
    "Check for anomalies",
    "What do these numbers mean?",
];
const EXERCISE_SUGGESTIONS: &[&str] = &[
    "Create workout plan",
    "Show exercise history",
    "Best exercises for bones",
];
const SLEEP_SUGGESTIONS: &[&str] = &[
    "Show sleep analysis",
    "Optimize my schedule",
    "Set up smart alarm",
];
const NUTRITION_SUGGESTIONS: &[&str] = &["Generate meal plan", "Check inventory", "Track hydration"];
const DIGITAL_TWIN_SUGGESTIONS: &[&str] = &[
    "Predict my fatigue",
    "What if I skip exercise?",
    "Best time for tasks?",
];
const SYSTEM_STATUS_SUGGESTIONS: &[&str] = &[
    "Show agent status",
    "Performance metrics",
    "Any active alerts?",
];

#[derive(Debug, Clone, Copy)]
pub enum TemplateBody {
    Fixed(&'static str),
    Vitals(fn(&VitalsSnapshot) -> String),
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseTemplate {
    pub intent: Intent,
    pub body: TemplateBody,
    pub suggestions: Option<&'static [&'static str]>,
}

impl ResponseTemplate {
    pub fn render(&self, vitals: &VitalsSnapshot) -> String {
        match self.body {
            TemplateBody::Fixed(text) => text.to_string(),
            TemplateBody::Vitals(render) => render(vitals),
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        self.suggestions.unwrap_or(DEFAULT_SUGGESTIONS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub intent: Intent,
    pub text: String,
    pub suggestions: Vec<String>,
}

pub fn synthesize(intent: Intent, vitals: &VitalsSnapshot) -> Reply {
    let template = template_for(intent);
    Reply {
        intent,
        text: template.render(vitals),
        suggestions: template
            .suggestions()
            .iter()
            .map(|suggestion| suggestion.to_string())
            .collect(),
    }
}

pub fn template_for(intent: Intent) -> ResponseTemplate {
    let (body, suggestions) = match intent {
        Intent::Greeting => (TemplateBody::Fixed(GREETING), Some(GREETING_SUGGESTIONS)),
        Intent::Anxious => (TemplateBody::Fixed(ANXIOUS), Some(ANXIOUS_SUGGESTIONS)),
        Intent::Vitals => (TemplateBody::Vitals(render_vitals), Some(VITALS_SUGGESTIONS)),
        Intent::Exercise => (TemplateBody::Fixed(EXERCISE), Some(EXERCISE_SUGGESTIONS)),
        Intent::Sleep => (TemplateBody::Fixed(SLEEP), Some(SLEEP_SUGGESTIONS)),
        Intent::Nutrition => (TemplateBody::Fixed(NUTRITION), Some(NUTRITION_SUGGESTIONS)),
        Intent::DigitalTwin => (
            TemplateBody::Fixed(DIGITAL_TWIN),
            Some(DIGITAL_TWIN_SUGGESTIONS),
        ),
        Intent::SystemStatus => (
            TemplateBody::Vitals(render_system_status),
            Some(SYSTEM_STATUS_SUGGESTIONS),
        ),
        Intent::Emergency => (TemplateBody::Fixed(EMERGENCY), None),
        Intent::Agents => (TemplateBody::Fixed(AGENTS), None),
        Intent::About => (TemplateBody::Fixed(ABOUT), None),
        Intent::Help => (TemplateBody::Fixed(HELP), None),
        Intent::Default => (TemplateBody::Fixed(FALLBACK), None),
    };
    ResponseTemplate {
        intent,
        body,
        suggestions,
    }
}

fn render_vitals(vitals: &VitalsSnapshot) -> String {
    let heart_rate = vitals.heart_rate.unwrap_or(DEFAULT_HEART_RATE);
    let o2_level = vitals.o2_level.unwrap_or(DEFAULT_O2_LEVEL);
    let temperature = vitals.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    let co2_level = vitals.co2_level.unwrap_or(DEFAULT_CO2_LEVEL);
    let heart_note = if heart_rate > HEART_RATE_ELEVATED_ABOVE {
        "(elevated)"
    } else {
        "(normal)"
    };
    let o2_note = if o2_level < O2_LOW_BELOW {
        "(low - rest recommended)"
    } else {
        "(optimal)"
    };
    format!(
        "**Vitals Monitor here:** Current readings:\n\
         - Heart Rate: **{heart_rate} bpm** {heart_note}\n\
         - O2 Saturation: **{o2_level}%** {o2_note}\n\
         - Temperature: **{temperature}°C** (normal)\n\
         - CO2: **{co2_level}%** (normal)\n\
         \n\
         All readings within acceptable parameters. Would you like me to explain any of these in more detail?"
    )
}

fn render_system_status(vitals: &VitalsSnapshot) -> String {
    let heart_rate = vitals.heart_rate.unwrap_or(DEFAULT_HEART_RATE);
    let o2_level = vitals.o2_level.unwrap_or(DEFAULT_O2_LEVEL);
    let stress_level = vitals.stress_level.unwrap_or(DEFAULT_STRESS_LEVEL);
    format!(
        "**Orchestrator here:** All systems operational!\n\
         \n\
         **System Status:**\n\
         - Agents Active: 10/10\n\
         - WebSocket: Connected\n\
         - Response Time: 47ms avg\n\
         - Memory Usage: 42%\n\
         - CPU Load: 23%\n\
         \n\
         **Your Vitals:**\n\
         - HR: {heart_rate} bpm\n\
         - O2: {o2_level}%\n\
         - Sleep: 82% quality\n\
         - Stress: {stress_level}% (low)\n\
         \n\
         Everything looks healthy! What would you like to explore?"
    )
}

const GREETING: &str = "**Orchestrator here:** Hello, Commander! I'm MAITRI, your mission well-being assistant.

I coordinate a crew of specialized agents watching over your health, mood, and schedule. Ask me about your vitals, sleep, exercise, nutrition, or just tell me how you're feeling.";

const ANXIOUS: &str = "**Counselor Agent here:** I'm here for you. Let's check your vitals... I see your heart rate is slightly elevated, which is a natural response to stress.

**Try this grounding technique:**
Name 5 things you can see → 4 you can touch → 3 you can hear → 2 you can smell → 1 you can taste.

Or we could do the 4-7-8 breathing: Inhale 4s, hold 7s, exhale 8s.

Would you like me to:
1. Play some calming music?
2. Connect you with a crew member?
3. Schedule a session with the mission psychologist?";

const EXERCISE: &str = "**Exercise Coach here:** Ready to get moving! Here are your options:

**Today's Recommendations:**
- **Morning Cardio** - 30 min cycle session (08:00)
- **Resistance Training** - ARED workout (14:00)
- **Evening Stretch** - 15 min flexibility (20:00)

In microgravity, we need **2+ hours daily** to prevent muscle atrophy and bone loss.

Would you like me to:
1. Generate a custom workout plan?
2. Show your exercise history?
3. Explain the best exercises for bone health?";

const SLEEP: &str = "**Sleep Analyst here:** Let me check your recent sleep data...

**Last 7 Days Average:**
- Sleep Duration: 6.8 hours (target: 7-8)
- Sleep Efficiency: 82%
- Deep Sleep: 22% (optimal: 20-25%)

**Recommendations:**
1. Maintain consistent bedtime (target: 22:30)
2. Reduce screen time 1 hour before sleep
3. Consider a 20-min afternoon nap

Would you like me to:
1. Show detailed sleep analysis?
2. Optimize your sleep schedule?
3. Set up a smart alarm?";

const NUTRITION: &str = "**Nutrition Agent here:** Here's your daily nutrition summary:

**Today's Intake:**
- Breakfast: 380 cal (completed 07:00)
- Lunch: 450 cal (completed 12:30)
- Dinner: Pending (18:00)
- Snacks: 170 cal

**Hydration:** 1,800ml / 2,500ml target (72%)

**Space Food Tip:** All our meals are formulated to maintain bone density in microgravity!

Would you like me to:
1. Generate tomorrow's meal plan?
2. Check food inventory?
3. Track hydration more closely?";

const DIGITAL_TWIN: &str = "**Digital Twin here:** I've analyzed your patterns...

**24-Hour Prediction:**
- Fatigue Peak: 68% at 16:00 UTC
- Best Performance Window: 10:00-14:00
- Recommended Rest: 20:00

**If you skip exercise today:**
- Muscle atrophy risk: +5%
- Energy levels tomorrow: -12%

**If you sleep extra 1 hour:**
- Cognitive performance: +15%
- Reaction time improvement: +8%

Would you like me to run a specific simulation?";

const EMERGENCY: &str = "**Alert Agent here:** **EMERGENCY PROTOCOLS ACTIVE**

If this is a real emergency:
1. **STAY CALM** - Panic increases heart rate
2. **CHECK YOURSELF** - Are you conscious? Breathing?
3. **PRESS EMERGENCY BUTTON** on your console
4. **RADIO MISSION CONTROL** immediately

**Current Alert Status:** All systems normal

For non-emergencies, I'm happy to help! What do you need?";

const AGENTS: &str = "**Orchestrator here:** We have 10 specialized agents working together:

**Physical Cluster:**
- **Vitals Monitor** - Tracks heart rate, O2, CO2, temperature
- **Exercise Coach** - Personalized microgravity workouts
- **Sleep Analyst** - Sleep cycle analysis & optimization
- **Nutrition Agent** - Meal planning & inventory

**Psychological Cluster:**
- **Counselor Agent** - CBT-based emotional support
- **Mood Detector** - Emotion detection from text & vitals
- **Social Agent** - Crew morale & communication

**Intelligence Cluster:**
- **Alert Agent** - Emergency detection & protocols
- **Digital Twin** - Predictive simulations
- **Orchestrator** - Task coordination (that's me!)

Which agent would you like to learn more about?";

const ABOUT: &str = "**Orchestrator here:** MAITRI (Mental & physical AI Assistant for astronauts) is a multi-agent system that monitors and supports astronaut well-being during space missions.

We use **10 specialized agents** that work together to track physical health, provide psychological support, manage mission tasks, and predict potential issues before they become critical.

**Our Capabilities:**
- Real-time vitals monitoring
- Psychological counseling with CBT
- Personalized exercise planning
- Sleep quality analysis
- Nutrition tracking
- Emergency detection
- Predictive simulations

How can I help you today?";

const HELP: &str = "**Orchestrator here:** Here's what I can help you with:

**Just Talk:**
- \"I'm feeling anxious\" → Counselor support
- \"Show my vitals\" → Health data
- \"Generate workout\" → Exercise plan

**Ask About:**
- Any specific agent and their function
- Your health metrics and trends
- System status and performance

**Troubleshooting:**
- \"Not responding\" → Check connections
- \"Vitals not updating\" → Restart the console

**Pro Tips:**
- Ask specific agents directly: \"Vitals, show my heart rate\"
- Ask \"what if\" scenarios: Digital Twin predictions

What would you like to explore?";

const FALLBACK: &str = "**Orchestrator here:** I'm not sure I understood that. Could you rephrase it? I'm optimized for questions about:
- Your vitals and health
- Exercise and sleep
- Nutrition and meals
- Agent capabilities
- System status";
