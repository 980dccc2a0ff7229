//! Deterministic replies for small talk and simple utility questions.
//!
//! A table of [`Intent`]s, each with its own patterns, is checked top to
//! bottom. The first intent whose pattern matches produces the reply,
//! unless its responder declines (for example a reminder whose delay
//! cannot be parsed), in which case the scan continues.
//!
//! An overloaded mood short-circuits everything except a greeting with the
//! cooldown reply, relieving some stress. An exhausted budget still lets the
//! table answer and yields the exhausted reply for anything else.

use chrono::{DateTime, Duration, Local, Utc};
use regex_lite::Regex;
use thriftbot_governor::{Feeling, Vitals};
use thriftbot_session::SessionStore;
use thriftbot_tools::ReminderRegistry;
use tracing::{debug, warn};

/// Sent instead of calling the LLM once the daily budget is spent.
pub const BUDGET_EXHAUSTED_REPLY: &str =
    "I've used up today's thinking budget. I can still do quick things like the time, \
     reminders or a hello, and I'll be fully back after midnight.";

/// Sent when stress is too high to take on a full request.
pub const COOLDOWN_REPLY: &str =
    "I'm a bit overwhelmed right now. Give me a moment to cool down and ask me again shortly.";

/// Recognised quick intents, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    HowAreYou,
    Thanks,
    Time,
    Date,
    Repeat,
    QuickReminder,
    BudgetStatus,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::Greeting,
        Intent::HowAreYou,
        Intent::Thanks,
        Intent::Time,
        Intent::Date,
        Intent::Repeat,
        Intent::QuickReminder,
        Intent::BudgetStatus,
    ];

    fn patterns(self) -> &'static [&'static str] {
        match self {
            Intent::Greeting => &[
                r"^(hi|hello|hey|hiya|howdy|yo|good (morning|afternoon|evening))( there)?[!. ]*$",
            ],
            Intent::HowAreYou => &[
                r"^how are (you|u)( doing| today)?[?!. ]*$",
                r"^how('s| is) it going[?!. ]*$",
            ],
            Intent::Thanks => &[r"^(thanks|thank you|thx|ty|cheers)( so much| a lot)?[!. ]*$"],
            Intent::Time => &[
                r"^what time is it[?. ]*$",
                r"^what('s| is) the time[?. ]*$",
            ],
            Intent::Date => &[
                r"^what('s| is) (the date|today's date)( today)?[?. ]*$",
                r"^what day is (it|today)[?. ]*$",
            ],
            Intent::Repeat => &[
                r"^what did you (just )?say[?. ]*$",
                r"^(say that again|repeat that|come again)[?!. ]*$",
            ],
            Intent::QuickReminder => {
                &[r"^remind me in (\S+) (minutes?|mins?|hours?|hrs?) to (.+?)[.!]*$"]
            }
            Intent::BudgetStatus => &[
                r"^(budget|usage|budget status)[?. ]*$",
                r"^how much budget (is )?left[?. ]*$",
            ],
        }
    }
}

/// A reply produced without the LLM.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickReply {
    /// `None` for the exhausted and cooldown overrides
    pub intent: Option<Intent>,
    pub text: String,
}

/// What a responder may look at.
pub struct QuickContext<'a> {
    pub chat_id: &'a str,
    pub sessions: &'a SessionStore,
    pub vitals: &'a Vitals,
    pub reminders: &'a ReminderRegistry,
    pub now: DateTime<Utc>,
}

struct Rule {
    intent: Intent,
    patterns: Vec<Regex>,
}

pub struct QuickMatcher {
    rules: Vec<Rule>,
}

impl QuickMatcher {
    pub fn new() -> Self {
        let rules = Intent::ALL
            .iter()
            .map(|&intent| Rule {
                intent,
                patterns: intent
                    .patterns()
                    .iter()
                    .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!(?intent, error = %e, "Skipping invalid quick pattern");
                            None
                        }
                    })
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    /// A reply for `text`, or `None` to hand it to the LLM.
    pub fn try_match(&self, text: &str, ctx: &QuickContext<'_>) -> Option<QuickReply> {
        let normalized = text.trim();
        let overloaded = ctx.vitals.mood().is_overloaded();

        for rule in &self.rules {
            if overloaded && rule.intent != Intent::Greeting {
                continue;
            }
            for re in &rule.patterns {
                let Some(caps) = re.captures(normalized) else {
                    continue;
                };
                if let Some(text) = respond(rule.intent, &caps, ctx) {
                    debug!(chat_id = ctx.chat_id, intent = ?rule.intent, "Quick response");
                    return Some(QuickReply {
                        intent: Some(rule.intent),
                        text,
                    });
                }
            }
        }

        if overloaded {
            let mut mood = ctx.vitals.mood();
            mood.cooldown_surfaced();
            debug!(chat_id = ctx.chat_id, stress = mood.stress(), "Cooldown surfaced");
            return Some(QuickReply {
                intent: None,
                text: COOLDOWN_REPLY.into(),
            });
        }

        if ctx.vitals.usage_ratio() >= 1.0 {
            return Some(QuickReply {
                intent: None,
                text: BUDGET_EXHAUSTED_REPLY.into(),
            });
        }

        None
    }
}

impl Default for QuickMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn respond(intent: Intent, caps: &regex_lite::Captures<'_>, ctx: &QuickContext<'_>) -> Option<String> {
    let local = ctx.now.with_timezone(&Local);
    match intent {
        Intent::Greeting => Some("Hey! What can I do for you?".into()),
        Intent::HowAreYou => {
            let feeling = ctx.vitals.mood().feeling();
            Some(
                match feeling {
                    Feeling::Frazzled => "Honestly a little frazzled, but hanging in there. What do you need?",
                    Feeling::Tired => "Running a bit low on energy, but happy to help.",
                    Feeling::Curious => "Wide awake and curious! What's on your mind?",
                    Feeling::Content => "Doing well, thanks for asking! How about you?",
                }
                .into(),
            )
        }
        Intent::Thanks => Some("You're welcome!".into()),
        Intent::Time => Some(format!("It's {}.", local.format("%H:%M"))),
        Intent::Date => Some(format!("Today is {}.", local.format("%A, %B %-d, %Y"))),
        Intent::Repeat => Some(
            ctx.sessions
                .last_assistant_message(ctx.chat_id)
                .unwrap_or_else(|| "I haven't said anything in this chat yet.".into()),
        ),
        Intent::QuickReminder => {
            let amount = parse_amount(caps.get(1)?.as_str())?;
            let unit = caps.get(2)?.as_str().to_lowercase();
            let task = caps.get(3)?.as_str().trim();
            if task.is_empty() {
                return None;
            }
            let delay = if unit.starts_with('h') {
                Duration::hours(amount)
            } else {
                Duration::minutes(amount)
            };
            let reminder = ctx.reminders.add(ctx.chat_id, task, ctx.now + delay);
            Some(format!(
                "Got it, I'll remind you at {} to {}.",
                reminder.due_at.with_timezone(&Local).format("%H:%M"),
                reminder.message
            ))
        }
        Intent::BudgetStatus => {
            let budget = ctx.vitals.budget().clone();
            Some(format!(
                "I've used {} of {} tokens today ({:.0}%). The budget resets at {}.",
                budget.used(),
                budget.budget(),
                budget.usage_ratio() * 100.0,
                budget.reset_at().with_timezone(&Local).format("%H:%M")
            ))
        }
    }
}

/// "5", "an" or "a" as a positive count; anything else declines.
fn parse_amount(raw: &str) -> Option<i64> {
    let amount = match raw.to_lowercase().as_str() {
        "a" | "an" | "one" => 1,
        other => other.parse::<i64>().ok()?,
    };
    (1..=7 * 24 * 60).contains(&amount).then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use thriftbot_governor::{ModelTiers, MoodState, TokenBudget};
    use thriftbot_session::{SessionRole, StoreConfig};

    struct Fixture {
        _dir: TempDir,
        sessions: SessionStore,
        vitals: Vitals,
        reminders: ReminderRegistry,
    }

    impl Fixture {
        fn new(mood: MoodState, used: u64) -> Self {
            let dir = TempDir::new().unwrap();
            let sessions = SessionStore::new(dir.path(), StoreConfig::default());
            let tiers = ModelTiers {
                normal: "sonnet".into(),
                fallback: "haiku".into(),
                capable: None,
                max_tokens: 2048,
                max_history: 40,
            };
            let mut budget = TokenBudget::new(1_000);
            budget.record(used);
            Self {
                _dir: dir,
                sessions,
                vitals: Vitals::new(budget, mood, tiers),
                reminders: ReminderRegistry::new(),
            }
        }

        fn calm() -> Self {
            Self::new(MoodState::with_levels(80.0, 10.0, 50.0), 0)
        }

        fn ctx(&self) -> QuickContext<'_> {
            QuickContext {
                chat_id: "c",
                sessions: &self.sessions,
                vitals: &self.vitals,
                reminders: &self.reminders,
                now: Utc::now(),
            }
        }
    }

    #[test]
    fn hi_is_a_greeting_in_any_mood() {
        let matcher = QuickMatcher::new();
        let fixtures = [
            Fixture::calm(),
            Fixture::new(MoodState::with_levels(5.0, 95.0, 0.0), 0),
            Fixture::new(MoodState::with_levels(50.0, 50.0, 50.0), 5_000),
        ];
        for f in &fixtures {
            let reply = matcher.try_match("hi", &f.ctx()).unwrap();
            assert_eq!(reply.intent, Some(Intent::Greeting));
        }
        assert_eq!(
            matcher.try_match("Hello there!", &fixtures[0].ctx()).unwrap().intent,
            Some(Intent::Greeting)
        );
    }

    #[test]
    fn open_questions_fall_through() {
        let f = Fixture::calm();
        let matcher = QuickMatcher::new();
        assert!(matcher.try_match("explain borrow checking", &f.ctx()).is_none());
        assert!(matcher.try_match("hi, can you plan my week?", &f.ctx()).is_none());
    }

    #[test]
    fn how_are_you_follows_mood() {
        let matcher = QuickMatcher::new();
        let tired = Fixture::new(MoodState::with_levels(10.0, 10.0, 50.0), 0);
        let curious = Fixture::new(MoodState::with_levels(90.0, 10.0, 95.0), 0);

        let a = matcher.try_match("how are you?", &tired.ctx()).unwrap();
        let b = matcher.try_match("How are you doing", &curious.ctx()).unwrap();
        assert_eq!(a.intent, Some(Intent::HowAreYou));
        assert!(a.text.contains("low on energy"));
        assert!(b.text.contains("curious"));
    }

    #[test]
    fn repeat_returns_last_answer() {
        let f = Fixture::calm();
        let matcher = QuickMatcher::new();
        let first = matcher.try_match("what did you say?", &f.ctx()).unwrap();
        assert!(first.text.contains("haven't said"));

        f.sessions.append("c", SessionRole::User, "capital of France?");
        f.sessions.append("c", SessionRole::Assistant, "Paris.");
        let again = matcher.try_match("what did you say?", &f.ctx()).unwrap();
        assert_eq!(again.text, "Paris.");
    }

    #[test]
    fn quick_reminder_registers() {
        let f = Fixture::calm();
        let matcher = QuickMatcher::new();
        let reply = matcher
            .try_match("remind me in 10 minutes to check the oven", &f.ctx())
            .unwrap();
        assert_eq!(reply.intent, Some(Intent::QuickReminder));
        assert!(reply.text.contains("check the oven"));

        let list = f.reminders.list("c");
        assert_eq!(list.len(), 1);
        let delay = list[0].due_at - Utc::now();
        assert!(delay > Duration::minutes(9) && delay <= Duration::minutes(10));

        matcher.try_match("Remind me in an hour to call mum", &f.ctx()).unwrap();
        assert_eq!(f.reminders.len(), 2);
    }

    #[test]
    fn malformed_reminder_falls_through() {
        let f = Fixture::calm();
        let matcher = QuickMatcher::new();
        assert!(matcher.try_match("remind me in a few minutes to stretch", &f.ctx()).is_none());
        assert!(matcher.try_match("remind me in 0 minutes to stretch", &f.ctx()).is_none());
        assert!(f.reminders.is_empty());
    }

    #[test]
    fn exhausted_budget_answers_only_after_table() {
        let f = Fixture::new(MoodState::with_levels(80.0, 10.0, 50.0), 1_000);
        let matcher = QuickMatcher::new();

        let time = matcher.try_match("what time is it?", &f.ctx()).unwrap();
        assert_eq!(time.intent, Some(Intent::Time));

        let other = matcher.try_match("write me a poem", &f.ctx()).unwrap();
        assert_eq!(other.intent, None);
        assert_eq!(other.text, BUDGET_EXHAUSTED_REPLY);
    }

    #[test]
    fn overload_surfaces_cooldown_and_relieves_stress() {
        let f = Fixture::new(MoodState::with_levels(80.0, 85.0, 50.0), 0);
        let matcher = QuickMatcher::new();

        let reply = matcher.try_match("summarise this article", &f.ctx()).unwrap();
        assert_eq!(reply.text, COOLDOWN_REPLY);
        assert_eq!(f.vitals.mood().stress(), 75.0);

        // Below the threshold now
        assert!(matcher.try_match("summarise this article", &f.ctx()).is_none());
    }

    #[test]
    fn overload_preempts_utility_intents_but_not_greetings() {
        let f = Fixture::new(MoodState::with_levels(80.0, 90.0, 50.0), 1_000);
        let matcher = QuickMatcher::new();

        let time = matcher.try_match("what time is it?", &f.ctx()).unwrap();
        assert_eq!(time.intent, None);
        assert_eq!(time.text, COOLDOWN_REPLY);
        assert_eq!(f.vitals.mood().stress(), 80.0);

        let hello = matcher.try_match("hi", &f.ctx()).unwrap();
        assert_eq!(hello.intent, Some(Intent::Greeting));
        assert_eq!(f.vitals.mood().stress(), 80.0);
    }

    #[test]
    fn budget_status_reports_usage() {
        let f = Fixture::new(MoodState::default(), 250);
        let reply = QuickMatcher::new().try_match("budget?", &f.ctx()).unwrap();
        assert!(reply.text.contains("250 of 1000"));
        assert!(reply.text.contains("25%"));
    }

    #[test]
    fn every_pattern_compiles() {
        let matcher = QuickMatcher::new();
        for rule in &matcher.rules {
            assert_eq!(rule.patterns.len(), rule.intent.patterns().len());
        }
    }
}
