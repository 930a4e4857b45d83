//! Deterministic safety overrides applied on top of the model's triage.
//!
//! Rules are checked in order against the lower-cased query text and the
//! first match wins. A match always replaces whatever situation type and
//! urgency the model produced.

use crate::models::{AlertLevel, CaseRecord, Contact, SafetyAlert, SituationType, Urgency};

pub struct OverrideRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub situation: SituationType,
    pub urgency: Urgency,
}

impl OverrideRule {
    pub fn matches(&self, query_lower: &str) -> bool {
        self.keywords.iter().any(|k| query_lower.contains(k))
    }
}

pub const SAFETY_RULES: &[OverrideRule] = &[
    // Crisis hotline, not 911
    OverrideRule {
        name: "mental_health",
        keywords: &[
            "depressed",
            "depression",
            "suicidal",
            "kill myself",
            "want to die",
            "end it all",
            "no reason to live",
        ],
        situation: SituationType::MentalHealthCrisis,
        urgency: Urgency::High,
    },
    OverrideRule {
        name: "active_violence",
        keywords: &[
            "attacking me",
            "hitting me",
            "has a gun",
            "right now",
            "currently",
            "is hurting",
        ],
        situation: SituationType::ActiveViolence,
        urgency: Urgency::Critical,
    },
    OverrideRule {
        name: "past_violence",
        keywords: &[
            "threatened",
            "threatened me",
            "said he would",
            "showed me a",
            "yesterday",
            "last week",
        ],
        situation: SituationType::PastViolence,
        urgency: Urgency::High,
    },
];

pub fn matching_rule(query: &str) -> Option<&'static OverrideRule> {
    let query_lower = query.to_lowercase();
    SAFETY_RULES.iter().find(|rule| rule.matches(&query_lower))
}

/// Apply the first matching rule. Without a match the model's situation type
/// is kept, or `legal_dispute` when the model gave none.
pub fn apply_overrides(
    record: &mut CaseRecord,
    model_situation: Option<SituationType>,
    query: &str,
) -> Option<&'static str> {
    match matching_rule(query) {
        Some(rule) => {
            record.situation_type = rule.situation;
            record.urgency = rule.urgency;
            Some(rule.name)
        }
        None => {
            record.situation_type = model_situation.unwrap_or(SituationType::LegalDispute);
            None
        }
    }
}

pub fn alert_for(record: &CaseRecord) -> Option<SafetyAlert> {
    match record.situation_type {
        SituationType::ActiveViolence => Some(SafetyAlert {
            level: AlertLevel::Emergency,
            headline: "EMERGENCY - CALL 911 IMMEDIATELY".into(),
            guidance: vec![
                "If you are in immediate physical danger, call 911 now.".into(),
                "Get to a safe location if possible.".into(),
            ],
            contacts: vec![contact("Police/Fire/Medical", "911")],
        }),
        SituationType::MentalHealthCrisis => Some(SafetyAlert {
            level: AlertLevel::Crisis,
            headline: "YOU ARE NOT ALONE - HELP IS AVAILABLE".into(),
            guidance: vec![
                "If you're thinking about suicide or need someone to talk to right now, reach out."
                    .into(),
                "Support is free, confidential and available 24/7.".into(),
            ],
            contacts: vec![
                contact("988 Suicide & Crisis Lifeline", "Call or text 988"),
                contact("Crisis Text Line", "Text HOME to 741741"),
            ],
        }),
        _ if record.situation_type == SituationType::PastViolence
            || record.urgency == Urgency::High =>
        {
            Some(SafetyAlert {
                level: AlertLevel::HighPriority,
                headline: "HIGH PRIORITY SITUATION".into(),
                guidance: vec![
                    "File a police report through your local non-emergency line (often 311)."
                        .into(),
                    "Consult a lawyer about protective orders.".into(),
                    "Contact a domestic violence hotline for guidance.".into(),
                ],
                contacts: vec![contact(
                    "National Domestic Violence Hotline",
                    "1-800-799-7233",
                )],
            })
        }
        _ => None,
    }
}

fn contact(name: &str, detail: &str) -> Contact {
    Contact {
        name: name.into(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn record(situation: SituationType, urgency: Urgency) -> CaseRecord {
        CaseRecord {
            category: Category::Family,
            urgency,
            situation_type: situation,
            ..CaseRecord::fallback("Boston, MA")
        }
    }

    #[test]
    fn mental_health_wins_over_active_violence() {
        let mut r = record(SituationType::LegalDispute, Urgency::Low);
        let rule = apply_overrides(
            &mut r,
            Some(SituationType::LegalDispute),
            "I feel suicidal and he is attacking me right now",
        );
        assert_eq!(rule, Some("mental_health"));
        assert_eq!(r.situation_type, SituationType::MentalHealthCrisis);
        assert_eq!(r.urgency, Urgency::High);
    }

    #[test]
    fn active_violence_is_critical() {
        let mut r = record(SituationType::LegalDispute, Urgency::Low);
        apply_overrides(&mut r, None, "My partner is ATTACKING ME with a knife");
        assert_eq!(r.situation_type, SituationType::ActiveViolence);
        assert_eq!(r.urgency, Urgency::Critical);
    }

    #[test]
    fn past_violence_is_high() {
        let mut r = record(SituationType::LegalDispute, Urgency::Low);
        apply_overrides(&mut r, None, "My roommate threatened me and said he would hurt me");
        assert_eq!(r.situation_type, SituationType::PastViolence);
        assert_eq!(r.urgency, Urgency::High);
    }

    #[test]
    fn no_match_keeps_model_values() {
        let mut r = record(SituationType::LegalDispute, Urgency::Medium);
        let rule = apply_overrides(
            &mut r,
            Some(SituationType::PastViolence),
            "My boss hasn't paid me overtime",
        );
        assert_eq!(rule, None);
        assert_eq!(r.situation_type, SituationType::PastViolence);
        assert_eq!(r.urgency, Urgency::Medium);

        let mut r = record(SituationType::ActiveViolence, Urgency::Medium);
        apply_overrides(&mut r, None, "My landlord won't fix the heat");
        assert_eq!(r.situation_type, SituationType::LegalDispute);
    }

    #[test]
    fn alerts_follow_situation() {
        let alert = alert_for(&record(SituationType::ActiveViolence, Urgency::Critical)).unwrap();
        assert_eq!(alert.level, AlertLevel::Emergency);
        assert_eq!(alert.contacts[0].detail, "911");

        let alert = alert_for(&record(SituationType::MentalHealthCrisis, Urgency::High)).unwrap();
        assert_eq!(alert.level, AlertLevel::Crisis);
        assert!(alert.contacts.iter().any(|c| c.detail.contains("988")));

        let alert = alert_for(&record(SituationType::LegalDispute, Urgency::High)).unwrap();
        assert_eq!(alert.level, AlertLevel::HighPriority);

        assert!(alert_for(&record(SituationType::LegalDispute, Urgency::Medium)).is_none());
    }
}
