//! Clarification exchange with the reasoning service
//!
//! The exchange is a small state machine:
//!
//! ```text
//! AwaitingInitialResponse -> Valid | AwaitingClarification | RoundsExhausted
//! AwaitingClarification   -> Valid | AwaitingClarification | RoundsExhausted
//! ```
//!
//! `Valid` and `RoundsExhausted` are terminal. Every response counts as one
//! round, the initial one included.

use super::client::ChatMessage;
use crate::models::{ConditionClass, EvaluationDetails, HourlyEvaluation};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    AwaitingInitialResponse,
    AwaitingClarification,
    Valid,
    RoundsExhausted,
}

impl ExchangeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Valid | ExchangeState::RoundsExhausted)
    }
}

/// Candidate evaluation that passed structural validation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub flyable: bool,
    pub rating: u8,
    pub confidence: u8,
    pub conditions: ConditionClass,
    pub summary: String,
    pub details: EvaluationDetails,
    pub recommendation: String,
    pub hourly_evaluations: Vec<HourlyEvaluation>,
}

/// Why a response could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseIssue {
    Malformed(String),
    ClarificationRequested(Option<String>),
}

impl fmt::Display for ResponseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseIssue::Malformed(reason) => write!(f, "{reason}"),
            ResponseIssue::ClarificationRequested(Some(question)) => {
                write!(f, "you asked for clarification ({question})")
            }
            ResponseIssue::ClarificationRequested(None) => {
                write!(f, "you asked for clarification")
            }
        }
    }
}

/// Result of feeding one response into the exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Valid(ParsedEvaluation),
    /// Send a clarification prompt for `round`
    Clarify { issue: ResponseIssue, round: u32 },
    Exhausted { issue: ResponseIssue },
}

/// Message history and round accounting for one location
#[derive(Debug, Clone)]
pub struct ClarificationExchange {
    messages: Vec<ChatMessage>,
    max_rounds: u32,
    rounds: u32,
    state: ExchangeState,
}

impl ClarificationExchange {
    #[must_use]
    pub fn new(system_prompt: String, initial_prompt: String, max_rounds: u32) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(initial_prompt),
            ],
            max_rounds: max_rounds.max(1),
            rounds: 0,
            state: ExchangeState::AwaitingInitialResponse,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Responses received so far
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Record a response and advance the state machine
    pub fn receive(&mut self, content: &str) -> Step {
        debug_assert!(!self.state.is_terminal(), "response after terminal state");

        self.messages.push(ChatMessage::assistant(content));
        self.rounds += 1;

        match parse_response(content) {
            Ok(evaluation) => {
                self.state = ExchangeState::Valid;
                Step::Valid(evaluation)
            }
            Err(issue) if self.rounds >= self.max_rounds => {
                self.state = ExchangeState::RoundsExhausted;
                Step::Exhausted { issue }
            }
            Err(issue) => {
                debug!("Round {} unusable: {}", self.rounds, issue);
                self.state = ExchangeState::AwaitingClarification;
                Step::Clarify {
                    issue,
                    round: self.rounds + 1,
                }
            }
        }
    }

    /// Append the follow-up prompt for the next round
    pub fn ask(&mut self, prompt: String) {
        debug_assert_eq!(self.state, ExchangeState::AwaitingClarification);
        self.messages.push(ChatMessage::user(prompt));
    }
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    wind: Option<String>,
    #[serde(alias = "thermik")]
    thermal: Option<String>,
    risks: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHourly {
    hour: Option<f64>,
    timestamp: Option<String>,
    conditions: Option<String>,
    flyable: Option<bool>,
    rating: Option<f64>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    flyable: Option<bool>,
    rating: Option<f64>,
    confidence: Option<f64>,
    conditions: Option<String>,
    summary: Option<String>,
    details: Option<RawDetails>,
    recommendation: Option<String>,
    #[serde(default)]
    hourly_evaluations: Vec<Value>,
}

/// Remove Markdown code fences and any prose around the JSON object
#[must_use]
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse and validate one response against the result schema
///
/// # Errors
///
/// Returns the issue to report back in a clarification round
pub fn parse_response(content: &str) -> Result<ParsedEvaluation, ResponseIssue> {
    let json = strip_code_fences(content);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ResponseIssue::Malformed(format!("the response is not valid JSON ({e})")))?;

    let Value::Object(map) = &value else {
        return Err(ResponseIssue::Malformed(
            "the response must be a JSON object".to_string(),
        ));
    };

    if map.get("needs_clarification").and_then(Value::as_bool) == Some(true) {
        let question = map
            .get("question")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|q| !q.trim().is_empty());
        return Err(ResponseIssue::ClarificationRequested(question));
    }

    let raw: RawEvaluation = serde_json::from_value(value)
        .map_err(|e| ResponseIssue::Malformed(format!("unexpected field types ({e})")))?;

    let flyable = raw
        .flyable
        .ok_or_else(|| missing("flyable"))?;
    let rating = band("rating", raw.rating.ok_or_else(|| missing("rating"))?)?;
    let confidence = band("confidence", raw.confidence.ok_or_else(|| missing("confidence"))?)?;
    let conditions: ConditionClass = raw
        .conditions
        .ok_or_else(|| missing("conditions"))?
        .parse()
        .map_err(|_| {
            ResponseIssue::Malformed(
                "conditions must be one of EXCELLENT, GOOD, MODERATE, POOR, DANGEROUS".to_string(),
            )
        })?;
    let summary = raw
        .summary
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing("summary"))?;

    if flyable && conditions == ConditionClass::Dangerous {
        return Err(ResponseIssue::Malformed(
            "flyable cannot be true when conditions are DANGEROUS".to_string(),
        ));
    }

    let not_available = || EvaluationDetails::NOT_AVAILABLE.to_string();
    let details = match raw.details {
        Some(d) => EvaluationDetails {
            wind: d.wind.unwrap_or_else(not_available),
            thermal: d.thermal.unwrap_or_else(not_available),
            risks: d.risks.unwrap_or_else(not_available),
        },
        None => EvaluationDetails {
            wind: not_available(),
            thermal: not_available(),
            risks: not_available(),
        },
    };

    let hourly_evaluations = raw
        .hourly_evaluations
        .into_iter()
        .filter_map(parse_hourly)
        .collect();

    Ok(ParsedEvaluation {
        flyable,
        rating,
        confidence,
        conditions,
        summary,
        details,
        recommendation: raw.recommendation.unwrap_or_else(not_available),
        hourly_evaluations,
    })
}

fn missing(field: &str) -> ResponseIssue {
    ResponseIssue::Malformed(format!("required field '{field}' is missing"))
}

fn band(field: &str, value: f64) -> Result<u8, ResponseIssue> {
    if value.fract() == 0.0 && (1.0..=10.0).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ResponseIssue::Malformed(format!(
            "{field} must be an integer from 1 to 10, got {value}"
        )))
    }
}

/// Hourly entries are advisory; unusable ones are dropped
fn parse_hourly(value: Value) -> Option<HourlyEvaluation> {
    let raw: RawHourly = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Dropping hourly evaluation: {}", e);
            return None;
        }
    };
    let hour = raw.hour.filter(|h| (0.0..=23.0).contains(h) && h.fract() == 0.0)? as u8;
    let conditions: ConditionClass = raw.conditions?.parse().ok()?;
    let rating = band("rating", raw.rating?).ok()?;

    Some(HourlyEvaluation {
        hour,
        timestamp: raw.timestamp.unwrap_or_default(),
        conditions,
        flyable: raw.flyable.unwrap_or(false) && conditions != ConditionClass::Dangerous,
        rating,
        reason: raw.reason.unwrap_or_else(|| "No reason given".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const VALID: &str = r#"{"flyable": true, "rating": 8, "confidence": 7, "conditions": "EXCELLENT",
        "summary": "Strong thermals, westerly breeze", "details": {"wind": "15 km/h W", "thermik": "strong"},
        "hourly_evaluations": [
            {"hour": 11, "timestamp": "2026-05-02 11:00", "conditions": "GOOD", "flyable": true, "rating": 7, "reason": "thermals"},
            {"hour": 25, "conditions": "GOOD", "rating": 7},
            "not an object"
        ]}"#;

    #[test]
    fn test_valid_response_fills_missing_details() {
        let parsed = parse_response(VALID).unwrap();
        assert!(parsed.flyable);
        assert_eq!(parsed.rating, 8);
        assert_eq!(parsed.conditions, ConditionClass::Excellent);
        assert_eq!(parsed.details.thermal, "strong");
        assert_eq!(parsed.details.risks, EvaluationDetails::NOT_AVAILABLE);
        assert_eq!(parsed.recommendation, EvaluationDetails::NOT_AVAILABLE);
        assert_eq!(parsed.hourly_evaluations.len(), 1);
        assert_eq!(parsed.hourly_evaluations[0].hour, 11);
    }

    #[test]
    fn test_code_fences_are_tolerated() {
        let fenced = format!("Here you go:\n```json\n{VALID}\n```");
        assert!(parse_response(&fenced).is_ok());
    }

    #[rstest]
    #[case("not json at all")]
    #[case("[1, 2, 3]")]
    #[case(r#"{"rating": 5, "confidence": 5, "conditions": "GOOD", "summary": "x"}"#)]
    #[case(r#"{"flyable": false, "rating": 11, "confidence": 5, "conditions": "GOOD", "summary": "x"}"#)]
    #[case(r#"{"flyable": false, "rating": 4.5, "confidence": 5, "conditions": "GOOD", "summary": "x"}"#)]
    #[case(r#"{"flyable": false, "rating": 4, "confidence": 5, "conditions": "SUPERB", "summary": "x"}"#)]
    #[case(r#"{"flyable": false, "rating": 4, "confidence": 5, "conditions": "GOOD", "summary": " "}"#)]
    #[case(r#"{"flyable": true, "rating": 4, "confidence": 5, "conditions": "DANGEROUS", "summary": "x"}"#)]
    #[case(r#"{"flyable": "yes", "rating": 4, "confidence": 5, "conditions": "GOOD", "summary": "x"}"#)]
    fn test_malformed_responses(#[case] content: &str) {
        assert!(matches!(
            parse_response(content),
            Err(ResponseIssue::Malformed(_))
        ));
    }

    #[test]
    fn test_explicit_clarification_request() {
        let issue = parse_response(r#"{"needs_clarification": true, "question": "Cloud base?"}"#)
            .unwrap_err();
        assert_eq!(
            issue,
            ResponseIssue::ClarificationRequested(Some("Cloud base?".to_string()))
        );
    }

    #[test]
    fn test_exchange_reaches_valid_after_clarification() {
        let mut exchange = ClarificationExchange::new("sys".into(), "init".into(), 3);
        assert_eq!(exchange.state(), ExchangeState::AwaitingInitialResponse);

        let step = exchange.receive("garbage");
        assert!(matches!(step, Step::Clarify { round: 2, .. }));
        assert_eq!(exchange.state(), ExchangeState::AwaitingClarification);
        exchange.ask("try again".into());

        let step = exchange.receive(VALID);
        assert!(matches!(step, Step::Valid(_)));
        assert_eq!(exchange.state(), ExchangeState::Valid);
        assert_eq!(exchange.rounds(), 2);
        // system, initial, answer, follow-up, answer
        assert_eq!(exchange.messages().len(), 5);
    }

    #[test]
    fn test_exchange_exhausts_round_budget() {
        let mut exchange = ClarificationExchange::new("sys".into(), "init".into(), 2);
        assert!(matches!(exchange.receive("{}"), Step::Clarify { .. }));
        exchange.ask("again".into());
        assert!(matches!(exchange.receive("{}"), Step::Exhausted { .. }));
        assert_eq!(exchange.state(), ExchangeState::RoundsExhausted);
        assert!(exchange.state().is_terminal());
    }

    #[test]
    fn test_single_round_budget_exhausts_immediately() {
        let mut exchange = ClarificationExchange::new("sys".into(), "init".into(), 1);
        assert!(matches!(exchange.receive("nope"), Step::Exhausted { .. }));
    }
}
