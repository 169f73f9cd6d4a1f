use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{RelayError, RelayResult};
use crate::models::wire::{ModelMessage, ModelOptions, ModelRequest, ModelRole};
use crate::ollama::OllamaClient;
use crate::prompt_template::{load_prompt, PRACTICE_CHECK, PRACTICE_GENERATE};

pub const DEFAULT_TOPIC: &str = "algebra";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

/// Body of the practice endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PracticeRequest {
    Generate {
        #[serde(default)]
        topic: Option<String>,
        #[serde(default)]
        difficulty: Difficulty,
    },
    #[serde(rename_all = "camelCase")]
    Check {
        problem: String,
        user_answer: String,
        correct_answer: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeProblem {
    pub problem: String,
    pub answer: String,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub correct: bool,
    pub explanation: String,
}

lazy_static! {
    static ref PROBLEM: Regex =
        Regex::new(r"(?s)\**PROBLEM:\**\s*(.*?)\s*(?:\**ANSWER:|\**HINT:|$)").unwrap();
    static ref ANSWER: Regex = Regex::new(r"(?s)\**ANSWER:\**\s*(.*?)\s*(?:\**HINT:|$)").unwrap();
    static ref HINT: Regex = Regex::new(r"(?s)\**HINT:\**\s*(.*?)\s*$").unwrap();
    static ref VERDICT: Regex =
        Regex::new(r"(?i)^\s*\**\s*(INCORRECT|CORRECT)\b(?:[\s:.,!*]|-\s)*").unwrap();
}

fn field(pattern: &Regex, content: &str) -> Option<String> {
    pattern
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Split a generated reply into its template fields.
///
/// Without a `PROBLEM:` field the whole reply becomes the problem; missing
/// answers and hints are empty.
pub fn parse_problem(content: &str) -> PracticeProblem {
    PracticeProblem {
        problem: field(&PROBLEM, content).unwrap_or_else(|| content.trim().to_string()),
        answer: field(&ANSWER, content).unwrap_or_default(),
        hint: field(&HINT, content).unwrap_or_default(),
    }
}

/// Read the leading verdict of a grading reply and strip it from the explanation
pub fn parse_grade(content: &str) -> Grade {
    match VERDICT.captures(content) {
        Some(caps) => {
            let verdict = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(0).map_or(content, |m| &content[m.end()..]);
            Grade {
                correct: verdict.eq_ignore_ascii_case("CORRECT"),
                explanation: rest.trim().to_string(),
            }
        }
        None => Grade {
            correct: false,
            explanation: content.trim().to_string(),
        },
    }
}

fn single_turn(model: &str, prompt: String, options: ModelOptions) -> ModelRequest {
    ModelRequest {
        model: model.to_string(),
        messages: vec![ModelMessage::new(ModelRole::User, prompt)],
        stream: false,
        options,
    }
}

pub fn generate_request(model: &str, topic: &str, difficulty: Difficulty) -> RelayResult<ModelRequest> {
    let prompt = load_prompt(
        PRACTICE_GENERATE,
        &json!({ "topic": topic, "difficulty": difficulty }),
    )
    .map_err(|e| RelayError::Internal(e.to_string()))?;
    Ok(single_turn(model, prompt, ModelOptions::PRACTICE_GENERATE))
}

pub fn check_request(
    model: &str,
    problem: &str,
    user_answer: &str,
    correct_answer: &str,
) -> RelayResult<ModelRequest> {
    let prompt = load_prompt(
        PRACTICE_CHECK,
        &json!({
            "problem": problem,
            "user_answer": user_answer,
            "correct_answer": correct_answer,
        }),
    )
    .map_err(|e| RelayError::Internal(e.to_string()))?;
    Ok(single_turn(model, prompt, ModelOptions::PRACTICE_CHECK))
}

pub async fn generate(
    client: &OllamaClient,
    topic: &str,
    difficulty: Difficulty,
) -> RelayResult<PracticeProblem> {
    let request = generate_request(&client.config().text_model, topic, difficulty)?;
    let content = client.chat(&request).await?;
    Ok(parse_problem(&content))
}

pub async fn check(
    client: &OllamaClient,
    problem: &str,
    user_answer: &str,
    correct_answer: &str,
) -> RelayResult<Grade> {
    let request = check_request(&client.config().text_model, problem, user_answer, correct_answer)?;
    let content = client.chat(&request).await?;
    Ok(parse_grade(&content))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub attempted: u32,
    pub correct: u32,
}

impl TopicStats {
    pub fn accuracy(&self) -> f32 {
        ratio(self.correct, self.attempted)
    }
}

fn ratio(correct: u32, attempted: u32) -> f32 {
    if attempted == 0 {
        0.0
    } else {
        correct as f32 / attempted as f32
    }
}

/// Running totals of graded practice answers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeStats {
    pub attempted: u32,
    pub correct: u32,
    pub streak: u32,
    pub best_streak: u32,
    #[serde(default)]
    pub by_topic: BTreeMap<String, TopicStats>,
}

impl PracticeStats {
    pub fn record(&mut self, topic: &str, correct: bool) {
        self.attempted += 1;
        let entry = self.by_topic.entry(topic.to_string()).or_default();
        entry.attempted += 1;

        if correct {
            self.correct += 1;
            entry.correct += 1;
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
        } else {
            self.streak = 0;
        }
    }

    /// Share of correct answers, 0.0 when nothing was attempted
    pub fn accuracy(&self) -> f32 {
        ratio(self.correct, self.attempted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::OllamaConfig;
    use anyhow::Result;
    use indoc::indoc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_problem() {
        let problem = parse_problem("PROBLEM: Solve x+1=2\nANSWER: x=1\nHINT: subtract 1");
        assert_eq!(
            problem,
            PracticeProblem {
                problem: "Solve x+1=2".to_string(),
                answer: "x=1".to_string(),
                hint: "subtract 1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_problem_multiline_and_bold() {
        let content = indoc! {"
            Sure! Here is one.

            **PROBLEM:** Find the roots of
            $x^2 - 5x + 6 = 0$.
            **ANSWER:** $x = 2$ or $x = 3$
            **HINT:** Factor the quadratic.
        "};
        let problem = parse_problem(content);
        assert_eq!(problem.problem, "Find the roots of\n$x^2 - 5x + 6 = 0$.");
        assert_eq!(problem.answer, "$x = 2$ or $x = 3$");
        assert_eq!(problem.hint, "Factor the quadratic.");
    }

    #[test]
    fn test_parse_problem_fallbacks() {
        let problem = parse_problem("  What is 7 times 8?  ");
        assert_eq!(problem.problem, "What is 7 times 8?");
        assert_eq!(problem.answer, "");
        assert_eq!(problem.hint, "");

        let no_hint = parse_problem("PROBLEM: 2+2\nANSWER: 4");
        assert_eq!(no_hint.problem, "2+2");
        assert_eq!(no_hint.answer, "4");
        assert_eq!(no_hint.hint, "");
    }

    #[test]
    fn test_parse_grade() {
        assert_eq!(
            parse_grade("CORRECT\nGood job."),
            Grade {
                correct: true,
                explanation: "Good job.".to_string()
            }
        );
        assert_eq!(
            parse_grade("INCORRECT: the sign is wrong."),
            Grade {
                correct: false,
                explanation: "the sign is wrong.".to_string()
            }
        );
        assert_eq!(
            parse_grade("CORRECT\n-3 is the only root."),
            Grade {
                correct: true,
                explanation: "-3 is the only root.".to_string()
            }
        );
        assert_eq!(parse_grade("INCORRECT - -2 < 0").explanation, "-2 < 0");
        assert!(parse_grade("**Correct!** Nicely done").correct);
        assert_eq!(parse_grade("**Correct!** Nicely done").explanation, "Nicely done");
    }

    #[test]
    fn test_parse_grade_without_verdict() {
        let grade = parse_grade("Hmm, let me think.");
        assert!(!grade.correct);
        assert_eq!(grade.explanation, "Hmm, let me think.");
    }

    #[test]
    fn test_practice_request_deserialization() {
        let generate: PracticeRequest =
            serde_json::from_str(r#"{"action":"generate","topic":"geometry","difficulty":"hard"}"#)
                .unwrap();
        assert_eq!(
            generate,
            PracticeRequest::Generate {
                topic: Some("geometry".to_string()),
                difficulty: Difficulty::Hard
            }
        );

        let defaults: PracticeRequest = serde_json::from_str(r#"{"action":"generate"}"#).unwrap();
        assert_eq!(
            defaults,
            PracticeRequest::Generate {
                topic: None,
                difficulty: Difficulty::Medium
            }
        );

        let check: PracticeRequest = serde_json::from_str(
            r#"{"action":"check","problem":"1+1","userAnswer":"2","correctAnswer":"2"}"#,
        )
        .unwrap();
        assert_eq!(
            check,
            PracticeRequest::Check {
                problem: "1+1".to_string(),
                user_answer: "2".to_string(),
                correct_answer: "2".to_string(),
            }
        );
    }

    #[test]
    fn test_stats_record() {
        let mut stats = PracticeStats::default();
        stats.record("algebra", true);
        stats.record("algebra", true);
        stats.record("geometry", false);
        stats.record("algebra", true);

        assert_eq!(stats.attempted, 4);
        assert_eq!(stats.correct, 3);
        assert_eq!(stats.streak, 1);
        assert_eq!(stats.best_streak, 2);
        assert_eq!(
            stats.by_topic["algebra"],
            TopicStats {
                attempted: 3,
                correct: 3
            }
        );
        assert!((stats.accuracy() - 0.75).abs() < f32::EPSILON);
        assert_eq!(PracticeStats::default().accuracy(), 0.0);
        assert_eq!(stats.by_topic["algebra"].accuracy(), 1.0);
        assert_eq!(stats.by_topic["geometry"].accuracy(), 0.0);
    }

    #[tokio::test]
    async fn test_generate_calls_model_once() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"stream": false, "model": "llama3.2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "PROBLEM: 3x = 9\nANSWER: x = 3\nHINT: divide"},
                "done": true
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OllamaClient::new(OllamaConfig {
            host: mock_server.uri(),
            ..OllamaConfig::default()
        })?;
        let problem = generate(&client, "linear equations", Difficulty::Easy).await?;
        assert_eq!(problem.problem, "3x = 9");
        assert_eq!(problem.answer, "x = 3");
        assert_eq!(problem.hint, "divide");
        Ok(())
    }
}
