use crate::agents::Agent;
use crate::llm::LLMClient;
use crate::types::{QualityDimension, QualityScores, Report, Result, Stage};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict research-report judge. Score the report \
against the research question on each dimension with a number between 0 and 1. Answer with one \
line per dimension in the form `dimension: score`, using exactly these names: completeness, \
accuracy, relevance, clarity, source_quality, citation_quality. Then add three lists, each \
introduced by its own line `strengths:`, `weaknesses:` and `suggestions:`, with one bullet per \
item. Finish with a line starting `feedback:` followed by two or three sentences of concrete \
advice.";

static SCORE_REGEX: OnceLock<Regex> = OnceLock::new();
static HEADING_REGEX: OnceLock<Regex> = OnceLock::new();
static BULLET_REGEX: OnceLock<Regex> = OnceLock::new();

fn score_regex() -> &'static Regex {
    SCORE_REGEX.get_or_init(|| {
        Regex::new(
            r"(?im)^[\s\-*#>]*(completeness|accuracy|relevance|clarity|source[ _]quality|citation[ _]quality)\W*?[:=]\s*\**\s*(-?\d+(?:\.\d+)?)\s*(?:/\s*(\d+(?:\.\d+)?))?",
        )
        .expect("score pattern is valid")
    })
}

fn heading_regex() -> &'static Regex {
    HEADING_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^[\s\-*#>]*(strengths?|weaknesses?|suggestions?|feedback)\W*?:\**\s*(.*)$")
            .expect("heading pattern is valid")
    })
}

fn bullet_regex() -> &'static Regex {
    BULLET_REGEX.get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").expect("bullet pattern is valid"))
}

/// Free-text parts of a judgement that follow a heading line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Part {
    Strengths,
    Weaknesses,
    Suggestions,
    Feedback,
}

impl Part {
    fn from_heading(word: &str) -> Self {
        let word = word.to_lowercase();
        if word.starts_with("strength") {
            Part::Strengths
        } else if word.starts_with("weakness") {
            Part::Weaknesses
        } else if word.starts_with("suggestion") {
            Part::Suggestions
        } else {
            Part::Feedback
        }
    }
}

/// Lines under each heading, bullets stripped.
///
/// A part runs until a blank line after some content, a score line or the
/// next heading. The first occurrence of a heading wins.
fn judgement_parts(text: &str) -> HashMap<Part, Vec<String>> {
    let mut parts: HashMap<Part, Vec<String>> = HashMap::new();
    let mut current: Option<Part> = None;

    for line in text.lines() {
        if let Some(cap) = heading_regex().captures(line) {
            let part = Part::from_heading(&cap[1]);
            if parts.contains_key(&part) {
                current = None;
                continue;
            }
            let lines = parts.entry(part).or_default();
            let rest = cap[2].trim();
            if !rest.is_empty() {
                lines.push(rest.to_string());
            }
            current = Some(part);
            continue;
        }
        if score_regex().is_match(line) {
            current = None;
            continue;
        }

        let Some(part) = current else {
            continue;
        };
        let item = bullet_regex().replace(line, "");
        let item = item.trim().trim_matches('*').trim();
        let lines = parts.entry(part).or_default();
        if item.is_empty() {
            if !lines.is_empty() {
                current = None;
            }
        } else {
            lines.push(item.to_string());
        }
    }
    parts
}

#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub query: String,
    pub report: Report,
}

/// Scores a report through the completion service acting as a judge.
pub struct EvaluatorAgent {
    llm: Arc<dyn LLMClient>,
}

impl EvaluatorAgent {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    pub async fn evaluate(&self, report: &Report, query: &str) -> Result<QualityScores> {
        let cited = report.cited_fact_ids().count();
        let prompt = format!(
            "Research question: {}\n\nReport ({} sections, {} cited facts, {} uncited facts):\n\n{}",
            query,
            report.sections.len(),
            cited,
            report.unused_fact_ids.len(),
            report.to_markdown()
        );

        let judgement = self.llm.generate_with_system(JUDGE_SYSTEM_PROMPT, &prompt).await?;
        let scores = parse_scores(&judgement);

        info!(average = scores.average(), "Report evaluated");
        Ok(scores)
    }
}

/// Read dimension scores and the strengths, weaknesses, suggestions and
/// feedback parts out of free judge text.
///
/// `name: value` and `name: value/denominator` are understood. Missing,
/// unparseable or non-finite values become 0, everything else is clamped to
/// [0, 1]. Without a `feedback:` part the whole text is the feedback. Never
/// fails.
pub fn parse_scores(text: &str) -> QualityScores {
    let mut scores: BTreeMap<QualityDimension, f32> = BTreeMap::new();

    for cap in score_regex().captures_iter(text) {
        let Some(dimension) = dimension_from_name(&cap[1]) else {
            continue;
        };
        if scores.contains_key(&dimension) {
            continue;
        }

        let value: f32 = cap[2].parse().unwrap_or(0.0);
        let value = match cap.get(3).and_then(|d| d.as_str().parse::<f32>().ok()) {
            Some(denominator) if denominator > 0.0 => value / denominator,
            _ => value,
        };
        scores.insert(dimension, clamp_score(value));
    }

    for dimension in QualityDimension::ALL {
        scores.entry(dimension).or_insert_with(|| {
            debug!(%dimension, "Judge gave no score, using 0");
            0.0
        });
    }

    let mut parts = judgement_parts(text);
    let feedback = match parts.remove(&Part::Feedback) {
        Some(lines) if !lines.is_empty() => lines.join(" "),
        _ => text.trim().to_string(),
    };

    QualityScores {
        scores,
        feedback,
        strengths: parts.remove(&Part::Strengths).unwrap_or_default(),
        weaknesses: parts.remove(&Part::Weaknesses).unwrap_or_default(),
        suggestions: parts.remove(&Part::Suggestions).unwrap_or_default(),
    }
}

fn dimension_from_name(name: &str) -> Option<QualityDimension> {
    let normalized = name.to_lowercase().replace(' ', "_");
    QualityDimension::ALL
        .into_iter()
        .find(|d| d.as_str() == normalized)
}

fn clamp_score(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[async_trait]
impl Agent for EvaluatorAgent {
    type Input = EvaluationInput;
    type Output = QualityScores;

    fn stage(&self) -> Stage {
        Stage::Evaluating
    }

    async fn process(&self, input: EvaluationInput) -> Result<QualityScores> {
        self.evaluate(&input.report, &input.query).await
    }
}
