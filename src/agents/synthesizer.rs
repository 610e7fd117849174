use crate::agents::Agent;
use crate::llm::LLMClient;
use crate::types::{Report, ReportSection, Result, Stage, VerifiedFact};
use crate::utils::text::content_tokens;
use async_trait::async_trait;
use futures::future::try_join_all;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

pub const OTHER_FINDINGS_HEADING: &str = "Other findings";

const SECTION_SYSTEM_PROMPT: &str = "You are a research writer. Write one section of a research \
report using only the numbered facts provided. Reference every fact you rely on with its marker \
exactly as given, for example [F3]. Mention low-confidence or contradicted facts with appropriate \
caution. Write plain prose without a heading.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a research editor. Write an executive summary of \
the report below in at most 150 words, covering the key findings and conclusions. Do not add \
facts that are not in the report and do not include fact markers.";

static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();

fn marker_regex() -> &'static Regex {
    MARKER_REGEX.get_or_init(|| Regex::new(r"\[F(\d+)\]").expect("marker pattern is valid"))
}

#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub query: String,
    pub facts: Vec<VerifiedFact>,
}

/// Facts grouped under one heading. Indices point into the eligible-facts list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPlan {
    pub heading: String,
    pub fact_indices: Vec<usize>,
}

/// Organises verified facts into topical sections and writes each body through
/// the completion service.
pub struct SynthesizerAgent {
    llm: Arc<dyn LLMClient>,
    max_sections: usize,
}

impl SynthesizerAgent {
    pub fn new(llm: Arc<dyn LLMClient>, max_sections: usize) -> Self {
        Self {
            llm,
            max_sections: max_sections.max(1),
        }
    }

    /// Group facts by dominant topic.
    ///
    /// A fact's dominant topic is its content token shared by the most facts,
    /// earliest in the fact on ties. Sections follow the order in which their
    /// topic first appears; facts sharing no token with any other fact, and
    /// topics beyond `max_sections`, go to a trailing "Other findings" section.
    pub fn plan_sections(&self, facts: &[VerifiedFact]) -> Vec<SectionPlan> {
        let tokens: Vec<Vec<String>> = facts.iter().map(|f| content_tokens(&f.text).0).collect();

        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for fact_tokens in &tokens {
            for token in fact_tokens {
                *frequency.entry(token.as_str()).or_default() += 1;
            }
        }

        let mut topics: Vec<(String, Vec<usize>)> = Vec::new();
        let mut other: Vec<usize> = Vec::new();

        for (i, fact_tokens) in tokens.iter().enumerate() {
            let mut dominant: Option<(&str, usize)> = None;
            for token in fact_tokens {
                let count = frequency[token.as_str()];
                if dominant.map_or(true, |(_, best)| count > best) {
                    dominant = Some((token.as_str(), count));
                }
            }

            match dominant {
                Some((topic, count)) if count > 1 => {
                    match topics.iter_mut().find(|(t, _)| t == topic) {
                        Some((_, members)) => members.push(i),
                        None => topics.push((topic.to_string(), vec![i])),
                    }
                }
                _ => other.push(i),
            }
        }

        let topical_budget = if topics.len() + usize::from(!other.is_empty()) > self.max_sections {
            self.max_sections - 1
        } else {
            topics.len()
        };
        for (_, members) in topics.drain(topical_budget..) {
            other.extend(members);
        }
        other.sort_unstable();

        let mut plans: Vec<SectionPlan> = topics
            .into_iter()
            .map(|(topic, fact_indices)| SectionPlan {
                heading: title_case(&topic),
                fact_indices,
            })
            .collect();
        if !other.is_empty() {
            plans.push(SectionPlan {
                heading: OTHER_FINDINGS_HEADING.to_string(),
                fact_indices: other,
            });
        }
        plans
    }

    pub async fn synthesize(&self, facts: &[VerifiedFact], query: &str) -> Result<Report> {
        let eligible: Vec<&VerifiedFact> = facts.iter().filter(|f| f.confidence > 0.0).collect();
        let owned: Vec<VerifiedFact> = eligible.iter().map(|f| (*f).clone()).collect();
        let plans = self.plan_sections(&owned);

        debug!(eligible = eligible.len(), sections = plans.len(), "Sections planned");

        let bodies = try_join_all(
            plans
                .iter()
                .map(|plan| self.write_section(query, plan, &eligible)),
        )
        .await?;

        let mut sections = Vec::with_capacity(plans.len());
        for (plan, body_text) in plans.iter().zip(bodies) {
            let own: BTreeSet<usize> = plan.fact_indices.iter().copied().collect();
            let cited_fact_ids = cited_markers(&body_text)
                .into_iter()
                .filter(|idx| own.contains(idx))
                .map(|idx| eligible[idx].id.clone())
                .collect();
            sections.push(ReportSection {
                heading: plan.heading.clone(),
                body_text,
                cited_fact_ids,
            });
        }

        let cited: BTreeSet<&str> = sections
            .iter()
            .flat_map(|s| s.cited_fact_ids.iter().map(String::as_str))
            .collect();
        let unused_fact_ids: Vec<String> = eligible
            .iter()
            .filter(|f| !cited.contains(f.id.as_str()))
            .map(|f| f.id.clone())
            .collect();

        let summary = if sections.is_empty() {
            String::new()
        } else {
            self.write_summary(query, &sections).await?
        };

        info!(
            sections = sections.len(),
            unused = unused_fact_ids.len(),
            "Report synthesized"
        );

        Ok(Report {
            title: format!("Research Report: {}", query),
            summary,
            sections,
            unused_fact_ids,
        })
    }

    async fn write_section(
        &self,
        query: &str,
        plan: &SectionPlan,
        eligible: &[&VerifiedFact],
    ) -> Result<String> {
        let mut prompt = format!(
            "Research question: {}\nSection heading: {}\n\nFacts:\n",
            query, plan.heading
        );
        for &idx in &plan.fact_indices {
            let fact = eligible[idx];
            prompt.push_str(&format!(
                "[F{}] {} (confidence {:.2}{})\n",
                idx + 1,
                fact.text,
                fact.confidence,
                if fact.contradicted { ", contradicted by other sources" } else { "" }
            ));
        }
        self.llm.generate_with_system(SECTION_SYSTEM_PROMPT, &prompt).await
    }

    /// Executive summary over the written sections, with any `[Fn]` markers removed.
    async fn write_summary(&self, query: &str, sections: &[ReportSection]) -> Result<String> {
        let mut prompt = format!("Research question: {}\n\nReport:\n", query);
        for section in sections {
            prompt.push_str(&format!("\n## {}\n{}\n", section.heading, section.body_text.trim()));
        }
        let summary = self.llm.generate_with_system(SUMMARY_SYSTEM_PROMPT, &prompt).await?;
        Ok(strip_markers(&summary))
    }
}

fn strip_markers(text: &str) -> String {
    let stripped = marker_regex().replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").replace(" .", ".").replace(" ,", ",")
}

/// Zero-based fact indices referenced by `[Fn]` markers, in order of first appearance.
pub fn cited_markers(text: &str) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    marker_regex()
        .captures_iter(text)
        .filter_map(|cap| cap[1].parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| n - 1)
        .filter(|idx| seen.insert(*idx))
        .collect()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    type Input = SynthesisInput;
    type Output = Report;

    fn stage(&self) -> Stage {
        Stage::Synthesizing
    }

    async fn process(&self, input: SynthesisInput) -> Result<Report> {
        self.synthesize(&input.facts, &input.query).await
    }
}
