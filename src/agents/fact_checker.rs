use crate::agents::Agent;
use crate::llm::LLMClient;
use crate::types::{FactCheckLevel, Finding, Result, Stage, VerifiedFact};
use crate::utils::text::{claim_signature, jaccard, ClaimSignature};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Ceiling on any contradicted fact.
pub const CONTRADICTION_CAP: f32 = 0.4;
/// Ceiling on single-source facts at light and standard levels.
pub const SINGLE_SOURCE_CAP: f32 = 0.6;
/// Ceiling on facts with fewer than two sources at the rigorous level.
pub const RIGOROUS_SINGLE_SOURCE_CAP: f32 = 0.5;

const VERIFICATION_SYSTEM_PROMPT: &str = "You are a fact-checking reviewer. You are given claims \
gathered for a research question, each with a confidence score and the number of independent \
sources backing it. Point out claims that look doubtful, flagged contradictions worth \
highlighting, and gaps in coverage. Be brief and concrete.";

#[derive(Debug, Clone)]
pub struct FactCheckInput {
    pub query: String,
    pub findings: Vec<Finding>,
    pub level: FactCheckLevel,
}

#[derive(Debug, Clone)]
pub struct FactCheckOutput {
    pub facts: Vec<VerifiedFact>,
    pub notes: String,
}

struct Cluster {
    signature: ClaimSignature,
    members: Vec<usize>,
    contradictions: usize,
}

/// Cross-references findings into verified facts.
///
/// Findings whose content tokens overlap by at least the claim-similarity
/// threshold (Jaccard) and share polarity form one claim. Claims that overlap
/// but disagree in polarity contradict each other.
pub struct FactCheckerAgent {
    llm: Arc<dyn LLMClient>,
    similarity_threshold: f32,
}

impl FactCheckerAgent {
    pub fn new(llm: Arc<dyn LLMClient>, similarity_threshold: f32) -> Self {
        Self {
            llm,
            similarity_threshold,
        }
    }

    /// Derive facts from `findings`. Every finding ends up in exactly one fact.
    pub fn verify(&self, findings: &[Finding], level: FactCheckLevel) -> Vec<VerifiedFact> {
        // (first finding index, fact)
        let mut ordered: Vec<(usize, VerifiedFact)> = Vec::new();
        let mut clusters: Vec<Cluster> = Vec::new();

        for (i, finding) in findings.iter().enumerate() {
            let signature = claim_signature(&finding.text);
            if signature.is_empty() {
                ordered.push((i, Self::unverifiable(finding)));
                continue;
            }

            let existing = clusters.iter().position(|c| {
                c.signature.negated == signature.negated
                    && jaccard(&c.signature.tokens, &signature.tokens) >= self.similarity_threshold
            });
            match existing {
                Some(idx) => clusters[idx].members.push(i),
                None => clusters.push(Cluster {
                    signature,
                    members: vec![i],
                    contradictions: 0,
                }),
            }
        }

        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let opposed = clusters[a].signature.negated != clusters[b].signature.negated;
                if opposed
                    && jaccard(&clusters[a].signature.tokens, &clusters[b].signature.tokens)
                        >= self.similarity_threshold
                {
                    clusters[a].contradictions += 1;
                    clusters[b].contradictions += 1;
                }
            }
        }

        for cluster in &clusters {
            ordered.push((cluster.members[0], Self::fact_from_cluster(cluster, findings, level)));
        }

        ordered.sort_by_key(|(first, _)| *first);
        let facts: Vec<VerifiedFact> = ordered.into_iter().map(|(_, fact)| fact).collect();

        debug!(
            findings = findings.len(),
            facts = facts.len(),
            contradicted = facts.iter().filter(|f| f.contradicted).count(),
            "Findings clustered"
        );
        facts
    }

    fn unverifiable(finding: &Finding) -> VerifiedFact {
        VerifiedFact {
            id: Uuid::new_v4().to_string(),
            text: finding.text.clone(),
            supporting_source_ids: [finding.source_id.clone()].into_iter().collect(),
            finding_ids: vec![finding.id.clone()],
            confidence: 0.0,
            contradicted: false,
        }
    }

    fn fact_from_cluster(cluster: &Cluster, findings: &[Finding], level: FactCheckLevel) -> VerifiedFact {
        let members: Vec<&Finding> = cluster.members.iter().map(|&i| &findings[i]).collect();
        let supporting_source_ids: BTreeSet<String> =
            members.iter().map(|f| f.source_id.clone()).collect();

        // Most relevant member states the claim; earliest wins ties
        let mut best = members[0];
        for finding in &members[1..] {
            if finding.relevance_score > best.relevance_score {
                best = finding;
            }
        }

        let mean_relevance =
            members.iter().map(|f| f.relevance_score).sum::<f32>() / members.len() as f32;
        let confidence = confidence_score(
            supporting_source_ids.len(),
            mean_relevance,
            level,
            cluster.contradictions,
        );

        VerifiedFact {
            id: Uuid::new_v4().to_string(),
            text: best.text.clone(),
            supporting_source_ids,
            finding_ids: members.iter().map(|f| f.id.clone()).collect(),
            confidence,
            contradicted: cluster.contradictions > 0,
        }
    }

    async fn review(&self, query: &str, facts: &[VerifiedFact]) -> Result<String> {
        let mut prompt = format!("Research question: {}\n\nClaims:\n", query);
        for (i, fact) in facts.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} (confidence {:.2}, sources {}{})\n",
                i + 1,
                fact.text,
                fact.confidence,
                fact.supporting_source_ids.len(),
                if fact.contradicted { ", CONTRADICTED" } else { "" }
            ));
        }
        self.llm
            .generate_with_system(VERIFICATION_SYSTEM_PROMPT, &prompt)
            .await
    }
}

/// Confidence for a claim backed by `sources` distinct sources.
///
/// Grows with source count (1 - 0.6^n) and with mean finding relevance, then is
/// capped by the level's single-source rule and by contradictions.
pub fn confidence_score(
    sources: usize,
    mean_relevance: f32,
    level: FactCheckLevel,
    contradictions: usize,
) -> f32 {
    if sources == 0 {
        return 0.0;
    }

    let support = 1.0 - 0.6f32.powi(sources as i32);
    let relevance = if mean_relevance.is_nan() {
        0.0
    } else {
        mean_relevance.clamp(0.0, 1.0)
    };
    let mut confidence = support * (0.5 + 0.5 * relevance);

    confidence *= match level {
        FactCheckLevel::Light => 1.2,
        FactCheckLevel::Standard => 1.0,
        FactCheckLevel::Rigorous => 0.9,
    };

    match level {
        FactCheckLevel::Rigorous if sources < 2 => {
            confidence = confidence.min(RIGOROUS_SINGLE_SOURCE_CAP)
        }
        FactCheckLevel::Light | FactCheckLevel::Standard if sources == 1 => {
            confidence = confidence.min(SINGLE_SOURCE_CAP)
        }
        _ => {}
    }

    if contradictions > 0 {
        confidence = (confidence / (1 + contradictions) as f32).min(CONTRADICTION_CAP);
    }

    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Agent for FactCheckerAgent {
    type Input = FactCheckInput;
    type Output = FactCheckOutput;

    fn stage(&self) -> Stage {
        Stage::FactChecking
    }

    async fn process(&self, input: FactCheckInput) -> Result<FactCheckOutput> {
        let facts = self.verify(&input.findings, input.level);
        let notes = self.review(&input.query, &facts).await?;

        info!(
            facts = facts.len(),
            level = ?input.level,
            "Fact checking complete"
        );
        Ok(FactCheckOutput { facts, notes })
    }
}
