use crate::agents::Agent;
use crate::types::{
    Capabilities, Complexity, DegradationReason, FactCheckLevel, Query, ResearchStrategy, Result,
    SourceKind, Stage,
};
use crate::utils::text::tokenize;
use async_trait::async_trait;
use std::collections::BTreeSet;

const COMPARISON_KEYWORDS: &[&str] = &[
    "compare", "compared", "comparison", "versus", "vs", "difference", "differences", "differ",
    "contrast", "better", "worse", "similarities", "tradeoffs", "alternatives",
];

const CAUSAL_KEYWORDS: &[&str] = &[
    "why", "cause", "causes", "caused", "effect", "effects", "impact", "impacts", "affect",
    "affects", "because", "consequence", "consequences", "lead", "leads", "influence",
];

const RIGOR_KEYWORDS: &[&str] = &["verify", "evidence", "proof", "prove", "accurate", "fact", "facts"];

/// Query plus the sources the orchestrator has wired up.
#[derive(Debug, Clone)]
pub struct RoutingInput {
    pub query: Query,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub strategy: ResearchStrategy,
    /// Sources the query asked for that are not available
    pub unavailable: BTreeSet<DegradationReason>,
}

/// Classifies a query and picks sources and a fact-check level.
///
/// Purely lexical, so the same query and capabilities always produce the
/// same strategy.
#[derive(Debug, Default, Clone)]
pub struct RouterAgent;

impl RouterAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, query: &Query, capabilities: Capabilities) -> RoutingDecision {
        let complexity = Self::classify(query.text());
        let mut fact_check_level = match complexity {
            Complexity::Simple => FactCheckLevel::Light,
            Complexity::Moderate => FactCheckLevel::Standard,
            Complexity::Complex => FactCheckLevel::Rigorous,
        };
        let tokens = tokenize(query.text());
        if tokens.iter().any(|t| RIGOR_KEYWORDS.contains(&t.as_str())) {
            fact_check_level = FactCheckLevel::Rigorous;
        }

        let mut sources = BTreeSet::new();
        let mut unavailable = BTreeSet::new();

        if query.use_web_search() {
            if capabilities.web_search {
                sources.insert(SourceKind::Web);
            } else {
                unavailable.insert(DegradationReason::WebSearchUnavailable);
            }
        }
        if query.use_rag() {
            if capabilities.document_index {
                sources.insert(SourceKind::Documents);
            } else {
                unavailable.insert(DegradationReason::DocumentIndexUnavailable);
            }
        }

        RoutingDecision {
            strategy: ResearchStrategy {
                complexity,
                sources,
                fact_check_level,
            },
            unavailable,
        }
    }

    /// Complexity from length, comparison/causal vocabulary and multi-part structure.
    pub fn classify(text: &str) -> Complexity {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Complexity::Moderate;
        }

        let words = tokens.len();
        let comparison = tokens.iter().any(|t| COMPARISON_KEYWORDS.contains(&t.as_str()));
        let causal = tokens.iter().any(|t| CAUSAL_KEYWORDS.contains(&t.as_str()));
        let multi_part = text.matches('?').count() > 1 || text.contains(';');

        if (comparison && causal) || multi_part || words > 25 || ((comparison || causal) && words > 12) {
            Complexity::Complex
        } else if words <= 6 && !comparison && !causal {
            Complexity::Simple
        } else {
            Complexity::Moderate
        }
    }
}

#[async_trait]
impl Agent for RouterAgent {
    type Input = RoutingInput;
    type Output = RoutingDecision;

    fn stage(&self) -> Stage {
        Stage::Routing
    }

    async fn process(&self, input: RoutingInput) -> Result<RoutingDecision> {
        Ok(self.route(&input.query, input.capabilities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ALL: Capabilities = Capabilities {
        web_search: true,
        document_index: true,
    };

    #[rstest]
    #[case("What is Rust?", Complexity::Simple)]
    #[case("capital of France", Complexity::Simple)]
    #[case("How does the borrow checker handle lifetimes in async code", Complexity::Moderate)]
    #[case("Rust vs Go", Complexity::Moderate)]
    #[case("Why does caffeine affect sleep quality and what can be done about it in adults", Complexity::Complex)]
    #[case("Compare Rust and Go and explain why teams choose one", Complexity::Complex)]
    #[case("What is X? How does it relate to Y?", Complexity::Complex)]
    #[case("   ", Complexity::Moderate)]
    fn test_classify(#[case] text: &str, #[case] expected: Complexity) {
        assert_eq!(RouterAgent::classify(text), expected);
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = RouterAgent::new();
        let query = Query::new("Why do cats purr?", true, true);
        assert_eq!(router.route(&query, ALL), router.route(&query, ALL));
    }

    #[test]
    fn test_sources_intersect_flags_and_capabilities() {
        let router = RouterAgent::new();
        let decision = router.route(
            &Query::new("What is Rust?", true, true),
            Capabilities {
                web_search: true,
                document_index: false,
            },
        );
        assert!(decision.strategy.uses(SourceKind::Web));
        assert!(!decision.strategy.uses(SourceKind::Documents));
        assert_eq!(
            decision.unavailable,
            [DegradationReason::DocumentIndexUnavailable].into_iter().collect()
        );
    }

    #[test]
    fn test_unrequested_sources_are_not_degradations() {
        let decision = RouterAgent::new().route(&Query::new("What is Rust?", false, false), Capabilities::default());
        assert!(decision.strategy.sources.is_empty());
        assert!(decision.unavailable.is_empty());
    }

    #[test]
    fn test_levels_follow_complexity_and_rigor_keywords() {
        let router = RouterAgent::new();
        let simple = router.route(&Query::new("What is Rust?", true, false), ALL);
        assert_eq!(simple.strategy.fact_check_level, FactCheckLevel::Light);

        let rigorous = router.route(&Query::new("verify the boiling point of water", true, false), ALL);
        assert_eq!(rigorous.strategy.fact_check_level, FactCheckLevel::Rigorous);
    }

    #[tokio::test]
    async fn test_process_matches_route() {
        let router = RouterAgent::new();
        let query = Query::new("Rust vs Go", true, true);
        let decision = router
            .process(RoutingInput {
                query: query.clone(),
                capabilities: ALL,
            })
            .await
            .unwrap();
        assert_eq!(decision, router.route(&query, ALL));
        assert_eq!(router.stage(), Stage::Routing);
    }
}
