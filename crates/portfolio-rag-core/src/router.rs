//! Query routing between the aggregation fast path and retrieval.
//!
//! A question reaches the [`Resolver`] only if it contains at least one
//! aggregation keyword. Questions phrased without any of them always go to
//! retrieval, even when a template could have answered them.

use serde::Serialize;

use crate::aggregate::{Aggregation, Intent, Resolver};

/// Substrings (case-insensitive) that gate the aggregation path.
pub const AGGREGATION_KEYWORDS: &[&str] = &[
    "total",
    "sum",
    "average",
    "avg",
    "mean",
    "count",
    "how many",
    "top",
    "bottom",
    "highest",
    "lowest",
    "max",
    "min",
    "group",
    "net",
    "aggregate",
    "calculate",
    "compute",
];

/// True if `question` contains any [`AGGREGATION_KEYWORDS`] entry.
pub fn has_aggregation_intent(question: &str) -> bool {
    let lower = question.to_lowercase();
    AGGREGATION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Outcome of routing one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Answered directly from the tables.
    Aggregated(Aggregation),
    /// Needs retrieval and generation.
    Retrieve,
}

/// Route `question`: try the resolver when the keyword gate opens,
/// otherwise (or on no match) send it to retrieval.
pub fn route(question: &str, resolver: &Resolver<'_>) -> Routed {
    if has_aggregation_intent(question) {
        if let Some(aggregation) = resolver.resolve(question) {
            return Routed::Aggregated(aggregation);
        }
    }
    Routed::Retrieve
}

/// Which path produced an answer, reported alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "path", content = "intent", rename_all = "snake_case")]
pub enum Route {
    Aggregation(Intent),
    Retrieval,
    NoData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Datasets, Table};

    fn datasets() -> Datasets {
        Datasets {
            holdings: Table::default(),
            trades: Table::new(
                vec!["symbol".into(), "quantity".into()],
                vec![vec![Cell::Text("AAPL".into()), Cell::Number(3.0)]],
            ),
        }
    }

    #[test]
    fn test_keyword_gate() {
        assert!(has_aggregation_intent("What is the TOTAL pnl?"));
        assert!(has_aggregation_intent("How many trades?"));
        assert!(has_aggregation_intent("lowest price"));
        assert!(!has_aggregation_intent("Tell me about AAPL"));
        assert!(!has_aggregation_intent(""));
    }

    #[test]
    fn test_keyword_substring_match() {
        // "minimum" contains "min"; substring matching is intended.
        assert!(has_aggregation_intent("minimum quantity"));
    }

    #[test]
    fn test_route_to_aggregation() {
        let data = datasets();
        let resolver = Resolver::new(&data);
        match route("how many trades do I have", &resolver) {
            Routed::Aggregated(a) => assert_eq!(a.intent, Intent::TradeCount),
            other => panic!("expected aggregation, got {:?}", other),
        }
    }

    #[test]
    fn test_route_without_keyword_skips_resolver() {
        let data = datasets();
        let resolver = Resolver::new(&data);
        // A count question phrased without any keyword never reaches the resolver.
        assert_eq!(route("number of trades?", &resolver), Routed::Retrieve);
    }

    #[test]
    fn test_route_keyword_without_template_falls_back() {
        let data = datasets();
        let resolver = Resolver::new(&data);
        assert_eq!(route("highest quantity trade", &resolver), Routed::Retrieve);
    }

    #[test]
    fn test_route_serializes_with_intent() {
        let json = serde_json::to_value(Route::Aggregation(Intent::TotalPnl)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "path": "aggregation", "intent": "total_pnl" })
        );
        let json = serde_json::to_value(Route::Retrieval).unwrap();
        assert_eq!(json, serde_json::json!({ "path": "retrieval" }));
    }
}
