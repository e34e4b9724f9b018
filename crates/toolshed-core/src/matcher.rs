//! Query and content matching.
//!
//! Query matching scores every provider against a typed query and ranks the
//! hits; content matching asks a single provider whether it can handle a
//! piece of clipboard text. Both are pure per provider and may run on any
//! worker.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::warn;

use crate::catalog::{MatchedProvider, ToolCatalog};
use crate::registry::ProviderDescriptor;

/// Display name equals the query.
const SCORE_NAME_EXACT: u32 = 100;
/// Display name starts with the query.
const SCORE_NAME_PREFIX: u32 = 80;
/// A word of the display name starts with the query.
const SCORE_NAME_WORD: u32 = 70;
/// Display name contains the query.
const SCORE_NAME_SUBSTRING: u32 = 60;
const SCORE_KEYWORD_EXACT: u32 = 50;
const SCORE_KEYWORD_PREFIX: u32 = 40;
const SCORE_KEYWORD_SUBSTRING: u32 = 30;

/// Lowercase and trim a query the way every scorer expects it.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Default query score for a descriptor. `query` must be normalized.
pub fn descriptor_score(descriptor: &ProviderDescriptor, query: &str) -> u32 {
    if query.is_empty() {
        return 0;
    }

    let display = descriptor.display_name.to_lowercase();
    let name_score = if display == query {
        SCORE_NAME_EXACT
    } else if display.starts_with(query) {
        SCORE_NAME_PREFIX
    } else if display
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| !word.is_empty() && word.starts_with(query))
    {
        SCORE_NAME_WORD
    } else if display.contains(query) {
        SCORE_NAME_SUBSTRING
    } else {
        0
    };

    let keyword_score = descriptor
        .keywords
        .iter()
        .map(|keyword| {
            let keyword = keyword.to_lowercase();
            if keyword == query {
                SCORE_KEYWORD_EXACT
            } else if keyword.starts_with(query) {
                SCORE_KEYWORD_PREFIX
            } else if keyword.contains(query) {
                SCORE_KEYWORD_SUBSTRING
            } else {
                0
            }
        })
        .max()
        .unwrap_or(0);

    name_score.max(keyword_score)
}

/// A ranked query hit.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub tool: Arc<MatchedProvider>,
    pub score: u32,
}

/// Score every provider in `catalog` against `query`.
///
/// A provider is included when it or any descendant matches; a group
/// matched only through a descendant ranks just below that descendant.
/// Results are sorted by score, ties keeping registration order. A provider
/// whose scorer fails is logged and treated as not matching.
pub fn match_query(catalog: &ToolCatalog, query: &str) -> Vec<QueryMatch> {
    let query = normalize_query(query);
    if query.is_empty() {
        return Vec::new();
    }

    let mut scores = vec![0u32; catalog.all().len()];
    for root in catalog.roots() {
        effective_score(root, &query, &mut scores);
    }

    let mut matches: Vec<QueryMatch> = catalog
        .all()
        .iter()
        .zip(&scores)
        .filter(|(_, score)| **score > 0)
        .map(|(tool, score)| QueryMatch {
            tool: Arc::clone(tool),
            score: *score,
        })
        .collect();
    // Stable: equal scores keep registration order
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches
}

fn effective_score(tool: &MatchedProvider, query: &str, scores: &mut [u32]) -> u32 {
    let scored = catch_unwind(AssertUnwindSafe(|| tool.provider().query_score(tool.descriptor(), query)));
    let own = match scored {
        Ok(Ok(score)) => score,
        Ok(Err(e)) => {
            warn!(tool = %tool.name(), error = %e, "Search - Check if tool matches query");
            0
        }
        Err(_) => {
            warn!(tool = %tool.name(), error = "scorer panicked", "Search - Check if tool matches query");
            0
        }
    };
    let from_children = tool
        .children()
        .iter()
        .map(|child| effective_score(child, query, scores))
        .max()
        .unwrap_or(0);
    let inherited = if from_children > 0 {
        from_children.saturating_sub(1).max(1)
    } else {
        0
    };

    let score = own.max(inherited);
    if let Some(slot) = scores.get_mut(tool.id().index()) {
        *slot = score;
    }
    score
}

/// Ask one provider whether it can handle `content`.
///
/// Failures are logged and count as "cannot handle"; they never affect other
/// providers.
pub async fn match_content(tool: &MatchedProvider, content: &str) -> bool {
    match tool.provider().can_handle(content).await {
        Ok(handles) => handles,
        Err(e) => {
            warn!(tool = %tool.name(), error = %e, "SmartDetection - Check if tool is recommended");
            false
        }
    }
}

/// One entry of a search result list.
#[derive(Debug, Clone)]
pub enum SearchItem {
    Tool(Arc<MatchedProvider>),
    /// Placeholder rendered when nothing matched.
    NoResultFound,
}

impl SearchItem {
    pub fn tool(&self) -> Option<&Arc<MatchedProvider>> {
        match self {
            SearchItem::Tool(tool) => Some(tool),
            SearchItem::NoResultFound => None,
        }
    }
}

/// The outcome of one search interaction.
#[derive(Debug, Clone)]
pub struct SearchResultSet {
    query: String,
    items: Vec<SearchItem>,
}

impl SearchResultSet {
    /// Build the displayed list for `query`. An empty match list becomes the
    /// single [`SearchItem::NoResultFound`] placeholder; a blank query yields
    /// an empty (cleared) list.
    pub fn from_matches(query: &str, matches: Vec<QueryMatch>) -> Self {
        let items = if query.trim().is_empty() {
            Vec::new()
        } else if matches.is_empty() {
            vec![SearchItem::NoResultFound]
        } else {
            matches.into_iter().map(|m| SearchItem::Tool(m.tool)).collect()
        };
        Self {
            query: query.to_string(),
            items,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn items(&self) -> &[SearchItem] {
        &self.items
    }

    /// Matched tools, without the placeholder.
    pub fn tools(&self) -> Vec<Arc<MatchedProvider>> {
        self.items.iter().filter_map(SearchItem::tool).cloned().collect()
    }

    /// True when the list holds only the no-result placeholder.
    pub fn is_no_result(&self) -> bool {
        matches!(self.items.as_slice(), [SearchItem::NoResultFound])
    }

    /// True for a blank query: the list should be cleared.
    pub fn is_cleared(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toolshed_config::{DetectorKind, Placement};

    use crate::BoxFuture;
    use crate::provider::{DetectorProvider, ProviderError, ToolProvider};
    use crate::registry::ProviderRegistry;

    fn noop() -> Arc<dyn ToolProvider> {
        Arc::new(DetectorProvider::new(DetectorKind::None))
    }

    fn names(matches: &[QueryMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.tool.name()).collect()
    }

    fn example_catalog() -> ToolCatalog {
        let registry = ProviderRegistry::builder()
            .register(
                ProviderDescriptor::new("a", "a", "All tools").with_placement(Placement::Header),
                noop(),
            )
            .register(ProviderDescriptor::new("b", "b", "Formatter").with_keywords(&["json"]), noop())
            .register(ProviderDescriptor::new("c", "c", "Encoder").with_keywords(&["base64"]), noop())
            .build()
            .unwrap();
        ToolCatalog::materialize(&registry)
    }

    #[test]
    fn test_keyword_query() {
        let catalog = example_catalog();
        assert_eq!(names(&match_query(&catalog, "json")), vec!["b"]);
        assert_eq!(names(&match_query(&catalog, "  JSON ")), vec!["b"]);
        assert!(match_query(&catalog, "zz").is_empty());
        assert!(match_query(&catalog, "   ").is_empty());
    }

    #[test]
    fn test_descriptor_score_tiers() {
        let d = ProviderDescriptor::new("x", "x", "JSON Formatter").with_keywords(&["indent"]);
        assert_eq!(descriptor_score(&d, "json formatter"), SCORE_NAME_EXACT);
        assert_eq!(descriptor_score(&d, "json"), SCORE_NAME_PREFIX);
        assert_eq!(descriptor_score(&d, "form"), SCORE_NAME_WORD);
        assert_eq!(descriptor_score(&d, "matter"), SCORE_NAME_SUBSTRING);
        assert_eq!(descriptor_score(&d, "indent"), SCORE_KEYWORD_EXACT);
        assert_eq!(descriptor_score(&d, "ind"), SCORE_KEYWORD_PREFIX);
        assert_eq!(descriptor_score(&d, "dent"), SCORE_KEYWORD_SUBSTRING);
        assert_eq!(descriptor_score(&d, "yaml"), 0);
    }

    #[test]
    fn test_ranking_and_stable_ties() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("sub", "sub", "Unjsonify"), noop())
            .register(ProviderDescriptor::new("first", "first", "JSON One"), noop())
            .register(ProviderDescriptor::new("second", "second", "JSON Two"), noop())
            .register(ProviderDescriptor::new("exact", "exact", "json"), noop())
            .build()
            .unwrap();
        let catalog = ToolCatalog::materialize(&registry);
        assert_eq!(
            names(&match_query(&catalog, "json")),
            vec!["exact", "first", "second", "sub"]
        );
    }

    #[test]
    fn test_group_included_through_descendant() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("enc", "enc", "Encoders"), noop())
            .register(
                ProviderDescriptor::new("b64", "b64", "Base64 Text").with_parent("enc"),
                noop(),
            )
            .register(ProviderDescriptor::new("other", "other", "Other"), noop())
            .build()
            .unwrap();
        let catalog = ToolCatalog::materialize(&registry);
        let matches = match_query(&catalog, "base64");
        assert_eq!(names(&matches), vec!["b64", "enc"]);
        assert_eq!(matches[1].score, matches[0].score - 1);
    }

    struct BrokenScorer;

    impl ToolProvider for BrokenScorer {
        fn can_handle<'a>(&'a self, _content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
            Box::pin(async { Err(ProviderError::Evaluation("boom".to_string())) })
        }

        fn query_score(&self, _descriptor: &ProviderDescriptor, _query: &str) -> Result<u32, ProviderError> {
            Err(ProviderError::Evaluation("boom".to_string()))
        }
    }

    #[test]
    fn test_failing_scorer_is_isolated() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("broken", "broken", "JSON Broken"), Arc::new(BrokenScorer))
            .register(ProviderDescriptor::new("ok", "ok", "JSON Ok"), noop())
            .build()
            .unwrap();
        let catalog = ToolCatalog::materialize(&registry);
        assert_eq!(names(&match_query(&catalog, "json")), vec!["ok"]);
    }

    struct PanickingScorer;

    impl ToolProvider for PanickingScorer {
        fn can_handle<'a>(&'a self, _content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
            Box::pin(async { Ok(false) })
        }

        fn query_score(&self, _descriptor: &ProviderDescriptor, _query: &str) -> Result<u32, ProviderError> {
            panic!("scorer panicked")
        }
    }

    #[test]
    fn test_panicking_scorer_is_isolated() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("bad", "bad", "JSON Bad"), Arc::new(PanickingScorer))
            .register(ProviderDescriptor::new("ok", "ok", "JSON Ok"), noop())
            .build()
            .unwrap();
        let catalog = ToolCatalog::materialize(&registry);
        assert_eq!(names(&match_query(&catalog, "json")), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_match_content_swallows_failures() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("broken", "broken", "Broken"), Arc::new(BrokenScorer))
            .register(
                ProviderDescriptor::new("json", "json", "JSON"),
                Arc::new(DetectorProvider::new(DetectorKind::Json)),
            )
            .build()
            .unwrap();
        let catalog = ToolCatalog::materialize(&registry);
        assert!(!match_content(&catalog.all()[0], "{}").await);
        assert!(match_content(&catalog.all()[1], "{}").await);
    }

    #[test]
    fn test_result_set_placeholder() {
        let catalog = example_catalog();
        let hits = SearchResultSet::from_matches("json", match_query(&catalog, "json"));
        assert!(!hits.is_no_result());
        assert_eq!(hits.tools().len(), 1);

        let none = SearchResultSet::from_matches("zz", match_query(&catalog, "zz"));
        assert!(none.is_no_result());
        assert!(none.tools().is_empty());
        assert_eq!(none.query(), "zz");

        let cleared = SearchResultSet::from_matches("", Vec::new());
        assert!(cleared.is_cleared());
        assert!(!cleared.is_no_result());
    }
}
