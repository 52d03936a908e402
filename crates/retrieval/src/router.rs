//! Decides which retrieval sources to consult for an instruction.
//!
//! Generic words like "search" must not trigger web search by themselves;
//! the router privileges explicit user intent. Every trigger list is a
//! named, public constant so it can be unit-tested and extended without
//! touching the decision procedure. An optional external classifier can
//! refine the decision; its output is parsed strictly and any malformed
//! reply falls back to the heuristics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Phrases that explicitly forbid web search.
pub const WEB_OPT_OUT_PHRASES: &[&str] = &[
    "web検索なし",
    "ウェブ検索なし",
    "インターネット検索なし",
    "ローカルのみ",
    "ローカル記事のみ",
    "ローカルだけ",
    "オフライン",
    "ragのみ",
    "ragだけ",
    "ローカル検索のみ",
    "no web search",
    "without web search",
    "no internet",
    "local only",
    "local articles only",
    "offline",
];

/// Subset of the opt-out phrases that also force local retrieval on.
pub const LOCAL_ONLY_PHRASES: &[&str] = &[
    "ragのみ",
    "ragだけ",
    "ローカルのみ",
    "ローカル記事のみ",
    "ローカル検索のみ",
    "local only",
    "local articles only",
];

/// Words referring to things the user has written before.
pub const PAST_REFERENCE_WORDS: &[&str] = &[
    "過去",
    "以前",
    "これまで",
    "アーカイブ",
    "書いてる",
    "書いた",
    "past",
    "previous",
    "previously",
    "earlier",
    "archive",
    "wrote",
];

/// Words referring to the user's own corpus.
pub const CORPUS_REFERENCE_WORDS: &[&str] = &[
    "記事",
    "メモ",
    "ノート",
    "ブログ",
    "ポスト",
    "article",
    "articles",
    "note",
    "notes",
    "blog",
    "post",
    "posts",
];

/// Summarization / overview verbs.
pub const SUMMARIZE_WORDS: &[&str] = &[
    "まとめ",
    "要約",
    "整理",
    "振り返り",
    "一覧",
    "ダイジェスト",
    "総括",
    "ハイライト",
    "summarize",
    "summary",
    "overview",
    "organize",
    "digest",
    "recap",
];

/// Explicit recency cues that justify consulting the web.
pub const RECENCY_WORDS: &[&str] = &[
    "最新",
    "ニュース",
    "速報",
    "今日",
    "今週",
    "今月",
    "今年",
    "現在",
    "最新情報",
    "最新動向",
    "最新状況",
    "latest",
    "news",
    "today",
    "this week",
    "this month",
    "this year",
    "current",
    "breaking",
];

/// Phrases signalling the user wants content appended rather than rewritten.
pub const APPEND_PHRASES: &[&str] = &[
    "追記",
    "追加",
    "付け足し",
    "付け加え",
    "末尾に",
    "最後に",
    "補足",
    "加筆",
    "追補",
    "文末に",
    "終わりに",
    "append",
    "add to the end",
    "postscript",
];

/// Which retrieval sources to consult before generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalRoute {
    pub local: bool,
    pub web: bool,
}

/// External classifier returning raw model output for an instruction.
/// The router owns the parsing; implementations just transport text.
#[async_trait]
pub trait RouteClassifier: Send + Sync {
    async fn classify(&self, instruction: &str) -> anyhow::Result<String>;
}

/// Best-effort retrieval router. Wrong answers degrade to "no retrieval
/// context", never to an error.
pub struct Router {
    classifier: Option<Arc<dyn RouteClassifier>>,
    local_available: bool,
}

impl Router {
    /// `local_available` is whether a retrieval directory is configured;
    /// when it is not, `local` is forced off in every decision path.
    #[must_use]
    pub fn new(local_available: bool) -> Self {
        Self {
            classifier: None,
            local_available,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RouteClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub async fn decide(&self, instruction: &str) -> RetrievalRoute {
        let text = instruction.to_lowercase();

        // Explicit opt-outs win over everything else.
        if contains_any(&text, WEB_OPT_OUT_PHRASES) {
            return self.mask(RetrievalRoute {
                local: contains_any(&text, LOCAL_ONLY_PHRASES),
                web: false,
            });
        }

        // "Summarize my past articles" without a recency cue never needs
        // the web.
        if has_strong_past_local_intent(&text)
            && contains_any(&text, SUMMARIZE_WORDS)
            && !contains_any(&text, RECENCY_WORDS)
        {
            return self.mask(RetrievalRoute {
                local: true,
                web: false,
            });
        }

        if let Some(classifier) = &self.classifier {
            match classifier.classify(instruction).await {
                Ok(raw) => match parse_route_json(&raw) {
                    Ok(route) => return self.mask(route),
                    Err(e) => log::warn!(
                        "route classifier returned malformed output, using heuristics: {e}"
                    ),
                },
                Err(e) => log::warn!("route classifier call failed, using heuristics: {e}"),
            }
        }

        self.mask(heuristic_route(&text))
    }

    fn mask(&self, mut route: RetrievalRoute) -> RetrievalRoute {
        if !self.local_available {
            route.local = false;
        }
        route
    }
}

/// Heuristic decision used when no classifier is configured or it fails.
fn heuristic_route(text: &str) -> RetrievalRoute {
    let past_local = has_strong_past_local_intent(text);
    let recency = contains_any(text, RECENCY_WORDS);
    RetrievalRoute {
        local: past_local,
        web: recency && !past_local,
    }
}

/// Strict parse of classifier output: exactly `{"local": bool, "web": bool}`.
/// Prose, code fences and extra keys are rejected, which routes the caller
/// to the heuristic fallback.
pub fn parse_route_json(raw: &str) -> serde_json::Result<RetrievalRoute> {
    serde_json::from_str(raw.trim())
}

/// True when the instruction mentions both past writing and the user's
/// corpus (e.g. "past" + "articles").
#[must_use]
pub fn has_strong_past_local_intent(text: &str) -> bool {
    contains_any(text, PAST_REFERENCE_WORDS) && contains_any(text, CORPUS_REFERENCE_WORDS)
}

/// True when the instruction asks for content to be appended.
#[must_use]
pub fn is_append_instruction(instruction: &str) -> bool {
    contains_any(&instruction.to_lowercase(), APPEND_PHRASES)
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}
