use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{3000}\s]+").expect("whitespace pattern is valid"));

// Han/Hiragana/Katakana runs and ASCII word-ish runs; everything else is a
// token boundary.
static TOKEN_RUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Han}\p{Hiragana}\p{Katakana}a-z0-9#\-_.]+").expect("token pattern is valid")
});

/// Shared tokenization for queries and chunk text: lowercase, collapse
/// full-width/half-width whitespace, then extract maximal token runs.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let collapsed = WHITESPACE_RUNS.replace_all(&lowered, " ");
    TOKEN_RUNS
        .find_iter(&collapsed)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_words_are_lowercased() {
        assert_eq!(tokenize("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn punctuation_is_a_boundary() {
        assert_eq!(tokenize("foo, bar! (baz)"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn word_internal_symbols_are_kept() {
        assert_eq!(
            tokenize("search-console v2.0 #tag snake_case"),
            vec!["search-console", "v2.0", "#tag", "snake_case"]
        );
    }

    #[test]
    fn cjk_runs_are_tokens() {
        assert_eq!(tokenize("検索エンジン最適化"), vec!["検索エンジン最適化"]);
        assert_eq!(tokenize("過去の記事"), vec!["過去の記事"]);
    }

    #[test]
    fn full_width_space_separates_cjk_runs() {
        assert_eq!(tokenize("検索\u{3000}記事"), vec!["検索", "記事"]);
    }

    #[test]
    fn mixed_scripts_split_on_script_boundaries_only_at_non_tokens() {
        assert_eq!(tokenize("Google検索 SEO"), vec!["google検索", "seo"]);
    }

    #[test]
    fn empty_and_symbol_only_input_yield_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!?!?").is_empty());
    }
}
