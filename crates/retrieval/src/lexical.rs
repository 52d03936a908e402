/// Term-overlap score for one chunk against a tokenized query.
///
/// Per query token: exact token matches count ×3; tokens strictly
/// containing the query token (two chars or longer) count ×1; a
/// case-insensitive hit in the document title adds 4 and in the chunk
/// heading adds 2.
pub(crate) fn score_chunk(
    query_tokens: &[String],
    chunk_tokens: &[String],
    title: &str,
    heading: &str,
) -> usize {
    let title = title.to_lowercase();
    let heading = heading.to_lowercase();

    let mut score = 0usize;
    for qt in query_tokens {
        let exact = chunk_tokens.iter().filter(|t| *t == qt).count();
        let partial = if qt.chars().count() >= 2 {
            chunk_tokens
                .iter()
                .filter(|t| *t != qt && t.contains(qt.as_str()))
                .count()
        } else {
            0
        };
        score += exact * 3 + partial;
        if title.contains(qt.as_str()) {
            score += 4;
        }
        if !heading.is_empty() && heading.contains(qt.as_str()) {
            score += 2;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::tokenize;
    use pretty_assertions::assert_eq;

    fn score(query: &str, text: &str, title: &str, heading: &str) -> usize {
        score_chunk(&tokenize(query), &tokenize(text), title, heading)
    }

    #[test]
    fn exact_match_plus_title_bonus() {
        // 3 for the exact token, 4 for the title hit: exactly 7.
        assert_eq!(score("foo", "foo bar", "All about foo", ""), 7);
    }

    #[test]
    fn exact_match_alone_scores_three() {
        assert_eq!(score("foo", "foo bar", "Other", ""), 3);
    }

    #[test]
    fn strict_superstring_counts_once() {
        assert_eq!(score("foo", "football", "Other", ""), 1);
    }

    #[test]
    fn exact_token_does_not_double_count_as_partial() {
        assert_eq!(score("foo", "foo football", "Other", ""), 4);
    }

    #[test]
    fn single_char_query_token_gets_no_partial_credit() {
        assert_eq!(score("x", "xylophone", "Other", ""), 0);
        assert_eq!(score("x", "x y", "Other", ""), 3);
    }

    #[test]
    fn heading_bonus_is_two() {
        assert_eq!(score("foo", "bar baz", "Other", "Foo section"), 2);
    }

    #[test]
    fn repeated_exact_matches_accumulate() {
        assert_eq!(score("foo", "foo foo foo", "Other", ""), 9);
    }

    #[test]
    fn multiple_query_tokens_sum() {
        // "foo": 3 exact. "bar": 3 exact + 4 title.
        assert_eq!(score("foo bar", "foo bar", "bar charts", ""), 10);
    }

    #[test]
    fn cjk_title_bonus() {
        // "検索とは何か" is one CJK run containing the query: partial credit
        // plus the title hit.
        assert_eq!(score("検索", "検索とは何か", "検索の歴史", ""), 1 + 4);
        // Separated by a space the query token matches exactly.
        assert_eq!(score("検索", "検索 とは何か", "検索の歴史", ""), 3 + 4);
    }

    #[test]
    fn no_overlap_scores_zero() {
        assert_eq!(score("foo", "bar baz", "Other", "Heading"), 0);
    }
}
