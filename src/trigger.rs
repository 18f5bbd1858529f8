use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"https?://[^\s<>"{}|\\^`\[\]]+|www\.[^\s<>"{}|\\^`\[\]]+|[a-zA-Z0-9][-a-zA-Z0-9]*\.[a-zA-Z]{2,}(?:/[^\s<>"{}|\\^`\[\]]*)?"#,
    )
    .expect("static URL pattern is valid")
});

/// Byte ranges of everything in `text` that looks like a link.
fn url_spans(text: &str) -> Vec<Range<usize>> {
    URL_RE.find_iter(text).map(|m| m.range()).collect()
}

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Whole-word occurrence of `word` in `text`, outside any link.
/// Both arguments must already be lowercase.
fn contains_word(text: &str, word: &str, urls: &[Range<usize>]) -> bool {
    if word.is_empty() {
        return false;
    }

    // Every start position is tried so overlapping occurrences are not skipped
    let mut from = 0;
    while let Some(offset) = text[from..].find(word) {
        let start = from + offset;
        let end = start + word.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let bounded = !is_word_char(before) && !is_word_char(after);
        if bounded && !urls.iter().any(|url| start < url.end && end > url.start) {
            return true;
        }
        from = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// First trigger word found in `content`, matched case-insensitively.
pub fn find_trigger<'a, I>(content: &str, words: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let text = content.to_lowercase();
    let urls = url_spans(&text);
    words
        .into_iter()
        .find(|word| contains_word(&text, &word.to_lowercase(), &urls))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_match() {
        assert_eq!(find_trigger("I need help please", ["help"]), Some("help"));
        assert_eq!(find_trigger("HELP!", ["help"]), Some("help"));
        assert_eq!(find_trigger("(help)", ["help"]), Some("help"));
        assert_eq!(find_trigger("helpful tips", ["help"]), None);
        assert_eq!(find_trigger("self-help", ["help"]), Some("help"));
        assert_eq!(find_trigger("help2", ["help"]), None);
    }

    #[test]
    fn test_multi_word_trigger() {
        assert_eq!(
            find_trigger("hey Shape Bot, you there?", ["shape bot"]),
            Some("shape bot")
        );
    }

    #[test]
    fn test_overlapping_occurrences() {
        assert_eq!(find_trigger("haha ha ha", ["ha ha"]), Some("ha ha"));
        assert_eq!(find_trigger("aaa aa", ["aa"]), Some("aa"));
        assert_eq!(find_trigger("aaaa", ["aa"]), None);
    }

    #[test]
    fn test_urls_are_ignored() {
        assert_eq!(find_trigger("see https://help.example.com/page", ["help"]), None);
        assert_eq!(find_trigger("visit www.help.org", ["help"]), None);
        assert_eq!(find_trigger("check help.com", ["help"]), None);
        assert_eq!(
            find_trigger("help at https://example.com", ["help"]),
            Some("help")
        );
    }

    #[test]
    fn test_first_matching_word_wins() {
        let words = ["shape", "help"];
        assert_eq!(find_trigger("help me shape", words), Some("shape"));
        assert_eq!(find_trigger("nothing here", words), None);
        assert_eq!(find_trigger("anything", [""]), None);
    }

    #[test]
    fn test_non_ascii_neighbours() {
        assert_eq!(find_trigger("héllo help", ["help"]), Some("help"));
        assert_eq!(find_trigger("ünicode", ["nicode"]), Some("nicode"));
    }
}
