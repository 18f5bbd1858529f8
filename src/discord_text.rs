use poise::serenity_prelude as serenity;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static USER_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("static mention pattern is valid"));
static SHAPES_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://files\.shapes\.inc/[^\s<>"')]*"#).expect("static file pattern is valid")
});
static HORIZONTAL_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("static whitespace pattern is valid"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("static link pattern is valid"));

const IMAGE_LINK_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];
const AUDIO_LINK_EXTENSIONS: [&str; 4] = [".mp3", ".wav", ".ogg", ".m4a"];

const REPLY_SNIPPET_CHARS: usize = 50;

pub fn strip_bot_mentions(input: &str, bot_id: u64) -> String {
    let mention = format!("<@{}>", bot_id);
    let mention_nick = format!("<@!{}>", bot_id);

    input
        .replace(&mention, "")
        .replace(&mention_nick, "")
        .trim()
        .to_string()
}

/// Replace `<@id>` mentions with `@name`, or `@User(id)` when the name is unknown.
pub fn resolve_mentions(input: &str, lookup: impl Fn(u64) -> Option<String>) -> String {
    USER_MENTION_RE
        .replace_all(input, |caps: &Captures| {
            let raw = &caps[1];
            match raw.parse::<u64>().ok().and_then(&lookup) {
                Some(name) => format!("@{}", name),
                None => format!("@User({})", raw),
            }
        })
        .into_owned()
}

pub fn extract_message_text(message: &serenity::Message) -> String {
    let mut parts = Vec::new();

    let content = message.content.trim();
    if !content.is_empty() {
        parts.push(content.to_string());
    }

    for embed in &message.embeds {
        if let Some(title) = embed.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(title.to_string());
        } else if let Some(desc) = embed
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            parts.push(desc.to_string());
        }
    }

    parts.join("\n")
}

/// Label for an attachment that is not forwarded as a media part.
pub fn attachment_label(content_type: Option<&str>, filename: &str) -> String {
    let kind = match content_type {
        Some(ct) if ct.starts_with("image/") => "Image",
        Some(ct) if ct.starts_with("audio/") => "Audio",
        Some(ct) if ct.starts_with("video/") => "Video",
        _ => "File",
    };
    format!("[{}: {}]", kind, filename)
}

pub fn sticker_label(name: &str) -> String {
    format!("[Sticker: {}]", name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedMedia {
    Image,
    Audio,
}

/// Image and audio links pasted in message text, recognised by extension.
pub fn media_links(text: &str) -> Vec<(LinkedMedia, &str)> {
    LINK_RE
        .find_iter(text)
        .filter_map(|m| {
            let url = m.as_str();
            let lower = url.to_lowercase();
            if IMAGE_LINK_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
                Some((LinkedMedia::Image, url))
            } else if AUDIO_LINK_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
                Some((LinkedMedia::Audio, url))
            } else {
                None
            }
        })
        .collect()
}

/// The message being replied to, as the prompt shows it.
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub author: &'a str,
    pub text: &'a str,
}

/// Everything that goes into the text part of a relay request.
#[derive(Debug, Clone, Copy)]
pub struct PromptParts<'a> {
    pub author: &'a str,
    /// Message content with mentions already resolved
    pub content: &'a str,
    pub labels: &'a [String],
    pub reply: Option<ReplyContext<'a>>,
    /// The message was nothing but a ping of the bot
    pub bare_ping: bool,
}

fn reply_snippet(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > REPLY_SNIPPET_CHARS {
        let head: String = text.chars().take(REPLY_SNIPPET_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

pub fn build_prompt(parts: &PromptParts<'_>) -> String {
    let mut pieces = Vec::new();
    if let Some(reply) = parts.reply {
        pieces.push(format!(
            "[Replying to {}: {}]",
            reply.author,
            reply_snippet(reply.text)
        ));
    }
    let content = parts.content.trim();
    if !content.is_empty() {
        pieces.push(content.to_string());
    }
    pieces.extend(parts.labels.iter().cloned());
    let body = pieces.join(" ");

    if parts.bare_ping && body.trim().is_empty() {
        format!(
            "{} is trying to get your attention (they pinged you). If this message is a reply \
             to another message, check the original message to understand what they need.",
            parts.author
        )
    } else if !body.is_empty() {
        format!("{}: {}", parts.author, body)
    } else {
        format!("{} sent a message.", parts.author)
    }
}

/// Pull `files.shapes.inc` links out of an AI answer.
/// Returns the cleaned text and the links in order of appearance.
pub fn extract_shapes_files(text: &str) -> (String, Vec<String>) {
    let urls: Vec<String> = SHAPES_FILE_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    if urls.is_empty() {
        return (text.trim().to_string(), urls);
    }

    let stripped = SHAPES_FILE_RE.replace_all(text, "");
    let cleaned = stripped
        .lines()
        .map(|line| HORIZONTAL_WS_RE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    (cleaned.trim().to_string(), urls)
}

/// Sentences with their trailing whitespace, split after `.`, `!` or `?`.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            let mut end = i + c.len_utf8();
            while let Some(&(j, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                end = j + w.len_utf8();
                chars.next();
            }
            out.push(&text[start..end]);
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Break a sentence longer than `limit` on word boundaries, force-splitting
/// words that are longer than `limit` themselves.
fn split_words(sentence: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(limit).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let sep = usize::from(!current.is_empty());
        if current.chars().count() + sep + word_len > limit {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn push_piece(chunks: &mut Vec<String>, current: &mut String, piece: &str, limit: usize) {
    let needed = current.chars().count() + piece.trim_end().chars().count();
    if !current.trim().is_empty() && needed > limit {
        chunks.push(std::mem::take(current).trim_end().to_string());
    }
    if current.trim().is_empty() {
        current.clear();
        current.push_str(piece.trim_start());
    } else {
        current.push_str(piece);
    }
}

/// Split text into Discord-sized chunks of at most `limit` characters,
/// preferring sentence boundaries, then word boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in split_sentences(text) {
        if sentence.trim().chars().count() <= limit {
            push_piece(&mut chunks, &mut current, sentence, limit);
        } else {
            for piece in split_words(sentence, limit) {
                push_piece(&mut chunks, &mut current, &format!("{} ", piece), limit);
            }
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_and_resolve_mentions() {
        assert_eq!(strip_bot_mentions("<@99> hi <@!99>", 99), "hi");

        let lookup = |id: u64| (id == 5).then(|| "Ada".to_string());
        assert_eq!(
            resolve_mentions("hey <@5> and <@!6>", lookup),
            "hey @Ada and @User(6)"
        );
    }

    #[test]
    fn test_media_links_by_extension() {
        let links = media_links(
            "look https://cdn.example.com/cat.PNG?size=2 and <https://x.io/song.mp3> \
             but not https://example.com/page",
        );
        assert_eq!(
            links,
            vec![
                (LinkedMedia::Image, "https://cdn.example.com/cat.PNG?size=2"),
                (LinkedMedia::Audio, "https://x.io/song.mp3"),
            ]
        );
        assert!(media_links("no links here").is_empty());
    }

    #[test]
    fn test_sticker_label() {
        assert_eq!(sticker_label("wave"), "[Sticker: wave]");
    }

    #[test]
    fn test_prompt_formats() {
        let labels = vec!["[Video: clip.mp4]".to_string()];
        let prompt = build_prompt(&PromptParts {
            author: "Ada",
            content: "what is this?",
            labels: &labels,
            reply: Some(ReplyContext {
                author: "Bob",
                text: "a very long message that keeps going and going past fifty chars",
            }),
            bare_ping: false,
        });
        assert_eq!(
            prompt,
            "Ada: [Replying to Bob: a very long message that keeps going and going pas...] \
             what is this? [Video: clip.mp4]"
        );

        let ping = build_prompt(&PromptParts {
            author: "Ada",
            content: "",
            labels: &[],
            reply: None,
            bare_ping: true,
        });
        assert!(ping.starts_with("Ada is trying to get your attention"));

        let empty = build_prompt(&PromptParts {
            author: "Ada",
            content: "  ",
            labels: &[],
            reply: None,
            bare_ping: false,
        });
        assert_eq!(empty, "Ada sent a message.");
    }

    #[test]
    fn test_extract_shapes_files() {
        let (text, files) = extract_shapes_files(
            "Here you go!  https://files.shapes.inc/abc123.png\nEnjoy https://files.shapes.inc/v.mp3)",
        );
        assert_eq!(text, "Here you go!\nEnjoy )");
        assert_eq!(
            files,
            vec![
                "https://files.shapes.inc/abc123.png",
                "https://files.shapes.inc/v.mp3"
            ]
        );

        let (text, files) = extract_shapes_files("  plain answer ");
        assert_eq!(text, "plain answer");
        assert!(files.is_empty());
    }

    #[test]
    fn test_split_short_and_empty() {
        assert_eq!(split_message("hello", 1900), vec!["hello"]);
        assert!(split_message("   ", 1900).is_empty());
    }

    #[test]
    fn test_split_on_sentences() {
        let text = "One two three. Four five six! Seven eight nine?";
        let chunks = split_message(text, 20);
        assert_eq!(
            chunks,
            vec!["One two three.", "Four five six!", "Seven eight nine?"]
        );

        let long: String = (0..200).map(|i| format!("Sentence number {}. ", i)).collect();
        let chunks = split_message(&long, 1900);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1900);
            assert!(chunk.ends_with('.'));
        }
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), long.split_whitespace().count());
    }

    #[test]
    fn test_split_long_sentence_on_words() {
        let text = "word ".repeat(1000);
        let chunks = split_message(&text, 1900);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1900);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, 1000);
    }

    #[test]
    fn test_force_split_giant_word() {
        let text = "é".repeat(5000);
        let chunks = split_message(&text, 1900);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(sizes, vec![1900, 1900, 1200]);
    }

    #[test]
    fn test_split_keeps_line_breaks() {
        let text = format!("{}.\n\n{}.", "a".repeat(15), "b".repeat(15));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec![text.clone()]);

        let chunks = split_message(&text, 20);
        assert_eq!(
            chunks,
            vec![format!("{}.", "a".repeat(15)), format!("{}.", "b".repeat(15))]
        );
    }
}
