use crate::config::ReasoningTags;

/// How the accumulated content of a turn divides into reasoning and answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasoningSplit<'a> {
    pub reasoning: &'a str,
    pub message: &'a str,
}

/// Splits `text`, the full content received so far, on the reasoning tags.
///
/// Tag positions are always searched in the whole text, so a tag cut across
/// two chunks is found once both halves have arrived. While the text could
/// still be the start of the opening tag nothing is published, and a partial
/// closing tag at the end is held back from the reasoning. Content that does
/// not open with the tag is treated as a plain answer.
pub fn split_reasoning<'a>(text: &'a str, tags: &ReasoningTags) -> ReasoningSplit<'a> {
    let open = tags.open.as_str();
    let close = tags.close.as_str();
    if open.is_empty() || close.is_empty() {
        return ReasoningSplit {
            reasoning: "",
            message: text,
        };
    }

    let body = text.trim_start();
    if body.len() < open.len() && open.starts_with(body) {
        return ReasoningSplit::default();
    }

    let Some(inner) = body.strip_prefix(open) else {
        return ReasoningSplit {
            reasoning: "",
            message: text,
        };
    };

    match inner.find(close) {
        Some(end) => ReasoningSplit {
            reasoning: &inner[..end],
            message: &inner[end + close.len()..],
        },
        None => ReasoningSplit {
            reasoning: &inner[..inner.len() - partial_tag_suffix(inner, close)],
            message: "",
        },
    }
}

/// Length of the longest proper prefix of `tag` that `text` ends with.
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    tag.char_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .rev()
        .find(|&i| text.ends_with(&tag[..i]))
        .unwrap_or(0)
}
