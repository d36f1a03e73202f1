//! Message formatting for the delivery transport: HTML escaping and
//! size-limited chunking.
//!
//! Chunking never splits a paragraph across chunks unless the paragraph
//! alone exceeds the chunk size, in which case it is split on word
//! boundaries. Joining the chunks back with the paragraph separator
//! reproduces the input text.

/// Escape the transport's reserved HTML characters in raw text.
///
/// Applied to raw article text only, never to markup the publisher
/// itself emits (the bold title tags).
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Split `text` into chunks of at most `size` characters, keeping
/// paragraphs intact where possible.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let norm = text.replace("\r\n", "\n");
    let paras: Vec<&str> = norm.split("\n\n").filter(|p| !p.trim().is_empty()).collect();

    let mut chunks: Vec<String> = Vec::new();
    let mut curr = String::new();

    for p in paras {
        if p.chars().count() > size {
            if !curr.is_empty() {
                chunks.push(std::mem::take(&mut curr));
            }
            chunks.extend(split_long_paragraph(p, size));
        } else if curr.is_empty() {
            curr = p.to_string();
        } else if curr.chars().count() + 2 + p.chars().count() <= size {
            curr.push_str("\n\n");
            curr.push_str(p);
        } else {
            chunks.push(std::mem::take(&mut curr));
            curr = p.to_string();
        }
    }

    if !curr.is_empty() {
        chunks.push(curr);
    }
    chunks
}

/// Split an oversized paragraph on word boundaries; words are never
/// truncated, so a single word longer than `size` becomes its own chunk.
fn split_long_paragraph(p: &str, size: usize) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut sub = String::new();
    for w in p.split(' ') {
        if !sub.is_empty() && sub.chars().count() + 1 + w.chars().count() > size {
            parts.push(std::mem::take(&mut sub));
        }
        if !sub.is_empty() {
            sub.push(' ');
        }
        sub.push_str(w);
    }
    if !sub.is_empty() {
        parts.push(sub);
    }
    parts
}
