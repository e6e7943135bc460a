//! Chunker — splits source text into bounded, paragraph-aligned segments.
//!
//! A paragraph is one `\n`-delimited line (blank lines included). Paragraphs
//! are never split, so one longer than `max_chars` becomes its own oversized
//! segment rather than breaking a sentence or a markdown construct.

/// An ordered slice of the source text. `index` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSegment {
    pub index: usize,
    pub text: String,
}

/// Splits `text` into segments of at most `max_chars` characters (counting the
/// newline re-appended to each paragraph).
///
/// Concatenating the segments yields `text` when it ends with a newline, and
/// `text` plus one trailing newline otherwise. Empty input yields no segments.
pub fn split(text: &str, max_chars: usize) -> Vec<ContentSegment> {
    let mut segments = Vec::new();
    if text.is_empty() {
        return segments;
    }

    // A trailing newline terminates the last paragraph; it does not open a new one.
    let body = text.strip_suffix('\n').unwrap_or(text);

    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for paragraph in body.split('\n') {
        let paragraph_chars = paragraph.chars().count() + 1;

        if buffer_chars + paragraph_chars > max_chars && !buffer.is_empty() {
            segments.push(ContentSegment {
                index: segments.len() + 1,
                text: std::mem::take(&mut buffer),
            });
            buffer_chars = 0;
        }

        buffer.push_str(paragraph);
        buffer.push('\n');
        buffer_chars += paragraph_chars;
    }

    if !buffer.is_empty() {
        segments.push(ContentSegment {
            index: segments.len() + 1,
            text: buffer,
        });
    }

    segments
}
