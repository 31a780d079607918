/// Characters that end a sentence fragment. The terminator stays attached to
/// the fragment it closes.
pub const SENTENCE_TERMINATORS: [char; 4] = ['。', '！', '？', '\n'];

/// Splits `text` into chunks of roughly `chunk_size` characters, cutting
/// only at sentence boundaries.
///
/// Fragments are accumulated until adding the next one would push the buffer
/// past `chunk_size`; the buffer is then emitted and the next one starts with
/// its last `overlap` characters. A single fragment longer than `chunk_size`
/// is never split, so such a chunk may exceed the target. Lengths are counted
/// in characters, not bytes.
pub fn chunk_text_semantically(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for fragment in text.split_inclusive(|c: char| SENTENCE_TERMINATORS.contains(&c)) {
        let fragment_len = fragment.chars().count();

        if !current.is_empty() && current_len.saturating_add(fragment_len) > chunk_size {
            let tail = char_tail(&current, overlap);
            let mut next = String::with_capacity(tail.len().saturating_add(fragment.len()));
            next.push_str(tail);
            next.push_str(fragment);

            current_len = tail.chars().count().saturating_add(fragment_len);
            chunks.push(std::mem::replace(&mut current, next));
        } else {
            current.push_str(fragment);
            current_len = current_len.saturating_add(fragment_len);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// The last `count` characters of `text` (all of it when shorter).
fn char_tail(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    let skip = text.chars().count().saturating_sub(count);
    text.char_indices()
        .nth(skip)
        .and_then(|(start, _)| text.get(start..))
        .unwrap_or_default()
}
