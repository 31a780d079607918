use serde::{Deserialize, Serialize};

/// A contiguous span of a document's text; the unit of retrieval.
///
/// `ordinal` is the chunk's position within its document and doubles as the
/// row of its embedding inside the document's vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub ordinal: usize,
    pub text: String,
}

impl TextChunk {
    pub fn new(ordinal: usize, text: String) -> Self {
        Self { ordinal, text }
    }

    /// Numbers chunk texts in order, starting at zero.
    pub fn from_texts<I>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Self::new(ordinal, text))
            .collect()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
