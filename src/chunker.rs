//! Transcript chunking for the map/reduce summarization path.
//!
//! Oversize transcripts are split on sentence boundaries and greedily packed
//! into chunks so each summarizer call sees a bounded slice of the input.

/// Packing bounds for one chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// A chunk is only closed early once it holds at least this many bytes.
    pub min_chars: usize,
    /// Target ceiling for a chunk; sentences longer than this are hard-split.
    pub max_chars: usize,
}

/// Split text into sentences: terminal punctuation (`.`, `!`, `?`, possibly
/// repeated) followed by whitespace ends a sentence. Trailing text without a
/// terminator is its own sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().is_none_or(|next| next.is_whitespace()) {
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Greedy-pack sentences into chunks. A new chunk starts when adding the next
/// sentence would push past `max_chars` and the current chunk already meets
/// `min_chars`. Sentences joined with single spaces inside a chunk.
pub fn chunk_transcript(text: &str, config: &ChunkConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        for piece in split_oversized(&sentence, config.max_chars) {
            let projected = if current.is_empty() {
                piece.len()
            } else {
                current.len() + 1 + piece.len()
            };
            if projected > config.max_chars && current.len() >= config.min_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Hard-split a sentence that alone exceeds the ceiling, on char boundaries.
fn split_oversized(sentence: &str, max_chars: usize) -> Vec<String> {
    if sentence.len() <= max_chars {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in sentence.chars() {
        if !current.is_empty() && current.len() + c.len_utf8() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("One sentence. Another one! A third? Tail without end");
        assert_eq!(
            sentences,
            vec![
                "One sentence.",
                "Another one!",
                "A third?",
                "Tail without end"
            ]
        );
    }

    #[test]
    fn keeps_repeated_punctuation_together() {
        let sentences = split_sentences("Wait... really?! Yes.");
        assert_eq!(sentences, vec!["Wait...", "really?!", "Yes."]);
    }

    #[test]
    fn decimal_points_do_not_split() {
        let sentences = split_sentences("Pi is 3.14 roughly. True.");
        assert_eq!(sentences, vec!["Pi is 3.14 roughly.", "True."]);
    }

    #[test]
    fn small_input_is_one_chunk() {
        let config = ChunkConfig {
            min_chars: 10,
            max_chars: 100,
        };
        let chunks = chunk_transcript("Short. Input.", &config);
        assert_eq!(chunks, vec!["Short. Input."]);
    }

    #[test]
    fn packs_respecting_bounds() {
        let config = ChunkConfig {
            min_chars: 20,
            max_chars: 40,
        };
        // Nine 12-byte sentences (11 chars + trailing join space when packed).
        let text = "Aaaaaaaaaa. ".repeat(9);
        let chunks = chunk_transcript(&text, &config);

        assert!(chunks.len() >= 2, "expected multiple chunks");
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.len() <= config.max_chars, "chunk {i} too long");
            if i + 1 < chunks.len() {
                assert!(chunk.len() >= config.min_chars, "chunk {i} too short");
            }
        }
    }

    #[test]
    fn chunks_cover_the_input() {
        let config = ChunkConfig {
            min_chars: 15,
            max_chars: 30,
        };
        let text = "Alpha beta. Gamma delta! Epsilon zeta? Eta theta. Iota kappa.";
        let chunks = chunk_transcript(text, &config);
        let rejoined = chunks.join(" ");
        let normalized: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, normalized.join(" "));
    }

    #[test]
    fn oversized_sentence_is_hard_split() {
        let config = ChunkConfig {
            min_chars: 5,
            max_chars: 10,
        };
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunk_transcript(text, &config);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let config = ChunkConfig {
            min_chars: 5,
            max_chars: 10,
        };
        assert!(chunk_transcript("", &config).is_empty());
        assert!(chunk_transcript("   ", &config).is_empty());
    }
}
