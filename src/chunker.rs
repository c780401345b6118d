//! Text chunking: split cleaned text into overlapping, boundary-respecting
//! chunks for embedding and retrieval.
//!
//! Pure function, no I/O: normalize whitespace, then cascade through
//! paragraph -> sentence -> word splitting, packing greedily up to
//! `chunk_size` and carrying a sentence-aware overlap tail into the next
//! chunk.

use crate::config::ChunkerConfig;
use regex::Regex;
use std::sync::OnceLock;

fn whitespace_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").unwrap())
}

fn excess_newline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn sentence_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+\s+").unwrap())
}

struct Atom {
    text: String,
    /// Separator to insert before the next atom once this one is appended.
    sep_after: &'static str,
}

/// Splits cleaned text into chunk bodies per `config`.
///
/// Empty or whitespace-only input yields an empty sequence. Every body is
/// at most `config.chunk_size` bytes unless a single atomic token (a word
/// with no internal whitespace) exceeds it, in which case that token is
/// emitted alone.
pub fn chunk(text: &str, config: &ChunkerConfig) -> Vec<String> {
    chunk_with(text, config.chunk_size, config.overlap)
}

/// Same as [`chunk`] but with explicit parameters, useful for tests and
/// one-off calls that do not have a `ChunkerConfig` at hand.
pub fn chunk_with(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.trim().is_empty() {
        return Vec::new();
    }
    let atoms = build_atoms(&normalized, chunk_size);
    pack_atoms(&atoms, chunk_size, overlap)
}

fn normalize_whitespace(text: &str) -> String {
    let collapsed = whitespace_run_re().replace_all(text, " ");
    let capped = excess_newline_re().replace_all(&collapsed, "\n\n");
    capped.trim().to_string()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in sentence_boundary_re().find_iter(text) {
        let piece = text[last..m.end()].trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
        last = m.end();
    }
    if last < text.len() {
        let piece = text[last..].trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
    }
    sentences
}

fn build_atoms(normalized: &str, chunk_size: usize) -> Vec<Atom> {
    let paragraphs: Vec<&str> = normalized
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    let mut atoms = Vec::new();
    let n_paragraphs = paragraphs.len();

    for (pi, para) in paragraphs.iter().enumerate() {
        let para_sep: &'static str = if pi + 1 < n_paragraphs { "\n\n" } else { "" };

        if para.len() <= chunk_size {
            atoms.push(Atom {
                text: para.to_string(),
                sep_after: para_sep,
            });
            continue;
        }

        let sentences = split_sentences(para);
        let n_sentences = sentences.len();

        for (si, sentence) in sentences.iter().enumerate() {
            let sent_sep: &'static str = if si + 1 < n_sentences { " " } else { para_sep };

            if sentence.len() <= chunk_size {
                atoms.push(Atom {
                    text: sentence.clone(),
                    sep_after: sent_sep,
                });
                continue;
            }

            let words: Vec<&str> = sentence.split_whitespace().collect();
            let n_words = words.len();
            for (wi, word) in words.iter().enumerate() {
                let word_sep: &'static str = if wi + 1 < n_words { " " } else { sent_sep };
                atoms.push(Atom {
                    text: word.to_string(),
                    sep_after: word_sep,
                });
            }
        }
    }

    atoms
}

fn pack_atoms(atoms: &[Atom], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for atom in atoms {
        if atom.text.len() > chunk_size {
            if !current.trim().is_empty() {
                chunks.push(current.trim().to_string());
            }
            chunks.push(atom.text.clone());
            current = String::new();
            continue;
        }

        loop {
            let joined = if current.is_empty() {
                atom.text.clone()
            } else {
                format!("{} {}", current.trim_end(), atom.text.trim_start())
            };

            if current.is_empty() || joined.len() <= chunk_size {
                current = joined;
                break;
            }

            chunks.push(current.trim().to_string());
            let tail = overlap_tail(&current, overlap);
            current = if tail.trim() == current.trim() {
                String::new()
            } else {
                tail
            };
        }

        let _ = atom.sep_after; // reserved for a future structure-preserving mode
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

/// Scans the tail of `chunk` for the last sentence terminator within the
/// last `overlap` bytes; if found, the text after it becomes the overlap,
/// else the raw last `overlap` bytes are used.
fn overlap_tail(chunk: &str, overlap: usize) -> String {
    if overlap == 0 || chunk.is_empty() {
        return String::new();
    }

    let char_count = chunk.chars().count();
    let take = overlap.min(char_count);
    let skip = char_count - take;
    let tail: String = chunk.chars().skip(skip).collect();

    if let Some(pos) = tail.rfind(['.', '!', '?']) {
        let after = tail[pos + 1..].trim_start();
        if !after.is_empty() {
            return after.to_string();
        }
    }

    tail.trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chunk_delegates_to_chunk_with_using_config_fields() {
        let config = ChunkerConfig {
            chunk_size: 500,
            overlap: 50,
        };
        assert_eq!(
            chunk("This is a short text.", &config),
            chunk_with("This is a short text.", 500, 50)
        );
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_with("", 500, 50).is_empty());
        assert!(chunk_with("   \n\n  ", 500, 50).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_with("This is a short text.", 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "This is a short text.");
    }

    #[test]
    fn long_text_produces_multiple_bounded_chunks() {
        let paragraph = "This is sentence one. This is sentence two. This is sentence three. This is sentence four. This is sentence five. This is sentence six.";
        let text = std::iter::repeat(paragraph)
            .take(80)
            .collect::<Vec<_>>()
            .join("\n\n");
        assert!(text.len() >= 10_000);

        let chunks = chunk_with(&text, 500, 50);
        assert!(chunks.len() >= 18, "expected >= 18 chunks, got {}", chunks.len());
        for c in &chunks {
            assert!(c.len() <= 500, "chunk exceeded bound: {} bytes", c.len());
        }
    }

    #[test]
    fn a_single_oversized_word_is_emitted_alone() {
        let word = "x".repeat(600);
        let chunks = chunk_with(&word, 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], word);
    }

    #[test]
    fn an_oversized_word_does_not_poison_neighboring_chunks() {
        let word = "x".repeat(600);
        let text = format!("Lead in sentence. {} Trailing sentence here.", word);
        let chunks = chunk_with(&text, 500, 50);
        assert!(chunks.iter().any(|c| c == &word));
    }

    proptest! {
        #[test]
        fn chunk_size_bound_holds_for_word_safe_inputs(
            words in prop::collection::vec("[a-zA-Z]{1,20}", 0..200),
            chunk_size in 20usize..200,
            overlap in 0usize..19,
        ) {
            let text = words.join(" ");
            let chunks = chunk_with(&text, chunk_size, overlap);
            for c in &chunks {
                prop_assert!(c.len() <= chunk_size);
            }
        }

        #[test]
        fn overlap_is_bounded_and_is_a_suffix_of_the_prior_chunk(
            words in prop::collection::vec("[a-zA-Z]{1,10}", 5..200),
            chunk_size in 30usize..150,
            overlap in 1usize..29,
        ) {
            let text = words.join(" ");
            let chunks = chunk_with(&text, chunk_size, overlap);
            for pair in chunks.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                let shared = common_prefix_of_suffix(prev, next, overlap);
                prop_assert!(shared.len() <= overlap);
                if !shared.is_empty() {
                    prop_assert!(prev.ends_with(&shared));
                }
            }
        }
    }

    /// Finds the longest prefix of `next` (up to `max_len` bytes) that is
    /// also a suffix of `prev`, used only to assert the overlap invariant.
    fn common_prefix_of_suffix(prev: &str, next: &str, max_len: usize) -> String {
        let max_len = max_len.min(prev.len()).min(next.len());
        for len in (0..=max_len).rev() {
            let next_prefix = &next[..len];
            if prev.ends_with(next_prefix) {
                return next_prefix.to_string();
            }
        }
        String::new()
    }
}
