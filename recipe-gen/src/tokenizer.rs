//! Piece-level tokenizer with a fixed vocabulary.
//!
//! Pieces keep their leading space (` boil`), so decoding is plain
//! concatenation and a decoded continuation can be appended to the prompt
//! verbatim.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LoadError;

pub const EOS_TOKEN: &str = "<|endoftext|>";
pub const UNK_TOKEN: &str = "<|unk|>";

/// Optional space + letters, optional space + digits, optional space +
/// punctuation run, or bare whitespace.
static PIECE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s").expect("Invalid piece regex")
});

// Whitespace is stored with visible stand-ins so vocab files stay one piece per line.
const ESCAPES: [(char, char); 3] = [(' ', 'Ġ'), ('\n', 'Ċ'), ('\t', 'ĉ')];

/// Tokenizer backed by a fixed list of pieces; the index is the id.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: HashMap<String, usize>,
    inv_vocab: Vec<String>,
    unk_id: usize,
    eos_id: usize,
}

impl Tokenizer {
    /// Builds a tokenizer from its pieces. The list must contain
    /// [`EOS_TOKEN`] and [`UNK_TOKEN`] and no duplicates.
    pub fn new(tokens: Vec<String>) -> Result<Self, LoadError> {
        let mut vocab = HashMap::with_capacity(tokens.len());
        for (i, tok) in tokens.iter().enumerate() {
            if tok.is_empty() {
                return Err(LoadError::InvalidVocab(format!("empty piece at id {i}")));
            }
            if vocab.insert(tok.clone(), i).is_some() {
                return Err(LoadError::InvalidVocab(format!("duplicate piece {tok:?}")));
            }
        }
        let lookup = |special: &str| {
            vocab
                .get(special)
                .copied()
                .ok_or_else(|| LoadError::InvalidVocab(format!("missing {special}")))
        };
        let unk_id = lookup(UNK_TOKEN)?;
        let eos_id = lookup(EOS_TOKEN)?;
        Ok(Self {
            vocab,
            inv_vocab: tokens,
            unk_id,
            eos_id,
        })
    }

    /// Reads a vocab file: one escaped piece per line, line number = id.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Self::new(content.lines().map(unescape_piece).collect())
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let mut content = String::new();
        for piece in &self.inv_vocab {
            content.push_str(&escape_piece(piece));
            content.push('\n');
        }
        fs::write(path, content).map_err(|e| LoadError::io(path, e))
    }

    /// Splits text into pieces and maps them to ids; unknown pieces become
    /// the unk id. Literal end-of-sequence markers map to the eos id.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        let mut ids = Vec::new();
        for (i, chunk) in text.split(EOS_TOKEN).enumerate() {
            if i > 0 {
                ids.push(self.eos_id);
            }
            ids.extend(
                PIECE
                    .find_iter(chunk)
                    .map(|m| self.vocab.get(m.as_str()).copied().unwrap_or(self.unk_id)),
            );
        }
        ids
    }

    /// Concatenates the pieces. Ids outside the vocabulary decode as unk.
    pub fn decode(&self, tokens: &[usize]) -> String {
        tokens
            .iter()
            .map(|&id| {
                self.inv_vocab
                    .get(id)
                    .map(|s| s.as_str())
                    .unwrap_or(UNK_TOKEN)
            })
            .collect()
    }

    pub fn vocab_size(&self) -> usize {
        self.inv_vocab.len()
    }

    pub fn contains(&self, piece: &str) -> bool {
        self.vocab.contains_key(piece)
    }

    pub fn unk_token_id(&self) -> usize {
        self.unk_id
    }

    pub fn eos_token_id(&self) -> usize {
        self.eos_id
    }

    pub fn eos_token(&self) -> &str {
        EOS_TOKEN
    }
}

fn escape_piece(piece: &str) -> String {
    piece
        .chars()
        .map(|c| {
            ESCAPES
                .iter()
                .find(|(raw, _)| *raw == c)
                .map_or(c, |(_, shown)| *shown)
        })
        .collect()
}

fn unescape_piece(line: &str) -> String {
    line.chars()
        .map(|c| {
            ESCAPES
                .iter()
                .find(|(_, shown)| *shown == c)
                .map_or(c, |(raw, _)| *raw)
        })
        .collect()
}

const KITCHEN_WORDS: &[&str] = &[
    "add", "and", "bake", "beat", "boil", "bowl", "bring", "butter", "chicken", "chop", "cook",
    "cover", "cream", "cup", "cups", "dice", "drain", "egg", "eggs", "flour", "for", "fry",
    "garlic", "heat", "hot", "in", "into", "large", "minutes", "mix", "oil", "olive", "onion",
    "oven", "pan", "pasta", "pepper", "place", "pot", "remove", "salt", "sauce", "serve",
    "simmer", "slice", "stir", "sugar", "the", "to", "tomatoes", "until", "water", "with",
];

/// Vocabulary for the bundled demo model: specials, the prompt scaffold,
/// step numbers, punctuation and a small cooking lexicon.
pub fn kitchen_vocabulary() -> Vec<String> {
    let mut pieces: Vec<String> = [UNK_TOKEN, EOS_TOKEN, "TITLE", "INGREDIENTS", "RECIPE", ":", "\n", ",", ".", " ,", " ."]
        .iter()
        .map(|s| s.to_string())
        .collect();
    pieces.extend((1..=12).map(|n| format!(" {n}")));
    for word in KITCHEN_WORDS {
        pieces.push(word.to_string());
        pieces.push(format!(" {word}"));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(kitchen_vocabulary()).unwrap()
    }

    #[test]
    fn decode_concatenates_pieces() {
        let tok = tokenizer();
        let text = "TITLE: pasta\nINGREDIENTS: pasta, water\nRECIPE: 1. boil";
        let ids = tok.encode(text);
        assert!(!ids.contains(&tok.unk_token_id()));
        assert_eq!(tok.decode(&ids[..ids.len() - 1]), "TITLE: pasta\nINGREDIENTS: pasta, water\nRECIPE: 1.");
    }

    #[test]
    fn unknown_pieces_map_to_unk() {
        let tok = tokenizer();
        assert_eq!(tok.encode(" Boil"), vec![tok.unk_token_id()]);
    }

    #[test]
    fn eos_marker_is_special() {
        let tok = tokenizer();
        let ids = tok.encode(" serve<|endoftext|> salt");
        assert_eq!(ids[1], tok.eos_token_id());
        assert_eq!(tok.decode(&ids), " serve<|endoftext|> salt");
    }

    #[test]
    fn rejects_missing_specials_and_duplicates() {
        assert!(Tokenizer::new(vec![UNK_TOKEN.to_string()]).is_err());
        let dup = vec![UNK_TOKEN.to_string(), EOS_TOKEN.to_string(), "a".into(), "a".into()];
        assert!(matches!(Tokenizer::new(dup), Err(LoadError::InvalidVocab(_))));
    }

    #[test]
    fn escaping_survives_whitespace() {
        for piece in [" boil", "\n", "\t x"] {
            assert_eq!(unescape_piece(&escape_piece(piece)), piece);
            assert!(!escape_piece(piece).contains(char::is_whitespace));
        }
    }
}
