//! Splitting of raw command lines into pipeline segments and words.
//!
//! Nothing here interprets quotes or escapes: a delimiter always splits, even
//! inside what a user might think of as a quoted string.

/// Separator between pipeline stages.
pub const PIPE: char = '|';

/// Separator between the words of a single stage.
pub const WORD_SEPARATOR: char = ' ';

/// Split `line` strictly on `delimiter`.
///
/// Consecutive delimiters produce empty pieces; callers decide whether an
/// empty piece is an error or noise.
pub fn split(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(str::to_owned).collect()
}

/// Split a line into pipeline segments. Empty segments are preserved so the
/// builder can reject them.
pub fn split_segments(line: &str) -> Vec<String> {
    split(line, PIPE)
}

/// Split one segment into its words, discarding empty tokens.
pub fn split_words(segment: &str) -> Vec<String> {
    split(segment, WORD_SEPARATOR)
        .into_iter()
        .filter(|word| !word.is_empty())
        .collect()
}
