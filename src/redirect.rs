//! Extraction of redirection operators and the background marker from a
//! stage's words.

use crate::parser::ParseError;
use std::path::PathBuf;

/// Marker that, as the last word of the last stage, backgrounds the pipeline.
pub const BACKGROUND: &str = "&";

/// Kind of redirection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `<`: read standard input from a file.
    Input,
    /// `>`: write standard output to a file, truncating it.
    Output,
    /// `>>`: write standard output to a file, appending to it.
    Append,
}

impl RedirectKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Self::Input),
            ">" => Some(Self::Output),
            ">>" => Some(Self::Append),
            _ => None,
        }
    }

    /// The operator as written on the command line.
    pub fn operator(self) -> &'static str {
        match self {
            Self::Input => "<",
            Self::Output => ">",
            Self::Append => ">>",
        }
    }
}

/// Redirections requested by one stage.
///
/// `None` paths mean "inherit": an adjacent pipe end inside a pipeline, the
/// shell's own descriptor at a pipeline boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    /// Open `output_path` for appending instead of truncating.
    pub append: bool,
    /// Only meaningful on the last stage of a pipeline.
    pub background: bool,
}

/// Remove redirection operators (with their file names) and a trailing `&`
/// from `tokens`.
///
/// Returns the remaining words in order together with the collected
/// redirections. When an operator repeats, the last occurrence wins.
pub fn extract(tokens: Vec<String>) -> Result<(Vec<String>, RedirectionSpec), ParseError> {
    let mut redirection = RedirectionSpec::default();
    let mut tokens = tokens;
    if tokens.last().is_some_and(|token| token == BACKGROUND) {
        tokens.pop();
        redirection.background = true;
    }

    let mut words = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let Some(kind) = RedirectKind::from_token(&token) else {
            words.push(token);
            continue;
        };
        let target = match iter.next() {
            Some(target) if !is_operator(&target) => PathBuf::from(target),
            _ => {
                return Err(ParseError::MalformedRedirection {
                    operator: kind.operator(),
                });
            }
        };
        match kind {
            RedirectKind::Input => redirection.input_path = Some(target),
            RedirectKind::Output | RedirectKind::Append => {
                redirection.output_path = Some(target);
                redirection.append = kind == RedirectKind::Append;
            }
        }
    }
    Ok((words, redirection))
}

fn is_operator(token: &str) -> bool {
    token == BACKGROUND || RedirectKind::from_token(token).is_some()
}
