use crate::lexer;
use crate::redirect::{self, RedirectionSpec};
use std::str::FromStr;
use thiserror::Error;

/// A single stage of a pipeline: the program to run, its arguments and the
/// redirections it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Name or path of the program, `argv[0]`.
    pub program: String,
    /// Arguments after the program name, in order.
    pub arguments: Vec<String>,
    /// Redirections that apply to this stage only.
    pub redirection: RedirectionSpec,
}

/// An ordered sequence of stages where the output of each stage feeds the
/// input of the next one.
///
/// Always holds at least one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Stages in execution order.
    pub stages: Vec<CommandSpec>,
    /// Whether the whole pipeline runs without being waited for. Taken from
    /// the last stage.
    pub background: bool,
    /// The line the pipeline was built from, used to label background jobs.
    pub command_line: String,
}

impl Pipeline {
    /// Number of pipe channels needed to connect the stages.
    pub fn channel_count(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    /// The only stage, if the pipeline has exactly one.
    pub fn single_stage(&self) -> Option<&CommandSpec> {
        match self.stages.as_slice() {
            [stage] => Some(stage),
            _ => None,
        }
    }
}

impl FromStr for Pipeline {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        build(line)
    }
}

/// Errors that can occur while turning a line into a [`Pipeline`].
///
/// A parse error never touches any OS resource, so there is nothing to roll
/// back when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A stage has no program to run (e.g. `| wc` or `ls |` or `< file`).
    #[error("empty command in pipeline stage {}", stage + 1)]
    EmptyStage { stage: usize },
    /// A redirection operator is not followed by a file name.
    #[error("missing file name after `{operator}`")]
    MalformedRedirection { operator: &'static str },
}

/// Build a [`Pipeline`] from a raw line.
///
/// The line is split on `|`, each segment is split into words, and the
/// redirections of each segment are extracted. This is pure data
/// transformation: nothing is opened or spawned.
pub fn build(line: &str) -> Result<Pipeline, ParseError> {
    let segments = lexer::split_segments(line);
    let last = segments.len().saturating_sub(1);

    let mut stages = Vec::with_capacity(segments.len());
    let mut background = false;
    for (stage, segment) in segments.iter().enumerate() {
        let tokens = lexer::split_words(segment);
        if tokens.is_empty() {
            return Err(ParseError::EmptyStage { stage });
        }
        let (words, redirection) = redirect::extract(tokens)?;
        let mut words = words.into_iter();
        let Some(program) = words.next() else {
            return Err(ParseError::EmptyStage { stage });
        };
        if stage == last {
            background = redirection.background;
        }
        stages.push(CommandSpec {
            program,
            arguments: words.collect(),
            redirection,
        });
    }

    Ok(Pipeline {
        stages,
        background,
        command_line: line.trim().to_owned(),
    })
}
