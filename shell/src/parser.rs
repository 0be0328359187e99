use crate::lexer::Token;
use thiserror::Error;

/// One command of a pipeline.
///
/// `argv[0]` is the command name, the rest are its arguments. A stage built by
/// [`construct_pipeline`] is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    argv: Vec<String>,
}

impl Stage {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// The command name, `None` for an empty stage.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// The full argument vector, command name included.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Commands connected by the pipe operator (`|`), in execution order.
///
/// Stage `n` writes its standard output into the standard input of stage `n + 1`.
/// A pipeline always has at least one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns the only stage when the line contained no pipe operator.
    pub fn single(&self) -> Option<&Stage> {
        match self.stages.as_slice() {
            [stage] => Some(stage),
            _ => None,
        }
    }
}

/// Errors that can occur while splitting tokens into stages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// There were no tokens at all.
    #[error("empty command line")]
    EmptyInput,
    /// A leading, trailing or doubled `|` left a stage without a command.
    /// `position` counts stages from 1.
    #[error("empty command in pipeline (stage {position})")]
    EmptyStage { position: usize },
}

struct PipelineBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl PipelineBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        PipelineBuilder { tokens, pos: 0 }
    }

    fn build(mut self) -> Result<Pipeline, ParsingError> {
        if self.tokens.is_empty() {
            return Err(ParsingError::EmptyInput);
        }

        let mut stages = vec![self.parse_stage(1)?];
        while let Some(Token::PipeOp) = self.peek() {
            self.consume(); // consume the '|'
            stages.push(self.parse_stage(stages.len() + 1)?);
        }

        Ok(Pipeline { stages })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a stage: word+, ending at a pipe or at the end of input.
    fn parse_stage(&mut self, position: usize) -> Result<Stage, ParsingError> {
        let mut argv = Vec::new();
        while let Some(word) = self.peek().and_then(Token::as_word) {
            argv.push(word.to_string());
            self.consume();
        }

        if argv.is_empty() {
            return Err(ParsingError::EmptyStage { position });
        }
        Ok(Stage::new(argv))
    }
}

/// Splits a token sequence into pipeline stages at every `|` token.
///
/// Separators are dropped from the output. Any stage left without words is
/// rejected, so `| a`, `a |` and `a | | b` are all errors.
pub fn construct_pipeline(tokens: Vec<Token>) -> Result<Pipeline, ParsingError> {
    PipelineBuilder::from(tokens).build()
}
