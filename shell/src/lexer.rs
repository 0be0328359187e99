//! A module implementing lexical analysis (tokenization) for the shell's input lines.
//!
//! The language is deliberately flat: there is no quoting, no escaping and no
//! redirection syntax. A line is split on blanks, and a token that consists of
//! exactly one `|` is the pipe operator. `a|b` is therefore a single word.

/// Characters that separate tokens.
const DELIMITERS: &[char] = &[' ', '\t', '\r', '\n', '\x07'];

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A command name or an argument.
    Word(String),
    /// The pipe operator, `|`.
    PipeOp,
}

impl Token {
    /// Returns the word text, or `None` for operators.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            Token::PipeOp => None,
        }
    }
}

/// Splits a line into blank-separated words, without recognising operators.
///
/// Used where the input is data rather than a command line, e.g. by `sort`
/// when it collects items from standard input.
pub fn split_words(line: &str) -> impl Iterator<Item = &str> {
    line.split(DELIMITERS).filter(|w| !w.is_empty())
}

/// The main entry point function to perform lexical analysis.
///
/// # Arguments
/// * `line` - The string to be tokenized.
///
/// # Returns
/// Tokens in input order. An empty or all-blank line yields an empty vector.
pub fn split_into_tokens(line: &str) -> Vec<Token> {
    split_words(line)
        .map(|word| match word {
            "|" => Token::PipeOp,
            w => Token::Word(w.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_blank_line_has_no_tokens() {
        assert!(split_into_tokens("").is_empty());
        assert!(split_into_tokens(" \t \r\n").is_empty());
    }

    #[test]
    fn test_words_and_pipes() {
        let tokens = split_into_tokens("echo a b |  sort\n");
        assert_eq!(
            tokens,
            vec![word("echo"), word("a"), word("b"), Token::PipeOp, word("sort")]
        );
    }

    #[test]
    fn test_glued_pipe_is_a_word() {
        assert_eq!(split_into_tokens("a|b"), vec![word("a|b")]);
        assert_eq!(split_into_tokens("a ||"), vec![word("a"), word("||")]);
    }

    #[test]
    fn test_quotes_are_plain_characters() {
        assert_eq!(
            split_into_tokens("echo \"x y\""),
            vec![word("echo"), word("\"x"), word("y\"")]
        );
    }

    #[test]
    fn test_split_words_keeps_pipe_as_data() {
        let words: Vec<&str> = split_words("b | a").collect();
        assert_eq!(words, vec!["b", "|", "a"]);
    }
}
