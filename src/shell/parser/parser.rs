use log::trace;
use thiserror::Error;

use super::ast::{Command, Redirect, RedirectKind};
use super::lexer::Scanner;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    EmptyInput,
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("empty token")]
    EmptyToken,
    #[error("missing target after '{0}'")]
    MissingRedirectTarget(RedirectKind),
}

pub struct Parser {
    scanner: Scanner,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self {
            scanner: Scanner::new(input),
        }
    }

    /// Parses the whole line: a simple command followed by any number of
    /// `|`-separated stages.
    pub fn parse_command(&mut self) -> Result<Command, ParseError> {
        self.scanner.skip_whitespace();
        if self.scanner.is_at_end() {
            return Err(ParseError::EmptyInput);
        }

        let mut head = self.parse_simple_command()?;

        while self.scanner.consume('|') {
            self.scanner.skip_whitespace();
            let stage = self.parse_simple_command()?;
            // `&` can only close the line, so it lands on the last stage;
            // the flag belongs to the pipeline as a whole.
            head.background |= stage.background;
            head.pipeline.push(Command {
                background: false,
                ..stage
            });
        }

        trace!("parsed {:?}", head);
        Ok(head)
    }

    fn parse_simple_command(&mut self) -> Result<Command, ParseError> {
        self.scanner.skip_whitespace();
        if self.scanner.is_at_end() {
            return Err(ParseError::UnexpectedEnd);
        }

        let mut command = Command::new(self.scanner.read_token()?);

        loop {
            self.scanner.skip_whitespace();
            if self.scanner.is_at_end() {
                break;
            }

            if self.scanner.at_trailing_ampersand() {
                command.background = true;
                self.scanner.consume_rest();
                break;
            }

            if self.scanner.peek_char() == Some('|') {
                break;
            }

            if let Some(kind) = self.scanner.read_redirect_op() {
                let target = self.scanner.read_redirect_target();
                if target.is_empty() {
                    return Err(ParseError::MissingRedirectTarget(kind));
                }
                // last one wins
                command.redirect = Some(Redirect { kind, target });
                continue;
            }

            command.arguments.push(self.scanner.read_token()?);
        }

        Ok(command)
    }
}

pub fn parse(input: &str) -> Result<Command, ParseError> {
    Parser::new(input).parse_command()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_simple_command() {
        let cmd = parse("ls -l /tmp").unwrap();
        assert_eq!(cmd.name, "ls");
        assert_eq!(cmd.arguments, args(&["-l", "/tmp"]));
        assert!(cmd.redirect.is_none());
        assert!(cmd.pipeline.is_empty());
        assert!(!cmd.background);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_quoted_operators_are_literal() {
        let cmd = parse(r#"echo "a|b" 'c > d' "x&y""#).unwrap();
        assert_eq!(cmd.name, "echo");
        assert_eq!(cmd.arguments, args(&["a|b", "c > d", "x&y"]));
        assert!(cmd.pipeline.is_empty());
        assert!(cmd.redirect.is_none());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipeline_stages() {
        let cmd = parse("cat file | grep -v foo | sort -r | uniq").unwrap();
        assert_eq!(cmd.stage_count(), 4);
        assert_eq!(cmd.name, "cat");
        assert_eq!(cmd.arguments, args(&["file"]));

        let expected = [
            ("grep", args(&["-v", "foo"])),
            ("sort", args(&["-r"])),
            ("uniq", args(&[])),
        ];
        for (stage, (name, arguments)) in cmd.pipeline.iter().zip(expected) {
            assert_eq!(stage.name, name);
            assert_eq!(stage.arguments, arguments);
            assert!(stage.pipeline.is_empty());
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipe_without_spaces() {
        let cmd = parse("ls|wc -l").unwrap();
        assert_eq!(cmd.name, "ls");
        assert_eq!(cmd.pipeline.len(), 1);
        assert_eq!(cmd.pipeline[0].name, "wc");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_background() {
        let cmd = parse("sleep 10 &").unwrap();
        assert_eq!(cmd.name, "sleep");
        assert_eq!(cmd.arguments, args(&["10"]));
        assert!(cmd.background);

        let cmd = parse("sleep 10&").unwrap();
        assert!(cmd.background);
        assert_eq!(cmd.arguments, args(&["10"]));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_background_pipeline_flag_lives_on_head() {
        let cmd = parse("yes | head -n 1 &").unwrap();
        assert!(cmd.background);
        assert!(!cmd.pipeline[0].background);
        assert_eq!(cmd.pipeline[0].arguments, args(&["-n", "1"]));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_escaped_ampersand_is_an_argument() {
        let cmd = parse(r"echo \&").unwrap();
        assert!(!cmd.background);
        assert_eq!(cmd.arguments, args(&["&"]));
    }

    #[test]
    fn test_inner_ampersand_is_rejected() {
        assert_eq!(parse("echo a & b"), Err(ParseError::EmptyToken));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirections() {
        let cases = [
            ("echo hello > out.txt", RedirectKind::Output, "out.txt"),
            ("echo hello >> out.txt", RedirectKind::Append, "out.txt"),
            ("sort < in.txt", RedirectKind::Input, "in.txt"),
            ("make 2> err.log", RedirectKind::Error, "err.log"),
            ("make &> all.log", RedirectKind::OutputError, "all.log"),
        ];
        for (input, kind, target) in cases {
            let cmd = parse(input).unwrap();
            let redirect = cmd.redirect.unwrap();
            assert_eq!(redirect.kind, kind, "{input}");
            assert_eq!(redirect.target, target, "{input}");
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_last_redirect_wins() {
        let cmd = parse("echo hi > a.txt > b.txt").unwrap();
        assert_eq!(
            cmd.redirect,
            Some(Redirect {
                kind: RedirectKind::Output,
                target: "b.txt".to_string(),
            })
        );
        assert_eq!(cmd.arguments, args(&["hi"]));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirect_then_pipe() {
        let cmd = parse("cmd1 > file.txt | cmd2").unwrap();
        assert_eq!(cmd.redirect.unwrap().target, "file.txt");
        assert_eq!(cmd.pipeline[0].name, "cmd2");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_arguments_after_redirect() {
        let cmd = parse("grep foo < in.txt -n").unwrap();
        assert_eq!(cmd.arguments, args(&["foo", "-n"]));
        assert_eq!(cmd.redirect.unwrap().kind, RedirectKind::Input);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(""), Err(ParseError::EmptyInput));
        assert_eq!(parse("   \t"), Err(ParseError::EmptyInput));
        assert_eq!(parse(r#"echo "abc"#), Err(ParseError::UnterminatedQuote));
        assert_eq!(parse(r#"echo """#), Err(ParseError::EmptyToken));
        assert_eq!(parse("ls |"), Err(ParseError::UnexpectedEnd));
        assert_eq!(parse("| ls"), Err(ParseError::EmptyToken));
        assert_eq!(
            parse("echo hi >"),
            Err(ParseError::MissingRedirectTarget(RedirectKind::Output))
        );
    }

    #[test]
    fn test_reparse_is_structurally_equal() {
        let line = r#"grep -i "needle x" < hay.txt | sort 'a b' | tail -n 2 &"#;
        assert_eq!(parse(line), parse(line));
        assert!(parse(line).is_ok());
    }
}
