use super::ast::RedirectKind;
use super::parser::ParseError;

/// Character cursor over one input line.
///
/// The scanner never backtracks; every method either consumes input or
/// leaves the position untouched.
pub struct Scanner {
    input: Vec<char>,
    pos: usize,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_nth(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn read_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        Some(c)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// True when the cursor sits on `&` and nothing but whitespace follows it.
    pub fn at_trailing_ampersand(&self) -> bool {
        self.peek_char() == Some('&')
            && self.input[self.pos + 1..].iter().all(|c| c.is_whitespace())
    }

    pub fn consume(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn consume_rest(&mut self) {
        self.pos = self.input.len();
    }

    /// Consumes a redirection operator if one starts at the cursor.
    pub fn read_redirect_op(&mut self) -> Option<RedirectKind> {
        let kind = match (self.peek_char()?, self.peek_nth(1)) {
            ('>', Some('>')) => RedirectKind::Append,
            ('>', _) => RedirectKind::Output,
            ('<', _) => RedirectKind::Input,
            ('2', Some('>')) => RedirectKind::Error,
            ('&', Some('>')) => RedirectKind::OutputError,
            _ => return None,
        };
        self.pos += kind.operator().chars().count();
        Some(kind)
    }

    /// Reads a redirect target verbatim: no quote or escape processing, and
    /// only whitespace, `|` and `&` end it.
    pub fn read_redirect_target(&mut self) -> String {
        self.skip_whitespace();
        let mut target = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == '|' || c == '&' {
                break;
            }
            target.push(c);
            self.pos += 1;
        }
        target
    }

    /// Reads one word, resolving quotes and backslash escapes. Inside quotes
    /// a backslash is an ordinary character.
    pub fn read_token(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Err(ParseError::UnexpectedEnd);
        }

        let mut token = String::new();
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek_char() {
            match (quote, c) {
                (None, '"' | '\'') => {
                    quote = Some(c);
                    self.pos += 1;
                }
                (Some(q), c) if c == q => {
                    quote = None;
                    self.pos += 1;
                }
                (None, '\\') if self.peek_nth(1).is_some() => {
                    self.pos += 1;
                    if let Some(escaped) = self.read_char() {
                        token.push(escaped);
                    }
                }
                (None, c) if c.is_whitespace() || "|><&".contains(c) => break,
                (_, c) => {
                    token.push(c);
                    self.pos += 1;
                }
            }
        }

        if quote.is_some() {
            return Err(ParseError::UnterminatedQuote);
        }
        if token.is_empty() {
            return Err(ParseError::EmptyToken);
        }
        Ok(token)
    }
}
