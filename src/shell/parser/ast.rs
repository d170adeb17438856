use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>`
    Output,
    /// `>>`
    Append,
    /// `<`
    Input,
    /// `2>`
    Error,
    /// `&>`
    OutputError,
}

impl RedirectKind {
    pub fn operator(self) -> &'static str {
        match self {
            RedirectKind::Output => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Input => "<",
            RedirectKind::Error => "2>",
            RedirectKind::OutputError => "&>",
        }
    }

    /// Whether applying this redirect replaces the stage's stdout.
    pub fn replaces_stdout(self) -> bool {
        matches!(
            self,
            RedirectKind::Output | RedirectKind::Append | RedirectKind::OutputError
        )
    }

    pub fn replaces_stdin(self) -> bool {
        self == RedirectKind::Input
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: String,
}

/// One parsed input line.
///
/// A pipeline of N stages is a head `Command` whose `pipeline` holds the
/// remaining N-1 stages in order. Only the head carries `background`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub arguments: Vec<String>,
    pub redirect: Option<Redirect>,
    pub pipeline: Vec<Command>,
    pub background: bool,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn stage_count(&self) -> usize {
        1 + self.pipeline.len()
    }

    /// Splits the head off its successors, yielding every stage in order.
    pub fn into_stages(mut self) -> Vec<Command> {
        let successors = std::mem::take(&mut self.pipeline);
        let mut stages = Vec::with_capacity(1 + successors.len());
        stages.push(self);
        stages.extend(successors);
        stages
    }

    /// Name and arguments rendered back into a shell-quoted line, used for
    /// job listings and log lines.
    pub fn display_line(&self) -> String {
        let mut words = Vec::with_capacity(1 + self.arguments.len());
        words.push(self.name.as_str());
        words.extend(self.arguments.iter().map(String::as_str));
        let mut line = shell_words::join(words);
        if let Some(redirect) = &self.redirect {
            line.push_str(&format!(" {} {}", redirect.kind, redirect.target));
        }
        for stage in &self.pipeline {
            line.push_str(" | ");
            line.push_str(&stage.display_line());
        }
        line
    }
}
