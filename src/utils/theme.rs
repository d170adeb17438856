use colored::Colorize;

type Style = Box<dyn Fn(&str) -> String>;

pub struct Theme {
    pub name: &'static str,
    pub prompt_style: Style,
    pub success_style: Style,
    pub warning_style: Style,
    pub error_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            name: "default",
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            success_style: Box::new(|s| s.bright_green().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
        }
    }
}

impl Theme {
    pub fn load(theme_name: &str) -> Theme {
        match theme_name {
            "dark" => Theme {
                name: "dark",
                prompt_style: Box::new(|s| s.bright_purple().bold().to_string()),
                success_style: Box::new(|s| s.green().to_string()),
                warning_style: Box::new(|s| s.bright_yellow().to_string()),
                error_style: Box::new(|s| s.red().bold().to_string()),
            },
            _ => Theme::default(),
        }
    }

    pub fn get_message(&self, key: &str) -> &'static str {
        match key {
            "welcome" => "Welcome to conduit.",
            "help" => "Type 'help' to list built-in commands, 'exit' to leave.",
            "exit" => "Bye.",
            "eof_signal" => "EOF received, leaving conduit.",
            "interrupt_signal" => "Interrupted. Type 'exit' to leave.",
            "terminate_signal" => "Termination requested, leaving conduit.",
            "error_symbol" => "✗",
            _ => "",
        }
    }

    /// `conduit:<dir>> `, styled.
    pub fn prompt(&self, dir: &str) -> String {
        (self.prompt_style)(&format!("conduit:{}> ", dir))
    }

    /// One error line, prefixed the same way for every kind of failure.
    pub fn error_line(&self, message: &str) -> String {
        format!(
            "{} {}",
            (self.error_style)(self.get_message("error_symbol")),
            (self.error_style)(&format!("conduit: {}", message))
        )
    }
}
