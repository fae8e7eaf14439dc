//! Operator prompts on the terminal.

use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::domain::{Result, ZebraError};

/// Line-based operator interaction.
pub trait Prompt {
    /// Ask for one line of input, returned trimmed.
    ///
    /// # Errors
    /// Returns error if the terminal cannot be read.
    fn input(&self, message: &str) -> Result<String>;

    /// Ask until the answer is one of `options` (case-insensitive).
    ///
    /// # Errors
    /// Returns error if the terminal cannot be read.
    fn choose(&self, message: &str, options: &[&str]) -> Result<String> {
        loop {
            let answer = self.input(&format!("{message} [{}]", options.join("/")))?;
            if let Some(option) = options.iter().find(|o| o.eq_ignore_ascii_case(&answer)) {
                return Ok((*option).to_string());
            }
        }
    }

    /// Wait for the operator to confirm a message.
    ///
    /// # Errors
    /// Returns error if the terminal cannot be read.
    fn acknowledge(&self, message: &str) -> Result<()> {
        self.input(&format!("{message} (press Enter)")).map(|_| ())
    }

    /// Read lines until an empty line or end of input.
    ///
    /// # Errors
    /// Returns error if the terminal cannot be read.
    fn block(&self, message: &str) -> Result<String>;
}

/// Prompt on stdin/stdout.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn input(&self, message: &str) -> Result<String> {
        print!("{} ", format!("{message}:").cyan().bold());
        io::stdout()
            .flush()
            .map_err(|e| ZebraError::io("Failed to write prompt", e))?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ZebraError::io("Failed to read input", e))?;

        if read == 0 {
            return Err(ZebraError::Config {
                message: "No input available on stdin".into(),
            });
        }

        Ok(line.trim().to_string())
    }

    fn block(&self, message: &str) -> Result<String> {
        println!("{}", message.cyan().bold());

        let mut out = String::new();
        for line in io::stdin().lock().lines() {
            let line = line.map_err(|e| ZebraError::io("Failed to read input", e))?;
            if line.trim().is_empty() {
                break;
            }
            out.push_str(&line);
            out.push('\n');
        }

        Ok(out)
    }
}
