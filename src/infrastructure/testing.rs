//! Scripted stand-ins for the OS-facing traits.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::command::{CommandOutput, CommandRunner, CommandSpec};
use super::prompt::Prompt;
use super::store::BindingStore;
use super::usb::{ResetOutcome, UsbControl};
use crate::domain::{Binding, Result, Role, UsbId, ZebraError};

struct Rule {
    prefix: String,
    output: CommandOutput,
    once: bool,
}

/// Replies to commands by command-line prefix and records every call.
///
/// Rules are tried in insertion order; unmatched commands exit with 1.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<CommandSpec>>,
    detached: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `stdout` and status 0 to commands starting with `prefix`.
    pub fn on(self, prefix: &str, stdout: &str) -> Self {
        self.on_status(prefix, 0, stdout)
    }

    pub fn on_status(self, prefix: &str, status: i32, stdout: &str) -> Self {
        self.rule(prefix, status, stdout, false)
    }

    /// Like [`ScriptedRunner::on`] but only answers the first matching call.
    pub fn once(self, prefix: &str, stdout: &str) -> Self {
        self.rule(prefix, 0, stdout, true)
    }

    fn rule(self, prefix: &str, status: i32, stdout: &str, once: bool) -> Self {
        self.rules.borrow_mut().push(Rule {
            prefix: prefix.to_string(),
            output: CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            once,
        });
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::command_line).collect()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.lines().iter().any(|l| l.starts_with(prefix))
    }

    pub fn stdin_of(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|s| s.command_line().starts_with(prefix))
            .filter_map(|s| s.stdin.clone())
            .collect()
    }

    pub fn detached(&self) -> Vec<String> {
        self.detached.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.command_line();
        self.calls.borrow_mut().push(spec.clone());

        let mut rules = self.rules.borrow_mut();
        let Some(index) = rules
            .iter()
            .position(|rule| line.starts_with(rule.prefix.as_str()))
        else {
            return Ok(CommandOutput {
                status: 1,
                ..CommandOutput::default()
            });
        };

        if rules[index].once {
            return Ok(rules.remove(index).output);
        }
        Ok(rules[index].output.clone())
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> Result<()> {
        self.detached.borrow_mut().push(spec.command_line());
        Ok(())
    }
}

/// In-memory binding store.
#[derive(Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<Role, Binding>>,
}

impl MemoryStore {
    pub fn with(role: Role, binding: Binding) -> Self {
        let store = Self::default();
        store.values.borrow_mut().insert(role, binding);
        store
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl BindingStore for MemoryStore {
    fn get(&self, role: Role) -> Result<Option<Binding>> {
        Ok(self.values.borrow().get(&role).cloned())
    }

    fn set(&self, role: Role, binding: &Binding) -> Result<()> {
        self.values.borrow_mut().insert(role, binding.clone());
        Ok(())
    }
}

/// Records resets and answers with a fixed outcome.
pub struct FakeUsb {
    outcome: ResetOutcome,
    resets: RefCell<Vec<UsbId>>,
}

impl FakeUsb {
    pub fn answering(outcome: ResetOutcome) -> Self {
        Self {
            outcome,
            resets: RefCell::new(Vec::new()),
        }
    }

    pub fn resets(&self) -> Vec<UsbId> {
        self.resets.borrow().clone()
    }
}

impl Default for FakeUsb {
    fn default() -> Self {
        Self::answering(ResetOutcome::Reset)
    }
}

impl UsbControl for FakeUsb {
    fn reset(&self, id: UsbId) -> ResetOutcome {
        self.resets.borrow_mut().push(id);
        self.outcome.clone()
    }
}

/// Answers prompts from a queue.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|s| (*s).to_string()).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.borrow().len()
    }
}

impl Prompt for ScriptedPrompt {
    fn input(&self, message: &str) -> Result<String> {
        self.asked.borrow_mut().push(message.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ZebraError::Config {
                message: "prompt script exhausted".into(),
            })
    }

    fn block(&self, message: &str) -> Result<String> {
        self.input(message)
    }
}
