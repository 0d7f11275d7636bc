//! Mock command executor for testing
//!
//! Records every invocation and answers with scripted outputs, so cluster
//! interactions can be tested without kubectl or a cluster.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::exec::{CommandExecutor, CommandOutput};

/// A command seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
}

impl RecordedCall {
    /// Whether the arguments start with `prefix`
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

#[derive(Debug, Clone)]
struct Rule {
    prefix: Vec<String>,
    output: CommandOutput,
    once: bool,
    used: bool,
}

/// In-memory command executor
///
/// Commands without a matching rule succeed with empty output. Rules are
/// matched by argument prefix; the most recently added matching rule wins.
#[derive(Clone, Default)]
pub struct MockExecutor {
    rules: Arc<RwLock<Vec<Rule>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
}

impl MockExecutor {
    /// Create a mock where every command succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command starting with `prefix` with `output`
    pub fn respond(&self, prefix: &[&str], output: CommandOutput) -> &Self {
        self.push_rule(prefix, output, false);
        self
    }

    /// Answer the next command starting with `prefix` with `output`
    pub fn respond_once(&self, prefix: &[&str], output: CommandOutput) -> &Self {
        self.push_rule(prefix, output, true);
        self
    }

    fn push_rule(&self, prefix: &[&str], output: CommandOutput, once: bool) {
        self.rules.write().unwrap().push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            output,
            once,
            used: false,
        });
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().unwrap().clone()
    }

    /// Recorded calls whose arguments start with `prefix`
    pub fn calls_matching(&self, prefix: &[&str]) -> Vec<RecordedCall> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn exec(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let call = RecordedCall {
            program: program.to_string(),
            args: args.to_vec(),
        };

        let output = {
            let mut rules = self.rules.write().unwrap();
            let rule = rules.iter_mut().rev().find(|r| {
                !(r.once && r.used)
                    && call.starts_with(&r.prefix.iter().map(String::as_str).collect::<Vec<_>>())
            });
            match rule {
                Some(rule) => {
                    rule.used = true;
                    rule.output.clone()
                }
                None => CommandOutput::default(),
            }
        };

        self.calls.write().unwrap().push(call);
        Ok(output)
    }
}
