//! Variable substitution in state and values files
//!
//! Two independent text passes:
//! - environment variables (`$NAME`, `${NAME}`, with `$$` for a literal `$`)
//! - remote parameters (`{{ssm: /path/name}}`, `{{ssm: /path/name~true}}` to decrypt)

use regex::{Captures, Regex};
use std::process::Command;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

// `$$`, `${...}`, an unterminated `${`, a one-character special name, or an
// identifier. A `$` matching none of these stays literal.
static ENV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([^}]*)\}|\$\{|\$([*#@!?0-9-])|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env pattern is valid")
});

static SSM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{ssm: ([^~}]+)(~(true))?\}\}").expect("ssm pattern is valid")
});

const SSM_MARKER: &str = "{{ssm: ";

/// Source of remote parameter values
pub trait ParameterStore {
    /// Fetch a parameter, decrypting it when `with_decryption` is set
    fn get(&self, name: &str, with_decryption: bool) -> Result<String>;
}

/// Reads parameters from AWS SSM through the `aws` CLI
#[derive(Debug, Clone)]
pub struct AwsCliParameterStore {
    binary: String,
}

impl AwsCliParameterStore {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for AwsCliParameterStore {
    fn default() -> Self {
        Self::new("aws")
    }
}

impl ParameterStore for AwsCliParameterStore {
    fn get(&self, name: &str, with_decryption: bool) -> Result<String> {
        let mut args = vec!["ssm", "get-parameter", "--name", name];
        if with_decryption {
            args.push("--with-decryption");
        }
        args.extend(["--query", "Parameter.Value", "--output", "text"]);

        tracing::debug!(parameter = name, "reading SSM parameter");
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| CoreError::Parameter {
                name: name.to_string(),
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(CoreError::Parameter {
                name: name.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let value = String::from_utf8_lossy(&output.stdout);
        Ok(value.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Which substitution passes run, for the state document and for the values
/// files it references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionConfig {
    pub env: bool,
    pub ssm: bool,
    /// Only consulted when `env` is also enabled
    pub env_values: bool,
    /// Only consulted when `ssm` is also enabled
    pub ssm_values: bool,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            env: true,
            ssm: true,
            env_values: true,
            ssm_values: true,
        }
    }
}

type EnvLookup<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;

/// Applies the configured substitution passes to text
pub struct Substitutor<'a> {
    config: SubstitutionConfig,
    params: &'a dyn ParameterStore,
    env: EnvLookup<'a>,
}

impl<'a> Substitutor<'a> {
    /// Create a substitutor reading the process environment
    pub fn new(config: SubstitutionConfig, params: &'a dyn ParameterStore) -> Self {
        Self {
            config,
            params,
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace the environment lookup
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String> + 'a) -> Self {
        self.env = Box::new(lookup);
        self
    }

    pub fn config(&self) -> SubstitutionConfig {
        self.config
    }

    /// Substitute the state document itself
    pub fn substitute_document(&self, text: &str) -> Result<String> {
        self.apply(text, self.config.env, self.config.ssm)
    }

    /// Substitute the contents of a values or secrets file
    pub fn substitute_values(&self, text: &str) -> Result<String> {
        self.apply(
            text,
            self.config.env && self.config.env_values,
            self.config.ssm && self.config.ssm_values,
        )
    }

    /// Expand environment variables only, regardless of configuration
    pub fn expand_env(&self, text: &str) -> String {
        substitute_env_with(text, &self.env)
    }

    fn apply(&self, text: &str, env: bool, ssm: bool) -> Result<String> {
        let mut out = text.to_string();
        if env {
            out = substitute_env_with(&out, &self.env);
        }
        if ssm {
            out = substitute_ssm(&out, self.params)?;
        }
        Ok(out)
    }
}

/// Expand `$NAME` and `${NAME}` using `lookup`, with shell-style rules.
///
/// `$$` becomes `$`. Unset variables become the empty string, and so do the
/// single-character specials (`$1`, `$@`, `$?`...) and braced names with
/// modifiers such as `${X:-d}`, which are looked up verbatim. Malformed
/// `${}` and an unterminated `${` are dropped. A `$` followed by anything
/// else is kept. Text without `$` is returned unchanged.
pub fn substitute_env_with<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains('$') {
        return text.to_string();
    }

    ENV_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            if &caps[0] == "$$" {
                return "$".to_string();
            }
            match caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
                Some(name) if !name.as_str().is_empty() => lookup(name.as_str()).unwrap_or_default(),
                _ => String::new(),
            }
        })
        .into_owned()
}

/// Replace every `{{ssm: name}}` / `{{ssm: name~true}}` span with the value
/// read from `store`. Malformed spans are left as they are.
pub fn substitute_ssm(text: &str, store: &dyn ParameterStore) -> Result<String> {
    if !text.contains(SSM_MARKER) {
        return Ok(text.to_string());
    }

    let mut out = text.to_string();
    for caps in SSM_PATTERN.captures_iter(text) {
        let placeholder = &caps[0];
        if !out.contains(placeholder) {
            continue;
        }
        let name = &caps[1];
        let with_decryption = caps.get(3).is_some();
        let value = store.get(name, with_decryption)?;
        out = out.replace(placeholder, &value);
    }
    Ok(out)
}
