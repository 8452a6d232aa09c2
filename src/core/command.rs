//! Command composition with shell-faithful quoting.
//!
//! A [`CommandSpec`] is the representation of an external process invocation
//! prior to execution: an ordered token list built from discrete arguments, or
//! a raw shell line supplied as a single scalar. Rendering to a command-line
//! string quotes exactly the tokens that need it, so re-splitting the string
//! yields the original tokens unchanged.

use anyhow::{Context, Result, anyhow};

/// An external process invocation, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    tokens: Vec<String>,
    /// Raw shell line for scalar specs; rendered verbatim, split on demand.
    shell_line: Option<String>,
}

impl CommandSpec {
    /// Build from discrete argument tokens. Token boundaries are preserved
    /// exactly on execution, regardless of embedded whitespace.
    pub fn from_args<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            shell_line: None,
        }
    }

    /// Build from a single scalar command line, passed through unquoted.
    pub fn from_scalar(line: impl Into<String>) -> Self {
        Self {
            tokens: Vec::new(),
            shell_line: Some(line.into()),
        }
    }

    /// Append a token. Only meaningful for specs built from arguments.
    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    /// Append `flag` only when `condition` holds.
    pub fn push_optional_flag(&mut self, flag: &str, condition: bool) {
        if condition {
            self.push(flag);
        }
    }

    /// Append `{prefix}{value}` as one token when a value is present.
    pub fn push_optional_value(&mut self, prefix: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.push(format!("{prefix}{value}"));
        }
    }

    /// Append `{prefix}a,b,c` as one token; omitted entirely when `values` is
    /// empty.
    pub fn push_comma_separated<S: AsRef<str>>(&mut self, prefix: &str, values: &[S]) {
        if values.is_empty() {
            return;
        }
        let joined = values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        self.push(format!("{prefix}{joined}"));
    }

    /// Render to a single command-line string.
    ///
    /// Every token containing shell-special characters is quoted such that
    /// re-parsing yields it back; bare tokens render unquoted. Scalar specs
    /// render verbatim.
    pub fn command_line(&self) -> String {
        match &self.shell_line {
            Some(line) => line.clone(),
            None => shell_words::join(self.tokens.iter().map(String::as_str)),
        }
    }

    /// Discrete argv tokens. Scalar specs are split shell-faithfully.
    pub fn argv(&self) -> Result<Vec<String>> {
        match &self.shell_line {
            Some(line) => {
                shell_words::split(line).with_context(|| format!("split command line `{line}`"))
            }
            None => Ok(self.tokens.clone()),
        }
    }

    /// The executable token.
    pub fn program(&self) -> Result<String> {
        self.argv()?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("empty command"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_renders_unquoted() {
        let spec = CommandSpec::from_scalar("/usr/bin/tool");
        assert_eq!(spec.command_line(), "/usr/bin/tool");
        assert_eq!(spec.argv().expect("argv"), vec!["/usr/bin/tool"]);
    }

    #[test]
    fn bare_args_render_without_quotes() {
        let spec = CommandSpec::from_args(["/usr/bin/tool", "--fix"]);
        assert_eq!(spec.command_line(), "/usr/bin/tool --fix");
    }

    #[test]
    fn rendering_round_trips_metacharacter_tokens() {
        let tokens = vec![
            "tool".to_string(),
            "arg with spaces".to_string(),
            "semi;colon".to_string(),
            "dollar$var".to_string(),
            "quo'te".to_string(),
        ];
        let spec = CommandSpec::from_args(tokens.clone());
        let line = spec.command_line();
        let reparsed = shell_words::split(&line).expect("reparse");
        assert_eq!(reparsed, tokens);
    }

    #[test]
    fn argv_preserves_token_boundaries() {
        let spec = CommandSpec::from_args(["tool", "two words"]);
        assert_eq!(spec.argv().expect("argv"), vec!["tool", "two words"]);
    }

    #[test]
    fn scalar_split_respects_shell_quoting() {
        let spec = CommandSpec::from_scalar("tool 'two words' plain");
        assert_eq!(
            spec.argv().expect("argv"),
            vec!["tool", "two words", "plain"]
        );
    }

    #[test]
    fn optional_flag_included_only_when_condition_holds() {
        let mut spec = CommandSpec::from_args(["tool"]);
        spec.push_optional_flag("--verbose", false);
        spec.push_optional_flag("--fix", true);
        assert_eq!(spec.argv().expect("argv"), vec!["tool", "--fix"]);
    }

    #[test]
    fn optional_value_renders_single_token() {
        let mut spec = CommandSpec::from_args(["tool"]);
        spec.push_optional_value("--threads=", None);
        spec.push_optional_value("--config=", Some("infection.json"));
        assert_eq!(
            spec.argv().expect("argv"),
            vec!["tool", "--config=infection.json"]
        );
    }

    #[test]
    fn comma_separated_omitted_when_empty() {
        let mut spec = CommandSpec::from_args(["tool"]);
        spec.push_comma_separated::<&str>("--mutators=", &[]);
        spec.push_comma_separated("--filter=", &["a.php", "b.php"]);
        assert_eq!(
            spec.argv().expect("argv"),
            vec!["tool", "--filter=a.php,b.php"]
        );
    }

    #[test]
    fn program_errors_on_empty_spec() {
        let spec = CommandSpec::from_args(Vec::<String>::new());
        assert!(spec.program().is_err());
    }
}
