//! Command model for transfer-tool and validator invocations
//!
//! A [`Command`] is a verb, positional arguments and `--name=value` flags.
//! The executor passes [`Command::argv`] straight to the child so no shell
//! ever re-parses it; [`Command::to_command_line`] renders the same
//! invocation with every argument quoted independently, for logs and for
//! replaying a step by hand.

use std::fmt;

/// One invocation of the tool under test or of the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<String>,
    flags: Vec<(String, String)>,
}

impl Command {
    /// Start a command for `verb` (e.g. `copy`, `testBlob`)
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// Append a positional argument. Empty values are ignored.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.args.push(value);
        }
        self
    }

    /// Set a flag, replacing any earlier value for the same name
    ///
    /// A replaced flag keeps the position where it was first set.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.flags.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.flags.push((name, value)),
        }
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn flags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Current value of a flag, if set
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Discrete argument vector: verb, arguments, then `--name=value` flags
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.args.len() + self.flags.len());
        argv.push(self.verb.clone());
        argv.extend(self.args.iter().cloned());
        argv.extend(self.flags.iter().map(|(k, v)| format!("--{}={}", k, v)));
        argv
    }

    /// Shell-safe rendering with every argument and flag value quoted
    pub fn to_command_line(&self) -> String {
        self.render(true)
    }

    /// Rendering with positional arguments left unquoted
    ///
    /// For the piping form, where the consumer's positional argument is
    /// spliced after a `|` by the caller.
    pub fn to_piped_command_line(&self) -> String {
        self.render(false)
    }

    fn render(&self, quote_args: bool) -> String {
        let mut line = self.verb.clone();
        for arg in &self.args {
            line.push(' ');
            if quote_args {
                line.push_str(&quote(arg));
            } else {
                line.push_str(arg);
            }
        }
        for (name, value) in &self.flags {
            line.push_str(" --");
            line.push_str(name);
            line.push('=');
            line.push_str(&quote(value));
        }
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Wrap `value` in double quotes, escaping what POSIX shells expand inside them
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_order() {
        let cmd = Command::new("copy")
            .arg("/tmp/a.txt")
            .flag("recursive", true)
            .arg("https://h/c/a.txt?sig=x")
            .flag("log-level", "info");

        assert_eq!(
            cmd.to_command_line(),
            r#"copy "/tmp/a.txt" "https://h/c/a.txt?sig=x" --recursive="true" --log-level="info""#
        );
    }

    #[test]
    fn test_empty_argument_is_ignored() {
        let cmd = Command::new("testBlob").arg("").arg("name");
        assert_eq!(cmd.args(), ["name".to_string()]);
    }

    #[test]
    fn test_flag_last_write_wins() {
        let cmd = Command::new("copy")
            .flag("block-size-mb", 4)
            .flag("overwrite", "true")
            .flag("block-size-mb", 8);

        assert_eq!(cmd.flag_value("block-size-mb"), Some("8"));
        assert_eq!(cmd.flags().count(), 2);
        assert_eq!(
            cmd.to_command_line(),
            r#"copy --block-size-mb="8" --overwrite="true""#
        );
    }

    #[test]
    fn test_embedded_separators_are_escaped() {
        let cmd = Command::new("copy")
            .arg(r#"dir with "quotes" and $HOME"#)
            .flag("metadata", "author=me;viewport=width;description=test file");

        assert_eq!(
            cmd.to_command_line(),
            r#"copy "dir with \"quotes\" and \$HOME" --metadata="author=me;viewport=width;description=test file""#
        );
    }

    #[test]
    fn test_piped_rendering_leaves_args_bare() {
        let cmd = Command::new("copy")
            .arg("https://h/c/blob?sig=x")
            .flag("from-to", "PipeBlob");
        assert_eq!(
            cmd.to_piped_command_line(),
            r#"copy https://h/c/blob?sig=x --from-to="PipeBlob""#
        );
    }

    #[test]
    fn test_argv_is_unquoted() {
        let cmd = Command::new("rm")
            .arg("a b")
            .flag("recursive", "true");
        assert_eq!(cmd.argv(), vec!["rm", "a b", "--recursive=true"]);
    }

    #[test]
    fn test_quote_backslashes() {
        assert_eq!(quote(r"C:\data\"), r#""C:\\data\\""#);
    }
}
