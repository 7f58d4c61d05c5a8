//! Shell command construction for remote execution.
//!
//! Every argument passed through [`RemoteCommand::arg`] is quoted for a POSIX
//! shell, so blueprint values (hosts, paths) cannot inject extra syntax.
//! Pipes and fallbacks are composed from whole commands, never from strings.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    line: String,
}

impl RemoteCommand {
    pub fn new(program: &str) -> Self {
        Self {
            line: quote(program),
        }
    }

    /// `sudo <program>`
    pub fn sudo(program: &str) -> Self {
        Self::new("sudo").arg(program)
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.line.push(' ');
        self.line.push_str(&quote(arg.as_ref()));
        self
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter().fold(self, |cmd, arg| cmd.arg(arg))
    }

    /// Append `--flag <value>` when the value is present.
    pub fn opt_arg(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    /// `self | next`
    pub fn pipe(mut self, next: RemoteCommand) -> Self {
        self.line.push_str(" | ");
        self.line.push_str(&next.line);
        self
    }

    /// `self || next`
    pub fn or_else(mut self, next: RemoteCommand) -> Self {
        self.line.push_str(" || ");
        self.line.push_str(&next.line);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c)
}

/// Quote a single word for a POSIX shell, leaving plain words untouched.
pub fn quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}
