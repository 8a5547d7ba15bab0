use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;

/// Outcome of classifying a raw command line before anything is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "camelCase")]
pub enum PolicyVerdict {
    Allowed,
    BlockedCommand(String),
    UnsafePattern(String),
    /// Quoting could not be parsed (e.g. an unterminated quote).
    Unparseable(String),
    Empty,
}

impl PolicyVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyVerdict::Allowed)
    }

    pub fn reason(&self) -> String {
        match self {
            PolicyVerdict::Allowed => "command allowed".to_string(),
            PolicyVerdict::BlockedCommand(name) => format!("command '{}' is blocked", name),
            PolicyVerdict::UnsafePattern(pattern) => {
                format!("command contains unsafe pattern '{}'", pattern)
            }
            PolicyVerdict::Unparseable(reason) => format!("command could not be parsed: {}", reason),
            PolicyVerdict::Empty => "command is empty".to_string(),
        }
    }
}

/// Pure classifier over a fixed [`PolicyConfig`].
///
/// Execution is default-allow: anything not in the block set and free of the
/// dangerous substrings is `Allowed`, whether or not it is on the discovery list.
#[derive(Debug, Clone, Default)]
pub struct CommandPolicy {
    cfg: PolicyConfig,
}

impl CommandPolicy {
    pub fn new(cfg: PolicyConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    pub fn classify(&self, raw: &str) -> PolicyVerdict {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return PolicyVerdict::Empty;
        }

        let tokens = match tokenize(trimmed) {
            Ok(tokens) => tokens,
            Err(reason) => return PolicyVerdict::Unparseable(reason),
        };
        let first = match tokens.first() {
            Some(first) => first,
            None => return PolicyVerdict::Empty,
        };

        let name = normalize_command_name(first);
        if self.cfg.blocked_commands.contains(&name) {
            return PolicyVerdict::BlockedCommand(name);
        }

        let lowered = raw.to_lowercase();
        if let Some(pattern) = self
            .cfg
            .dangerous_patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
        {
            return PolicyVerdict::UnsafePattern(pattern.clone());
        }

        PolicyVerdict::Allowed
    }
}

#[cfg(not(windows))]
fn tokenize(command: &str) -> Result<Vec<String>, String> {
    shell_words::split(command).map_err(|e| e.to_string())
}

// cmd.exe has no POSIX word splitting; mirror its plain whitespace handling.
#[cfg(windows)]
fn tokenize(command: &str) -> Result<Vec<String>, String> {
    Ok(command.split_whitespace().map(str::to_string).collect())
}

/// Lowercases and strips any directory and extension: `/usr/bin/sudo`,
/// `C:\Tools\sudo.exe` and `SUDO` all become `sudo`.
pub fn normalize_command_name(token: &str) -> String {
    let lowered = token.to_lowercase();
    let base = lowered
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(lowered.as_str());
    // a leading dot is part of the name, not an extension
    match base.get(1..).and_then(|rest| rest.find('.')) {
        Some(idx) => base[..idx + 1].to_string(),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paths_and_extensions() {
        assert_eq!(normalize_command_name("/usr/bin/sudo"), "sudo");
        assert_eq!(normalize_command_name("sudo.exe"), "sudo");
        assert_eq!(normalize_command_name("C:\\Windows\\System32\\SHUTDOWN.EXE"), "shutdown");
        assert_eq!(normalize_command_name("python3"), "python3");
        assert_eq!(normalize_command_name("./script.tar.gz"), "script");
        assert_eq!(normalize_command_name(".hidden"), ".hidden");
    }

    #[test]
    fn empty_and_whitespace_are_empty() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.classify(""), PolicyVerdict::Empty);
        assert_eq!(policy.classify("   \t "), PolicyVerdict::Empty);
    }

    #[test]
    fn block_set_wins_over_patterns() {
        let policy = CommandPolicy::default();
        assert_eq!(
            policy.classify("sudo rm -rf /"),
            PolicyVerdict::BlockedCommand("sudo".into())
        );
    }

    #[test]
    fn patterns_match_case_insensitively() {
        let policy = CommandPolicy::default();
        assert_eq!(
            policy.classify("RM -RF /"),
            PolicyVerdict::UnsafePattern("rm -rf /".into())
        );
        assert_eq!(
            policy.classify("echo a || echo b"),
            PolicyVerdict::UnsafePattern("||".into())
        );
    }

    #[cfg(unix)]
    #[test]
    fn unterminated_quote_is_unparseable() {
        let policy = CommandPolicy::default();
        assert!(matches!(
            policy.classify("echo \"oops"),
            PolicyVerdict::Unparseable(_)
        ));
    }

    #[test]
    fn reasons_name_the_offender() {
        assert!(PolicyVerdict::BlockedCommand("dd".into()).reason().contains("dd"));
        assert!(PolicyVerdict::UnsafePattern("&&".into()).reason().contains("&&"));
        assert!(PolicyVerdict::Allowed.is_allowed());
        assert!(!PolicyVerdict::Empty.is_allowed());
    }
}
