use std::collections::BTreeSet;

use once_cell::sync::Lazy;

/// Privilege escalation, account, filesystem, firewall and service management.
const BLOCKED_COMMANDS: &[&str] = &[
    "sudo",
    "su",
    "passwd",
    "useradd",
    "userdel",
    "usermod",
    "groupadd",
    "groupdel",
    "mount",
    "umount",
    "fdisk",
    "mkfs",
    "fsck",
    "dd",
    "reboot",
    "shutdown",
    "halt",
    "iptables",
    "ufw",
    "firewall-cmd",
    "crontab",
    "at",
    "batch",
    "systemctl",
];

/// Matched case-insensitively against the raw command line, in this order.
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /", "rm -rf *", ">(", "<(", "|&", "&>", "&&", "||",
];

/// Commands surfaced to users for discovery. Not consulted when gating execution.
const ALLOWED_COMMANDS: &[&str] = &[
    "ls", "dir", "pwd", "cd", "mkdir", "rmdir", "rm", "cp", "mv", "cat", "head", "tail", "grep",
    "find", "which", "whereis", "echo", "touch", "chmod", "chown", "python", "python3", "node",
    "npm", "npx", "pip", "pip3", "git", "curl", "wget", "java", "javac", "gcc", "g++", "make",
    "cmake", "go", "cargo", "rustc", "docker", "kubectl", "helm", "terraform", "ansible", "ssh",
    "scp", "rsync", "tar", "zip", "unzip", "gzip", "gunzip", "ps", "top", "htop", "kill",
    "killall", "systemctl", "service", "netstat", "ss", "ping", "traceroute", "nslookup", "dig",
    "code", "vim", "nano", "emacs", "less", "more", "tree", "clear", "history",
];

static DEFAULT_POLICY: Lazy<PolicyConfig> = Lazy::new(|| PolicyConfig {
    blocked_commands: BLOCKED_COMMANDS.iter().map(|s| s.to_string()).collect(),
    dangerous_patterns: DANGEROUS_PATTERNS.iter().map(|s| s.to_string()).collect(),
    allowed_commands: ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
});

/// Immutable policy tables shared by every classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub blocked_commands: BTreeSet<String>,
    pub dangerous_patterns: Vec<String>,
    pub allowed_commands: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl PolicyConfig {
    /// Whether `name` appears in the discovery allow-list.
    pub fn is_listed(&self, name: &str) -> bool {
        self.allowed_commands.contains(&name.to_lowercase())
    }

    /// Adds names to the block set. The block set can only grow.
    pub fn with_extra_blocked<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if !name.is_empty() {
                self.blocked_commands.insert(name);
            }
        }
        self
    }
}

/// Default tables extended by `WARDS_EXTRA_BLOCKED` (comma-separated or a JSON array).
pub fn load_from_env() -> PolicyConfig {
    let raw = match std::env::var("WARDS_EXTRA_BLOCKED") {
        Ok(s) if !s.trim().is_empty() => s,
        _ => return PolicyConfig::default(),
    };

    let names: Vec<String> = if raw.trim_start().starts_with('[') {
        match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("WARDS_EXTRA_BLOCKED JSON is malformed, ignoring: {}", e);
                Vec::new()
            }
        }
    } else {
        raw.split(',').map(|s| s.to_string()).collect()
    };

    PolicyConfig::default().with_extra_blocked(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_are_populated() {
        let cfg = PolicyConfig::default();
        assert!(cfg.blocked_commands.contains("sudo"));
        assert!(cfg.blocked_commands.contains("firewall-cmd"));
        assert_eq!(cfg.dangerous_patterns.len(), 8);
        assert!(cfg.is_listed("python3"));
        assert!(cfg.is_listed("GIT"));
        assert!(!cfg.is_listed("sudo"));
    }

    #[test]
    fn extra_blocked_only_adds() {
        let cfg = PolicyConfig::default().with_extra_blocked([" Curl ", "", "wget"]);
        assert!(cfg.blocked_commands.contains("curl"));
        assert!(cfg.blocked_commands.contains("wget"));
        assert!(cfg.blocked_commands.contains("sudo"));
        assert_eq!(
            cfg.blocked_commands.len(),
            PolicyConfig::default().blocked_commands.len() + 2
        );
    }
}
