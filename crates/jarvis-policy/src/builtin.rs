//! Built-in command tables for each supported host platform.
//!
//! A table holds three lists: the allowlisted command verbs, friendly
//! aliases that map onto those verbs, and the denylisted substrings. Only
//! verbs pass classification; aliases exist for natural-language fallback
//! and for the safe-command listing.

use jarvis_types::Platform;
use serde::Serialize;

/// Static command table for one platform.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTable {
    pub platform: Platform,
    verbs: &'static [&'static str],
    aliases: &'static [(&'static str, &'static str)],
    denylist: &'static [&'static str],
}

/// One entry of the public safe-command listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeCommand {
    /// Name an operator may say or type.
    pub name: String,
    /// Verb the name resolves to.
    pub command: String,
}

const WINDOWS_VERBS: &[&str] = &[
    "dir",
    "mkdir",
    "copy",
    "move",
    "del",
    "cd",
    "systeminfo",
    "tasklist",
    "ipconfig",
    "date",
    "time",
    "whoami",
    "hostname",
    "notepad",
    "calc",
    "explorer",
    "cmd",
    "powershell",
    "echo",
    "ping",
    "help",
    "cls",
    "tree",
    "vol",
    "type",
    "find",
];

const WINDOWS_ALIASES: &[(&str, &str)] = &[
    ("ls", "dir"),
    ("list", "dir"),
    ("create_folder", "mkdir"),
    ("delete", "del"),
    ("remove", "del"),
    ("change_directory", "cd"),
    ("system_info", "systeminfo"),
    ("processes", "tasklist"),
    ("network_info", "ipconfig"),
    ("calculator", "calc"),
    ("file_explorer", "explorer"),
    ("command_prompt", "cmd"),
    ("clear", "cls"),
];

const WINDOWS_DENYLIST: &[&str] = &[
    "format",
    "fdisk",
    "del /s",
    "rmdir /s",
    "shutdown",
    "restart",
    "net user",
    "net localgroup",
    "reg delete",
    "reg add",
    "sfc",
    "dism",
    "bcdedit",
    "diskpart",
    "wmic",
    "sc delete",
    "sc create",
    "taskkill /f",
    "del /f /q",
    "rd /s /q",
    "attrib +h +s +r",
    "cipher",
    "icacls",
    "takeown",
    "runas",
    "powershell -windowstyle hidden",
];

const UNIX_VERBS: &[&str] = &[
    "ls",
    "pwd",
    "cd",
    "mkdir",
    "cp",
    "mv",
    "touch",
    "cat",
    "head",
    "tail",
    "echo",
    "date",
    "whoami",
    "hostname",
    "uname",
    "uptime",
    "df",
    "du",
    "free",
    "ps",
    "ip",
    "ifconfig",
    "ping",
    "tree",
    "find",
    "grep",
    "wc",
    "which",
    "clear",
    "nano",
    "vim",
    "xdg-open",
];

const UNIX_ALIASES: &[(&str, &str)] = &[
    ("dir", "ls"),
    ("list", "ls"),
    ("create_folder", "mkdir"),
    ("change_directory", "cd"),
    ("system_info", "uname"),
    ("processes", "ps"),
    ("network_info", "ip"),
    ("cls", "clear"),
    ("editor", "nano"),
    ("open", "xdg-open"),
];

const UNIX_DENYLIST: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r /",
    "mkfs",
    "dd if=",
    "shutdown",
    "reboot",
    "halt",
    "poweroff",
    "init 0",
    "useradd",
    "userdel",
    "usermod",
    "passwd",
    "sudo",
    "su -",
    "chown",
    "chmod 777",
    "killall",
    "pkill",
    "kill -9",
    "fdisk",
    "parted",
    ":(){",
    "> /dev/",
    "of=/dev/",
    "-delete",
    "-exec rm",
    "-execdir rm",
    "nohup",
    "setsid",
];

impl PolicyTable {
    pub const WINDOWS: PolicyTable = PolicyTable {
        platform: Platform::Windows,
        verbs: WINDOWS_VERBS,
        aliases: WINDOWS_ALIASES,
        denylist: WINDOWS_DENYLIST,
    };

    pub const UNIX: PolicyTable = PolicyTable {
        platform: Platform::Unix,
        verbs: UNIX_VERBS,
        aliases: UNIX_ALIASES,
        denylist: UNIX_DENYLIST,
    };

    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Windows => Self::WINDOWS,
            Platform::Unix => Self::UNIX,
        }
    }

    /// Allowlisted command verbs.
    pub fn verbs(&self) -> &'static [&'static str] {
        self.verbs
    }

    pub fn is_verb(&self, token: &str) -> bool {
        self.verbs.contains(&token)
    }

    /// Resolve a verb or alias to the verb it names.
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        if let Some(verb) = self.verbs.iter().find(|v| **v == name) {
            return Some(verb);
        }
        self.aliases
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, verb)| *verb)
    }

    /// First denylisted substring contained in `normalized`, if any.
    pub(crate) fn denied_pattern(&self, normalized: &str) -> Option<&'static str> {
        self.denylist
            .iter()
            .find(|pattern| normalized.contains(**pattern))
            .copied()
    }

    /// Verbs and aliases, sorted by name. Denylist entries are never listed.
    pub fn safe_commands(&self) -> Vec<SafeCommand> {
        let mut list: Vec<SafeCommand> = self
            .verbs
            .iter()
            .map(|verb| SafeCommand {
                name: (*verb).to_string(),
                command: (*verb).to_string(),
            })
            .chain(self.aliases.iter().map(|(alias, verb)| SafeCommand {
                name: (*alias).to_string(),
                command: (*verb).to_string(),
            }))
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_resolves_to_a_verb() {
        for table in [PolicyTable::WINDOWS, PolicyTable::UNIX] {
            for (alias, verb) in table.aliases {
                assert!(
                    table.is_verb(verb),
                    "{} alias '{alias}' points at unknown verb '{verb}'",
                    table.platform
                );
            }
        }
    }

    #[test]
    fn denylist_patterns_are_lowercase() {
        for table in [PolicyTable::WINDOWS, PolicyTable::UNIX] {
            for pattern in table.denylist {
                assert_eq!(*pattern, pattern.to_lowercase());
            }
        }
    }

    #[test]
    fn safe_commands_exclude_denylist() {
        let listing = PolicyTable::WINDOWS.safe_commands();
        assert!(listing.iter().any(|c| c.name == "processes" && c.command == "tasklist"));
        assert!(listing.iter().all(|c| c.name != "format" && c.name != "shutdown"));
        assert_eq!(
            listing.len(),
            WINDOWS_VERBS.len() + WINDOWS_ALIASES.len()
        );
    }

    #[test]
    fn resolve_handles_verbs_and_aliases() {
        assert_eq!(PolicyTable::UNIX.resolve("ls"), Some("ls"));
        assert_eq!(PolicyTable::UNIX.resolve("processes"), Some("ps"));
        assert_eq!(PolicyTable::WINDOWS.resolve("list"), Some("dir"));
        assert_eq!(PolicyTable::WINDOWS.resolve("format"), None);
    }
}
