//! Named command templates.

use jarvis_types::Platform;
use serde::Serialize;

use crate::ExecError;

/// A fixed list of commands run together as a batch.
#[derive(Debug, Clone, Copy)]
pub struct CommandTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub commands: &'static [&'static str],
}

/// Serializable view of a template for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
}

impl From<&CommandTemplate> for TemplateInfo {
    fn from(t: &CommandTemplate) -> Self {
        Self {
            name: t.name.to_string(),
            description: t.description.to_string(),
            commands: t.commands.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

const WINDOWS_TEMPLATES: &[CommandTemplate] = &[
    CommandTemplate {
        name: "system_info",
        description: "Operating system, current user and host name",
        commands: &["systeminfo", "whoami", "hostname"],
    },
    CommandTemplate {
        name: "network_check",
        description: "Adapter configuration and loopback reachability",
        commands: &["ipconfig", "ping -n 1 127.0.0.1"],
    },
    CommandTemplate {
        name: "file_overview",
        description: "Current directory, its contents and volume label",
        commands: &["cd", "dir", "vol"],
    },
    CommandTemplate {
        name: "process_overview",
        description: "Running processes",
        commands: &["tasklist"],
    },
];

const UNIX_TEMPLATES: &[CommandTemplate] = &[
    CommandTemplate {
        name: "system_info",
        description: "Kernel, current user, host name and uptime",
        commands: &["uname -a", "whoami", "hostname", "uptime"],
    },
    CommandTemplate {
        name: "network_check",
        description: "Interface addresses and loopback reachability",
        commands: &["ip addr", "ping -c 1 127.0.0.1"],
    },
    CommandTemplate {
        name: "file_overview",
        description: "Current directory, its contents and disk usage",
        commands: &["pwd", "ls -la", "df -h ."],
    },
    CommandTemplate {
        name: "process_overview",
        description: "Running processes",
        commands: &["ps aux"],
    },
];

pub fn for_platform(platform: Platform) -> &'static [CommandTemplate] {
    match platform {
        Platform::Windows => WINDOWS_TEMPLATES,
        Platform::Unix => UNIX_TEMPLATES,
    }
}

pub fn find(platform: Platform, name: &str) -> Result<&'static CommandTemplate, ExecError> {
    for_platform(platform)
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| ExecError::TemplateNotFound {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_policy::PolicyEngine;

    #[test]
    fn every_template_command_passes_policy() {
        for platform in [Platform::Windows, Platform::Unix] {
            let engine = PolicyEngine::for_platform(platform);
            for template in for_platform(platform) {
                for command in template.commands {
                    let verdict = engine.classify(command);
                    assert!(
                        verdict.allowed,
                        "{platform} template {} has blocked command {command:?}: {verdict}",
                        template.name
                    );
                }
            }
        }
    }

    #[test]
    fn both_platforms_offer_the_same_names() {
        let names = |p| {
            for_platform(p)
                .iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Platform::Windows), names(Platform::Unix));
    }

    #[test]
    fn find_is_exact() {
        assert!(find(Platform::Unix, "system_info").is_ok());
        assert!(find(Platform::Unix, "SYSTEM_INFO").is_err());
    }
}
