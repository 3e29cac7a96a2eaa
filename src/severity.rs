//! Ranks a command against an ordered table of danger patterns.
//!
//! Every entry is tested; the worst match sets the level, and the reasons
//! of all matches are surfaced so the confirmation prompt can show the
//! full picture, not just the headline.

use crate::types::{Severity, SeverityCheck};
use regex::Regex;

struct SeverityRule {
    pattern: Regex,
    level: Severity,
    reason: &'static str,
}

pub struct SeverityTable {
    rules: Vec<SeverityRule>,
}

/// (pattern, level, reason), ordered from worst tier down. Table order
/// breaks ties: the first matching entry at the winning level supplies
/// the headline reason.
const RULES: &[(&str, Severity, &str)] = &[
    // critical
    (
        r"rm\s+(?:-[a-zA-Z]+\s+)+/(?:\*)?(?:\s|$)",
        Severity::Critical,
        "recursively deletes from the filesystem root",
    ),
    (
        r"--no-preserve-root",
        Severity::Critical,
        "bypasses the root deletion safeguard",
    ),
    (
        r"dd\s+[^|;]*of=/dev/",
        Severity::Critical,
        "writes raw data directly to a block device",
    ),
    (
        r">\s*/dev/(?:sd|hd|nvme|disk)",
        Severity::Critical,
        "overwrites a raw block device",
    ),
    (
        r"\bmkfs(?:\.\w+)?\b",
        Severity::Critical,
        "formats a filesystem, destroying its contents",
    ),
    (
        r":\(\)\s*\{\s*:\|:&\s*\}\s*;",
        Severity::Critical,
        "fork bomb, exhausts system resources",
    ),
    // high
    (
        r"sudo\s+rm\s+-[a-zA-Z]*r",
        Severity::High,
        "recursive deletion with elevated privileges",
    ),
    (
        r"chmod\s+(?:-[a-zA-Z]+\s+)*(?:777|000)\b",
        Severity::High,
        "sets dangerous permission bits",
    ),
    (
        r"chown\s+-[a-zA-Z]*R[a-zA-Z]*\s+\S+\s+/(?:\s|$)",
        Severity::High,
        "recursively changes ownership from the filesystem root",
    ),
    (
        r">\s*/etc/",
        Severity::High,
        "overwrites a system configuration path",
    ),
    (
        r"(?:curl|wget)[^|;]*\|\s*(?:sudo\s+)?(?:ba|z|da|fi)?sh\b",
        Severity::High,
        "pipes a remote download straight into a shell",
    ),
    (
        r"eval\s+.*(?:curl|wget)",
        Severity::High,
        "evaluates downloaded content as code",
    ),
    // medium
    (
        r"rm\s+(?:-[a-zA-Z]+\s+)*-[a-zA-Z]*[rf]",
        Severity::Medium,
        "deletes recursively or without prompting",
    ),
    (
        r"rm\s+[^|;]*\*",
        Severity::Medium,
        "deletes files matching a wildcard",
    ),
    (r"\bsudo\s", Severity::Medium, "runs with elevated privileges"),
    (
        r">\s*\S+\.(?:conf|cfg|ini|ya?ml|json|toml)\b",
        Severity::Medium,
        "overwrites a configuration file",
    ),
    (
        r"\b(?:apt(?:-get)?\s+(?:install|remove|purge)|dnf\s+(?:install|remove)|yum\s+(?:install|remove)|pacman\s+-[A-Za-z]*[SR]|brew\s+(?:install|uninstall)|npm\s+(?:install|uninstall)\s+(?:-g|--global)|pip3?\s+(?:install|uninstall))\b",
        Severity::Medium,
        "installs or removes packages system-wide",
    ),
    (
        r"\b(?:systemctl\s+(?:start|stop|restart|enable|disable|mask)|service\s+\S+\s+(?:start|stop|restart))\b",
        Severity::Medium,
        "changes the state of a system service",
    ),
    (
        r"\b(?:kill\s+-9\b|killall\s|pkill\s)",
        Severity::Medium,
        "forcefully terminates processes",
    ),
    // low
    (
        r"\b(?:rm|rmdir)\s",
        Severity::Low,
        "deletes files or directories",
    ),
    (r"\b(?:mv|cp)\s", Severity::Low, "moves or copies files"),
    (r">", Severity::Low, "redirects output, may overwrite a file"),
    (
        r"git\s+push\s+[^|;]*(?:--force|-f\b)|git\s+reset\s+--hard|git\s+filter-branch",
        Severity::Low,
        "rewrites git history",
    ),
    (
        r"docker\s+(?:rmi\s|volume\s+rm\s|system\s+prune)",
        Severity::Low,
        "removes container images or volumes",
    ),
];

impl SeverityTable {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|&(pattern, level, reason)| {
                Regex::new(pattern).ok().map(|pattern| SeverityRule {
                    pattern,
                    level,
                    reason,
                })
            })
            .collect();
        Self { rules }
    }

    pub fn classify(&self, command: &str) -> SeverityCheck {
        let mut level = Severity::Safe;
        let mut reason = String::new();
        let mut warnings: Vec<String> = Vec::new();

        for rule in &self.rules {
            if !rule.pattern.is_match(command) {
                continue;
            }
            if rule.level > level {
                level = rule.level;
                reason = rule.reason.to_string();
            }
            if !warnings.iter().any(|w| w == rule.reason) {
                warnings.push(rule.reason.to_string());
            }
        }

        SeverityCheck {
            level,
            reason,
            warnings,
        }
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self::new()
    }
}

/// High and critical commands demand an explicit typed yes; everything
/// else gets the lighter default-accept prompt.
pub fn requires_confirmation(level: Severity) -> bool {
    matches!(level, Severity::High | Severity::Critical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> SeverityTable {
        SeverityTable::new()
    }

    #[test]
    fn all_patterns_compile() {
        assert_eq!(table().rules.len(), RULES.len());
    }

    #[test]
    fn root_deletion_is_critical() {
        let check = table().classify("rm -rf /");
        assert_eq!(check.level, Severity::Critical);
        assert!(check.reason.contains("root"));
        assert!(requires_confirmation(check.level));
    }

    #[test]
    fn root_wildcard_deletion_is_critical() {
        assert_eq!(table().classify("rm -rf /*").level, Severity::Critical);
        assert_eq!(
            table().classify("rm -rf / --no-preserve-root").level,
            Severity::Critical
        );
    }

    #[test]
    fn warnings_collect_every_matched_tier() {
        // rm -rf / matches the critical root rule, the medium recursive-rm
        // rule, and the low plain-rm rule
        let check = table().classify("rm -rf /");
        assert_eq!(check.level, Severity::Critical);
        assert!(check.warnings.len() >= 3);
        assert_eq!(check.warnings[0], check.reason);
    }

    #[test]
    fn dangerous_permission_bits_are_high() {
        let check = table().classify("chmod 777 /etc/passwd");
        assert_eq!(check.level, Severity::High);
        assert_eq!(check.reason, "sets dangerous permission bits");
        // nothing else in the table matches this command
        assert_eq!(check.warnings, vec![check.reason.clone()]);
    }

    #[test]
    fn fork_bomb_is_critical() {
        assert_eq!(table().classify(":(){ :|:& };:").level, Severity::Critical);
    }

    #[test]
    fn block_device_write_is_critical() {
        assert_eq!(
            table().classify("dd if=/dev/zero of=/dev/sda").level,
            Severity::Critical
        );
    }

    #[test]
    fn curl_pipe_sh_is_high() {
        let check = table().classify("curl -fsSL https://example.com/install.sh | sh");
        assert_eq!(check.level, Severity::High);
        let check = table().classify("wget -qO- https://example.com/x | sudo bash");
        assert_eq!(check.level, Severity::High);
    }

    #[test]
    fn sudo_rm_recursive_is_high() {
        assert_eq!(
            table().classify("sudo rm -rf ./build").level,
            Severity::High
        );
    }

    #[test]
    fn recursive_delete_in_a_directory_is_medium() {
        let check = table().classify("rm -rf ./target");
        assert_eq!(check.level, Severity::Medium);
        assert!(!requires_confirmation(check.level));
    }

    #[test]
    fn plain_sudo_is_medium() {
        assert_eq!(
            table().classify("sudo systemctl status nginx").level,
            Severity::Medium
        );
    }

    #[test]
    fn package_installs_are_medium() {
        assert_eq!(
            table().classify("apt-get install ripgrep").level,
            Severity::Medium
        );
        assert_eq!(
            table().classify("npm install -g typescript").level,
            Severity::Medium
        );
    }

    #[test]
    fn plain_delete_and_redirect_are_low() {
        assert_eq!(table().classify("rm notes.txt").level, Severity::Low);
        assert_eq!(
            table().classify("echo done > status.txt").level,
            Severity::Low
        );
        assert_eq!(
            table().classify("git push --force origin main").level,
            Severity::Low
        );
    }

    #[test]
    fn read_only_commands_are_safe() {
        for cmd in ["ls -la", "df -h", "cat notes.txt", "git status", "ps aux"] {
            let check = table().classify(cmd);
            assert_eq!(check.level, Severity::Safe, "{cmd}");
            assert!(check.reason.is_empty());
            assert!(check.warnings.is_empty());
            assert!(!requires_confirmation(check.level));
        }
    }

    #[test]
    fn level_is_the_maximum_over_all_matches() {
        // every individually-classified level must survive composition
        let table = table();
        let medium = table.classify("rm -rf ./target");
        let high = table.classify("curl https://x.sh | sh");
        let combined = table.classify("rm -rf ./target && curl https://x.sh | sh");
        assert_eq!(combined.level, medium.level.max(high.level));
        assert!(combined.warnings.contains(&medium.reason));
        assert!(combined.warnings.contains(&high.reason));
    }

    #[test]
    fn confirmation_is_required_exactly_for_high_and_critical() {
        assert!(!requires_confirmation(Severity::Safe));
        assert!(!requires_confirmation(Severity::Low));
        assert!(!requires_confirmation(Severity::Medium));
        assert!(requires_confirmation(Severity::High));
        assert!(requires_confirmation(Severity::Critical));
    }

    #[test]
    fn warnings_are_deduplicated() {
        // two redirects, one reason
        let check = table().classify("echo a > x.txt && echo b > y.txt");
        let redirects = check
            .warnings
            .iter()
            .filter(|w| w.contains("redirects"))
            .count();
        assert_eq!(redirects, 1);
    }
}
