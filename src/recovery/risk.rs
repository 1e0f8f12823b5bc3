//! Command risk classification.
//!
//! A pure, total function from command text to a [`RiskLevel`]. Tiers are
//! evaluated Critical, High, Medium; the first tier with a matching pattern
//! wins and anything unmatched is Low.
//!
//! Matching is plain substring containment on a normalized form of the
//! command:
//!
//! - lowercased, with quote characters removed (`rm -rf "/"` reads as
//!   `rm -rf /`)
//! - `;`, `&` and `|` set off as separate words, and a run of `>` likewise,
//!   so `rm -rf /;`, `x|sh` and `echo 0 >/dev/sda` read as `rm -rf / ;`,
//!   `x | sh` and `echo 0 > /dev/sda`
//! - whitespace runs collapsed to one space, padded with one space on each
//!   side
//!
//! Patterns that start or end with a space therefore match whole words,
//! including at the start or end of the command. Patterns added through
//! [`RiskClassifier::with_pattern`] get the same treatment.
//!
//! Classification is advisory. Nothing in this crate refuses to run a command
//! because of its tier.

use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Destructive wipes, raw device writes, root-wide permission resets, fork
/// bombs and remote scripts piped into a shell.
const CRITICAL_PATTERNS: &[&str] = &[
    "rm -rf / ",
    "rm -fr / ",
    "rm -rf /* ",
    "rm -fr /* ",
    "rm -rf ~ ",
    "rm -fr ~ ",
    "rm -rf ~/ ",
    "rm -rf ~/* ",
    "--no-preserve-root",
    "dd if=",
    "mkfs",
    "> /dev/sd",
    "> /dev/nvme",
    "> /dev/hd",
    "> /dev/vd",
    "> /dev/mmcblk",
    "of=/dev/sd",
    "of=/dev/nvme",
    "of=/dev/vd",
    "of=/dev/mmcblk",
    "chmod -r 777 / ",
    "chmod -r 000 / ",
    "chown -r root:root / ",
    ":(){",
    "| sh ",
    "| bash ",
    "| zsh ",
    "| sudo sh ",
    "| sudo bash ",
    "| sudo zsh ",
    "bash <(curl",
    "bash <(wget",
    "sh <(curl",
    "sh <(wget",
];

/// Privilege elevation and service or process disruption.
const HIGH_PATTERNS: &[&str] = &[
    " sudo ",
    " su - ",
    "systemctl stop ",
    "systemctl restart ",
    "systemctl disable ",
    "systemctl mask ",
    " service ",
    " reboot ",
    " shutdown ",
    " halt ",
    " poweroff ",
    " kill ",
    " pkill ",
    " killall ",
    "apt remove ",
    "apt purge ",
    "apt-get remove ",
    "apt-get purge ",
    "yum remove ",
    "dnf remove ",
    "pacman -r",
    "docker stop ",
    "docker rm ",
    "docker rmi ",
    "docker kill ",
    "kubectl delete ",
    " iptables ",
    " ufw ",
    "firewall-cmd ",
];

/// File mutation that is not outright destructive.
const MEDIUM_PATTERNS: &[&str] = &[
    " chmod ",
    " chown ",
    " mv ",
    " cp -r",
    " cp -a",
    " rsync ",
    " xargs ",
    "sed -i",
    " rm ",
    " truncate ",
];

/// Coarse risk tier, ordered `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Whether a caller should confirm before running a command of this tier.
    pub fn requires_confirmation(self) -> bool {
        self >= RiskLevel::High
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tier's pattern table.
#[derive(Debug, Clone)]
pub struct RiskTier {
    pub level: RiskLevel,
    pub patterns: Vec<String>,
}

/// Ordered pattern tables, most severe first.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    tiers: Vec<RiskTier>,
}

static DEFAULT_CLASSIFIER: Lazy<RiskClassifier> = Lazy::new(RiskClassifier::default);

fn tier(level: RiskLevel, patterns: &[&str]) -> RiskTier {
    RiskTier {
        level,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    }
}

/// Lowercase, drop quotes and set shell operators off as their own words.
fn separate_operators(text: &str) -> String {
    let mut spaced = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {}
            ';' | '&' | '|' => {
                spaced.push(' ');
                spaced.push(c);
                spaced.push(' ');
            }
            '>' => {
                spaced.push_str(" >");
                while chars.next_if_eq(&'>').is_some() {
                    spaced.push('>');
                }
                spaced.push(' ');
            }
            _ => spaced.extend(c.to_lowercase()),
        }
    }
    spaced
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize(command: &str) -> String {
    format!(" {} ", collapse_whitespace(&separate_operators(command)))
}

/// Bring a custom pattern into the normalized form, keeping the leading and
/// trailing space that make it a whole-word match.
fn normalize_pattern(pattern: &str) -> String {
    let core = collapse_whitespace(&separate_operators(pattern));
    let lead = if pattern.starts_with(' ') { " " } else { "" };
    let trail = if pattern.ends_with(' ') { " " } else { "" };
    format!("{}{}{}", lead, core, trail)
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self {
            tiers: vec![
                tier(RiskLevel::Critical, CRITICAL_PATTERNS),
                tier(RiskLevel::High, HIGH_PATTERNS),
                tier(RiskLevel::Medium, MEDIUM_PATTERNS),
            ],
        }
    }
}

impl RiskClassifier {
    /// A classifier with no patterns; everything is Low.
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Add a pattern to `level`'s table. Patterns for `Low` are ignored.
    ///
    /// The pattern is normalized like a command, so `|sh` and `| sh` are the
    /// same pattern.
    pub fn with_pattern(mut self, level: RiskLevel, pattern: impl Into<String>) -> Self {
        if level == RiskLevel::Low {
            return self;
        }
        let pattern = normalize_pattern(&pattern.into());
        match self.tiers.iter_mut().find(|t| t.level == level) {
            Some(existing) => existing.patterns.push(pattern),
            None => {
                self.tiers.push(RiskTier {
                    level,
                    patterns: vec![pattern],
                });
                self.tiers.sort_by(|a, b| b.level.cmp(&a.level));
            }
        }
        self
    }

    /// The tier and pattern that decided `command`, if any pattern matched.
    pub fn matched_pattern(&self, command: &str) -> Option<(RiskLevel, &str)> {
        let normalized = normalize(command);
        self.tiers.iter().find_map(|tier| {
            tier.patterns
                .iter()
                .find(|p| normalized.contains(p.as_str()))
                .map(|p| (tier.level, p.as_str()))
        })
    }

    pub fn classify(&self, command: &str) -> RiskLevel {
        self.matched_pattern(command)
            .map(|(level, _)| level)
            .unwrap_or(RiskLevel::Low)
    }

    /// Whether `command` matches `level`'s table alone, ignoring other tiers.
    pub fn matches_tier(&self, level: RiskLevel, command: &str) -> bool {
        let normalized = normalize(command);
        self.tiers
            .iter()
            .filter(|t| t.level == level)
            .flat_map(|t| t.patterns.iter())
            .any(|p| normalized.contains(p.as_str()))
    }
}

/// Classify with the built-in tables.
pub fn classify_risk(command: &str) -> RiskLevel {
    DEFAULT_CLASSIFIER.classify(command)
}

/// Whether `command` matches the built-in Critical table.
pub fn is_dangerous(command: &str) -> bool {
    DEFAULT_CLASSIFIER.matches_tier(RiskLevel::Critical, command)
}

/// Whether `command` matches the built-in High table.
pub fn requires_confirmation(command: &str) -> bool {
    DEFAULT_CLASSIFIER.matches_tier(RiskLevel::High, command)
}

/// The built-in tier and pattern for `command`, pattern trimmed.
pub fn explain_risk(command: &str) -> (RiskLevel, Option<String>) {
    match DEFAULT_CLASSIFIER.matched_pattern(command) {
        Some((level, pattern)) => (level, Some(pattern.trim().to_string())),
        None => (RiskLevel::Low, None),
    }
}
