//! Dangerous command shapes
//!
//! Each pattern describes a structural shape that is refused regardless of
//! the allowlist. Patterns are tested in order against the original command
//! text and the first match names the denial.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// A named regex rule
#[derive(Clone)]
pub struct DangerousPattern {
    name: String,
    regex: Regex,
}

impl DangerousPattern {
    /// Compile a named pattern
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }
}

impl fmt::Debug for DangerousPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DangerousPattern")
            .field("name", &self.name)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Built-in rules, in evaluation order
const BUILTIN_RULES: &[(&str, &str)] = &[
    (
        "recursive force delete",
        concat!(
            r"\brm\s+(?:[^\s|;&]+\s+)*-[a-zA-Z]*(?:[rR][a-zA-Z]*f|f[a-zA-Z]*[rR])",
            r"|\brm\s+[^|;&]*(?:-[rR]\b|--recursive)[^|;&]*(?:-f\b|--force)",
            r"|\brm\s+[^|;&]*(?:-f\b|--force)[^|;&]*(?:-[rR]\b|--recursive)",
            r"|(?i:\b(?:rmdir|rd)\s+(?:/\w\s+)*/s\b)",
            r"|(?i:\bdel\s+(?:/\w\s+)*/[sq]\b)",
        ),
    ),
    (
        "volume format",
        r"(?i)\bmkfs(?:\.\w+)?\b|\bformat\s+[a-z]:|\bdiskpart\b",
    ),
    (
        "null sink redirection",
        r"\d?>>?\s*/dev/null\b|(?i:\d?>>?\s*nul\b)",
    ),
    (
        "pipe to shell",
        r"(?i)\|\s*(?:sudo\s+)?(?:sh|bash|zsh|ksh|dash|fish|csh|tcsh|cmd|powershell|pwsh)\b",
    ),
    (
        "chained destructive command",
        r"(?i)(?:&&|\|\||;)\s*(?:sudo\s+)?(?:rm|del|rmdir|rd|format|mkfs|dd|shutdown|reboot)\b",
    ),
    ("command substitution", r"\$\(|`"),
    (
        "dynamic code evaluation",
        r"\b(?:eval|exec)\b|\b(?:system|popen|spawn|execSync)\s*\(|\bos\.system\b|\bchild_process\b",
    ),
    (
        "sensitive system file access",
        concat!(
            r"/etc/(?:passwd|shadow|sudoers|group|gshadow)\b",
            r"|/\.ssh\b|\.aws/credentials|\bid_(?:rsa|ecdsa|ed25519)\b",
            r"|/proc/self\b|/dev/(?:mem|kmem|sd[a-z])\b",
            r"|(?i:\b[a-z]:\\windows\\system32\b)",
        ),
    ),
    ("path traversal", r"\.\.[/\\]|[/\\]\.\.(?:$|\s)|(?:^|\s)\.\.(?:$|\s)"),
];

static BUILTIN_PATTERNS: LazyLock<Vec<DangerousPattern>> = LazyLock::new(|| {
    BUILTIN_RULES
        .iter()
        .map(|(name, pattern)| DangerousPattern::new(*name, pattern).unwrap())
        .collect()
});

/// The built-in pattern list
pub fn builtin_patterns() -> Vec<DangerousPattern> {
    BUILTIN_PATTERNS.clone()
}
