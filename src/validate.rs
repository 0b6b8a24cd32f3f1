//! Field rules for operator input.
//!
//! Each field has a table of [`Rule`]s. Checking a value runs every rule and
//! reports all the ones it breaks, so the operator sees the full list at once.
//! Rules that need a catalog (timezones, locales, keymaps) live in
//! [`crate::catalog`].

/// A pure predicate paired with the message shown when it fails.
#[derive(Clone, Copy)]
pub struct Rule {
    pub reason: &'static str,
    pub check: fn(&str) -> bool,
}

/// The rules an input broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reasons: Vec<&'static str>,
}

impl Rejection {
    pub fn single(reason: &'static str) -> Self {
        Self {
            reasons: vec![reason],
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reasons.join("; "))
    }
}

pub fn check(rules: &[Rule], value: &str) -> Result<(), Rejection> {
    let reasons: Vec<&'static str> = rules
        .iter()
        .filter(|rule| !(rule.check)(value))
        .map(|rule| rule.reason)
        .collect();

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(Rejection { reasons })
    }
}

// ── Hostname ──────────────────────────────────────────────────────────────────

pub const HOSTNAME_MAX: usize = 253;
pub const LABEL_MAX: usize = 63;

pub const HOSTNAME_RULES: &[Rule] = &[
    Rule {
        reason: "The full hostname (including dots) is 1 to 253 characters long.",
        check: |h| (1..=HOSTNAME_MAX).contains(&h.len()),
    },
    Rule {
        reason: "Only letters a-z, A-Z, digits 0-9, hyphens (-) and dots (.) are allowed.",
        check: |h| h.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'),
    },
    Rule {
        reason: "Each label (part between dots) is 1 to 63 characters long; no empty labels.",
        check: |h| h.split('.').all(|l| (1..=LABEL_MAX).contains(&l.len())),
    },
    Rule {
        reason: "No label, and so neither the hostname, may start or end with a hyphen.",
        check: |h| h.split('.').all(|l| !l.starts_with('-') && !l.ends_with('-')),
    },
];

pub fn hostname(value: &str) -> Result<(), Rejection> {
    check(HOSTNAME_RULES, value)
}

// ── Username ──────────────────────────────────────────────────────────────────

pub const USERNAME_MAX: usize = 32;

/// Names that belong to system accounts, plus the installer's own build user.
pub const RESERVED_USERNAMES: &[&str] = &[
    "root", "daemon", "bin", "sys", "sync", "games", "man", "lp", "mail", "news", "uucp",
    "proxy", "www-data", "backup", "list", "irc", "gnats", "nobody",
    crate::steps::install::BUILD_USER,
];

pub const USERNAME_RULES: &[Rule] = &[
    Rule {
        reason: "Be 1 to 32 characters.",
        check: |u| (1..=USERNAME_MAX).contains(&u.len()),
    },
    Rule {
        reason: "Only contain: a-z, 0-9, dash (-), or underscore (_).",
        check: |u| {
            u.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        },
    },
    Rule {
        reason: "Start with a lower-case letter or underscore.",
        check: |u| u.starts_with(|c: char| c.is_ascii_lowercase() || c == '_'),
    },
    Rule {
        reason: "Not end with dash or underscore.",
        check: |u| !u.ends_with(['-', '_']),
    },
    Rule {
        reason: "Not be a reserved system account name (root, nobody, ...).",
        check: |u| !RESERVED_USERNAMES.contains(&u),
    },
];

pub fn username(value: &str) -> Result<(), Rejection> {
    check(USERNAME_RULES, value)
}

// ── Passwords ─────────────────────────────────────────────────────────────────

pub const USER_PASSWORD_RULES: &[Rule] = &[
    Rule {
        reason: "Password must be at least 6 characters, or blank for no password.",
        check: |p| p.is_empty() || p.chars().count() >= 6,
    },
    Rule {
        reason: "Password must be 64 characters or fewer.",
        check: |p| p.chars().count() <= 64,
    },
];

pub fn user_password(value: &str) -> Result<(), Rejection> {
    check(USER_PASSWORD_RULES, value)
}

pub const ROOT_PASSWORD_RULES: &[Rule] = &[
    Rule {
        reason: "Password must be at least 8 characters.",
        check: |p| p.chars().count() >= 8,
    },
    Rule {
        reason: "Password must be 128 characters or fewer.",
        check: |p| p.chars().count() <= 128,
    },
];

/// Length rules only. A root password equal to the username additionally
/// needs the operator's confirmation, which the collector asks for.
pub fn root_password(value: &str) -> Result<(), Rejection> {
    check(ROOT_PASSWORD_RULES, value)
}

// ── Timezone syntax ───────────────────────────────────────────────────────────

pub const TIMEZONE_MAX: usize = 64;

pub const TIMEZONE_RULES: &[Rule] = &[
    Rule {
        reason: "Timezone cannot be empty.",
        check: |t| !t.is_empty(),
    },
    Rule {
        reason: "Timezone is at most 64 characters long.",
        check: |t| t.len() <= TIMEZONE_MAX,
    },
    Rule {
        reason: "Only letters, digits, '_', '-' and '/' are allowed.",
        check: |t| {
            t.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
        },
    },
    Rule {
        reason: "Timezone must not start with '/' or contain '..'.",
        check: |t| !t.starts_with('/') && !t.contains(".."),
    },
];

pub fn timezone_syntax(value: &str) -> Result<(), Rejection> {
    check(TIMEZONE_RULES, value)
}
