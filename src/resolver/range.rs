//! npm-style version ranges on top of `semver`
//!
//! `semver::VersionReq` follows Cargo's rules, where a bare `1.2.3` means
//! `^1.2.3` and comparators are comma separated. npm treats a bare version
//! as exact, a bare partial as an x-range, separates comparators with
//! spaces and supports `a - b` and `||`. This module translates the npm
//! grammar into a set of alternatives, any of which may match.

use semver::{Version, VersionReq};

/// A parsed npm range: matches if any alternative matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmRange {
    alternatives: Vec<VersionReq>,
}

impl NpmRange {
    /// Parse an npm range expression. Returns `None` if any part is invalid.
    pub fn parse(range: &str) -> Option<Self> {
        let alternatives = range
            .split("||")
            .map(|alt| parse_alternative(alt.trim()))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// Parse a concrete version, tolerating npm's leading `v` or `=`
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

fn parse_alternative(alt: &str) -> Option<VersionReq> {
    if alt.is_empty() || matches!(alt, "*" | "x" | "X") {
        return Some(VersionReq::STAR);
    }

    if let Some((low, high)) = alt.split_once(" - ") {
        let low = strip_v(low.trim());
        let high = strip_v(high.trim());
        return VersionReq::parse(&format!(">={}, <={}", low, high)).ok();
    }

    let comparators = join_operators(alt.split_whitespace())
        .into_iter()
        .map(|token| translate_comparator(&token))
        .collect::<Vec<_>>();
    VersionReq::parse(&comparators.join(", ")).ok()
}

/// Re-attach operators written apart from their version (`>= 1.0`)
fn join_operators<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut joined: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in tokens {
        if token.chars().all(is_operator_char) {
            pending_op.push_str(token);
        } else {
            joined.push(format!("{}{}", pending_op, token));
            pending_op.clear();
        }
    }
    joined
}

fn translate_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !is_operator_char(c))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);

    if !op.is_empty() {
        return format!("{}{}", op, version);
    }
    if version.contains(['x', 'X', '*']) {
        return version.to_string();
    }
    if Version::parse(version).is_ok() {
        // npm: a bare full version is exact
        format!("={}", version)
    } else {
        // npm: a bare partial is an x-range (1.2 == 1.2.x)
        format!("~{}", version)
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
