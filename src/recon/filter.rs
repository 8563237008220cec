//! Deduplication and scope filtering of the raw discovery corpus.

use std::collections::HashSet;
use std::io;

use crate::model::Target;
use crate::recon::artifacts::read_lines;

/// Strategy deciding whether a discovered URL is in bounds.
///
/// The predicate is pluggable rather than fixed logic: single-domain runs
/// use substring containment of the target, file runs use containment of
/// any listed domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePolicy {
    /// Every URL passes.
    All,
    /// URL must contain the target domain.
    Domain(String),
    /// URL must contain at least one of the listed domains.
    AnyOf(Vec<String>),
}

impl ScopePolicy {
    /// Builds the policy for a pipeline target.
    ///
    /// The domain list for file runs is loaded here exactly once and
    /// reused for every URL tested against the policy.
    pub fn for_target(target: &Target) -> io::Result<Self> {
        match target {
            Target::Domain(domain) => Ok(ScopePolicy::Domain(domain.clone())),
            Target::DomainFile(path) => {
                let domains = read_lines(path)?
                    .into_iter()
                    .map(|domain| domain.trim().to_string())
                    .filter(|domain| !domain.is_empty())
                    .collect();
                Ok(ScopePolicy::AnyOf(domains))
            }
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            ScopePolicy::All => true,
            ScopePolicy::Domain(domain) => url.contains(domain.as_str()),
            ScopePolicy::AnyOf(domains) => {
                domains.iter().any(|domain| url.contains(domain.as_str()))
            }
        }
    }
}

/// Collapses raw discovery output into distinct, in-scope URLs.
///
/// Blank and whitespace-only lines are dropped; duplicates collapse by
/// exact string identity. URLs differing only by trailing slash, query
/// parameter order or fragment remain distinct; this is current behavior,
/// not a design guarantee.
///
/// Pure function: no I/O, deterministic output set, enumeration order
/// unspecified.
pub fn dedupe_and_scope(
    lines: impl IntoIterator<Item = String>,
    scope: &ScopePolicy,
) -> Vec<String> {
    let unique: HashSet<String> = lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect();
    unique.into_iter().filter(|url| scope.matches(url)).collect()
}
