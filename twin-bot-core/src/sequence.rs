//! Section sequencing: find the next free slot in each content section.
//!
//! Every contribution pull request adds exactly one file at
//! `<root>/<year>/<month>/<day>/<section>/<sequence>-<name>.md`, e.g.
//! `contents/2024/05/01/3-new-plugins/2-foo.md`. Scanning the changed file of each pull request
//! gives the highest sequence number taken so far per section.

use tracing::{debug, warn};

use crate::contract::PullRequestSummary;
use crate::error::SubmitError;

/// Number of content sections in a digest.
pub const SECTION_COUNT: usize = 7;

/// Highest sequence number observed per section, indexed by section number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionCounters([u32; SECTION_COUNT]);

impl SectionCounters {
    pub fn get(&self, section: usize) -> u32 {
        self.0.get(section).copied().unwrap_or(0)
    }

    /// Record an observation. Counters only ever grow.
    pub fn observe(&mut self, section: usize, sequence: u32) {
        if let Some(slot) = self.0.get_mut(section) {
            *slot = (*slot).max(sequence);
        }
    }

    /// Sequence number the next entry of `section` should use.
    pub fn next(&self, section: usize) -> Result<u32, SubmitError> {
        self.get(section).checked_add(1).ok_or_else(|| {
            SubmitError::shape(format!("section {section} has no sequence number left"))
        })
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

/// A validated content path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPath {
    /// The first four components, e.g. `contents/2024/05/01`.
    pub base: String,
    pub section: usize,
    /// 1 when the path has no numbered file component.
    pub sequence: u32,
}

impl ContentPath {
    /// Parse `path`, rejecting anything that does not follow the digest layout.
    pub fn parse(path: &str, root: &str) -> Result<Self, SubmitError> {
        let parts: Vec<&str> = path.split('/').collect();

        if parts.len() < 5 || parts.len() > 6 {
            return Err(SubmitError::shape(format!(
                "expected 5 or 6 path components, found {} in '{path}'",
                parts.len()
            )));
        }
        if parts[0] != root {
            return Err(SubmitError::shape(format!(
                "path '{path}' is not under '{root}/'"
            )));
        }
        if parts[1..4].iter().any(|p| p.is_empty()) {
            return Err(SubmitError::shape(format!("empty date component in '{path}'")));
        }

        let section = leading_number(parts[4])
            .filter(|(_, rest)| rest.starts_with('-'))
            .map(|(n, _)| n as usize)
            .ok_or_else(|| {
                SubmitError::shape(format!(
                    "section component '{}' of '{path}' is not '<number>-<name>'",
                    parts[4]
                ))
            })?;
        if section >= SECTION_COUNT {
            return Err(SubmitError::shape(format!(
                "section {section} in '{path}' is outside 0..{SECTION_COUNT}"
            )));
        }

        let sequence = parts
            .get(5)
            .and_then(|file| leading_number(file))
            .filter(|(_, rest)| rest.starts_with('-') || rest.starts_with('.'))
            .map(|(n, _)| n)
            .unwrap_or(1);

        Ok(ContentPath {
            base: parts[..4].join("/"),
            section,
            sequence,
        })
    }
}

/// Split a component into its leading decimal number and the remainder.
fn leading_number(component: &str) -> Option<(u32, &str)> {
    let digits = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    if digits == 0 {
        return None;
    }
    let number = component[..digits].parse().ok()?;
    Some((number, &component[digits..]))
}

/// The single changed file of a pull request, or `None` (with a warning) when there is not
/// exactly one.
pub fn single_changed_file(pull_request: &PullRequestSummary) -> Option<&str> {
    match pull_request.changed_file_paths.as_slice() {
        [only] => Some(only.as_str()),
        [] => {
            warn!(
                title = %pull_request.title,
                head = %pull_request.head_ref_name,
                "[SEQUENCE] Pull request changes no files, skipping"
            );
            None
        }
        many => {
            warn!(
                title = %pull_request.title,
                head = %pull_request.head_ref_name,
                files = many.len(),
                "[SEQUENCE] Pull request changes more than one file, skipping"
            );
            None
        }
    }
}

/// Highest taken sequence number per section across `pull_requests`.
pub fn compute_counters(
    pull_requests: &[PullRequestSummary],
    root: &str,
) -> Result<SectionCounters, SubmitError> {
    let mut counters = SectionCounters::default();
    for pull_request in pull_requests {
        let Some(path) = single_changed_file(pull_request) else {
            continue;
        };
        let parsed = ContentPath::parse(path, root)?;
        debug!(
            path,
            section = parsed.section,
            sequence = parsed.sequence,
            "[SEQUENCE] Observed entry"
        );
        counters.observe(parsed.section, parsed.sequence);
    }
    Ok(counters)
}

/// Base path (first four components) shared by this week's entries, taken from the first pull
/// request with exactly one changed file.
pub fn base_path(pull_requests: &[PullRequestSummary], root: &str) -> Result<String, SubmitError> {
    let path = pull_requests
        .iter()
        .find_map(|pr| match pr.changed_file_paths.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        })
        .ok_or_else(|| {
            SubmitError::shape("no pull request with a single changed file to derive the base path")
        })?;
    Ok(ContentPath::parse(path, root)?.base)
}
