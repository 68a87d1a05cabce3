use issuegraph_core::{Issue, Status};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;

/// A blocked issue together with its open blockers, for triage listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedIssue {
    pub id: String,
    pub open_blockers: Vec<String>,
}

/// Known, deduplicated blocking dependencies of each issue.
///
/// Unknown `depends_on_id`s never block and are dropped here; duplicate
/// edges collapse.
fn known_blockers<'a>(
    issues: &'a [Issue],
    index: &FxHashMap<&'a str, &'a Issue>,
) -> FxHashMap<&'a str, Vec<&'a str>> {
    let mut map: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for issue in issues {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut blockers = Vec::new();
        for dep in issue.blocking_dependencies() {
            let id = dep.depends_on_id.as_str();
            if index.contains_key(id) && seen.insert(id) {
                blockers.push(id);
            }
        }
        map.insert(issue.id.as_str(), blockers);
    }
    map
}

fn issue_index(issues: &[Issue]) -> FxHashMap<&str, &Issue> {
    issues.iter().map(|i| (i.id.as_str(), i)).collect()
}

/// For every non-closed issue B, the sorted IDs of issues that would become
/// actionable if B closed: dependents whose only remaining open blocker
/// is B.
///
/// Single pass over issues and edges; repeated calls return identical maps.
pub fn compute_unblocks(issues: &[Issue]) -> HashMap<String, Vec<String>> {
    let index = issue_index(issues);
    let blockers_of = known_blockers(issues, &index);

    let mut unblocks: HashMap<String, Vec<String>> = issues
        .iter()
        .filter(|i| !i.is_closed())
        .map(|i| (i.id.clone(), Vec::new()))
        .collect();

    for issue in issues.iter().filter(|i| !i.is_closed()) {
        let blockers = &blockers_of[issue.id.as_str()];
        let mut open = blockers
            .iter()
            .filter(|&&b| index[b].status != Status::Closed);
        let (first, second) = (open.next(), open.next());
        if let (Some(&only), None) = (first, second) {
            if only != issue.id {
                if let Some(list) = unblocks.get_mut(only) {
                    list.push(issue.id.clone());
                }
            }
        }
    }

    for list in unblocks.values_mut() {
        list.sort();
    }
    unblocks
}

/// Non-closed issues whose every known blocking dependency is closed,
/// sorted by ID.
pub fn actionable_issues(issues: &[Issue]) -> Vec<String> {
    let index = issue_index(issues);
    let blockers_of = known_blockers(issues, &index);

    let mut actionable: Vec<String> = issues
        .iter()
        .filter(|i| !i.is_closed())
        .filter(|i| {
            blockers_of[i.id.as_str()]
                .iter()
                .all(|&b| index[b].status == Status::Closed)
        })
        .map(|i| i.id.clone())
        .collect();
    actionable.sort();
    actionable
}

/// Sorted non-closed known blockers of `id`; empty when the issue is
/// unknown.
pub fn open_blockers(issues: &[Issue], id: &str) -> Vec<String> {
    let index = issue_index(issues);
    let Some(issue) = index.get(id) else {
        return Vec::new();
    };

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut open: Vec<String> = issue
        .blocking_dependencies()
        .filter_map(|dep| {
            let blocker = index.get(dep.depends_on_id.as_str())?;
            (blocker.status != Status::Closed && seen.insert(blocker.id.as_str()))
                .then(|| blocker.id.clone())
        })
        .collect();
    open.sort();
    open
}

/// Non-closed issues with at least one open blocker, annotated with those
/// blockers and sorted by blocker count descending, ID ascending.
pub fn blocked_issues(issues: &[Issue]) -> Vec<BlockedIssue> {
    let index = issue_index(issues);
    let blockers_of = known_blockers(issues, &index);

    let mut blocked: Vec<BlockedIssue> = issues
        .iter()
        .filter(|i| !i.is_closed())
        .filter_map(|issue| {
            let mut open: Vec<String> = blockers_of[issue.id.as_str()]
                .iter()
                .filter(|&&b| index[b].status != Status::Closed)
                .map(|&b| b.to_string())
                .collect();
            if open.is_empty() {
                return None;
            }
            open.sort();
            Some(BlockedIssue {
                id: issue.id.clone(),
                open_blockers: open,
            })
        })
        .collect();
    blocked.sort_by(|a, b| {
        b.open_blockers
            .len()
            .cmp(&a.open_blockers.len())
            .then_with(|| a.id.cmp(&b.id))
    });
    blocked
}
