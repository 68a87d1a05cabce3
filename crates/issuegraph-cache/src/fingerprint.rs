use chrono::{DateTime, SecondsFormat, Utc};
use issuegraph_core::{AnalysisConfig, Issue};
use sha2::{Digest, Sha256};

const FIELD_SEPARATOR: u8 = 0x00;
const ISSUE_SEPARATOR: u8 = 0x01;

/// Config-hash stand-in when no configuration accompanies the snapshot.
pub const DYNAMIC_CONFIG: &str = "dynamic";

/// Content address of an issue snapshot plus configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub data_hash: String,
    pub config_hash: String,
    /// `data_hash|config_hash`, the cache key.
    pub key: String,
}

fn push_field(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.push(FIELD_SEPARATOR);
}

/// RFC3339 with exactly nine fractional digits and a `Z` suffix, the
/// canonical timestamp form of the byte stream.
fn canonical_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Canonical byte serialization of the issue set: issues sorted by ID, each
/// field NUL-terminated, labels and dependencies sorted and deduplicated,
/// one 0x01 byte closing each issue. Insertion order never leaks into the
/// stream.
pub fn canonical_bytes(issues: &[Issue]) -> Vec<u8> {
    let mut sorted: Vec<&Issue> = issues.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut buf = Vec::new();
    for issue in sorted {
        push_field(&mut buf, &issue.id);
        push_field(&mut buf, &issue.title);
        push_field(&mut buf, &issue.description);
        push_field(&mut buf, &issue.notes);
        push_field(&mut buf, &issue.design);
        push_field(&mut buf, &issue.acceptance_criteria);
        push_field(&mut buf, &issue.assignee);
        push_field(&mut buf, &issue.source_repo);
        push_field(&mut buf, issue.external_ref.as_deref().unwrap_or(""));
        push_field(&mut buf, &issue.status.to_string());
        push_field(&mut buf, &issue.issue_type.to_string());
        push_field(&mut buf, &issue.priority.to_string());
        let estimate = issue
            .estimated_minutes
            .map(|m| m.to_string())
            .unwrap_or_default();
        push_field(&mut buf, &estimate);
        push_field(&mut buf, &canonical_time(issue.created_at));
        push_field(&mut buf, &canonical_time(issue.updated_at));
        let closed = issue.closed_at.map(canonical_time).unwrap_or_default();
        push_field(&mut buf, &closed);

        let mut labels: Vec<&str> = issue.labels.iter().map(String::as_str).collect();
        labels.sort_unstable();
        labels.dedup();
        for label in labels {
            push_field(&mut buf, label);
        }

        let mut deps: Vec<String> = issue
            .dependencies
            .iter()
            .map(|d| format!("{}:{}", d.depends_on_id, d.dep_type))
            .collect();
        deps.sort_unstable();
        deps.dedup();
        for dep in deps {
            push_field(&mut buf, &dep);
        }

        buf.push(ISSUE_SEPARATOR);
    }
    buf
}

/// First 16 hex characters of the SHA-256 of `bytes`.
fn short_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Order-independent hash of the issue snapshot.
pub fn data_hash(issues: &[Issue]) -> String {
    short_sha256(&canonical_bytes(issues))
}

/// Hash of the configuration, or the `dynamic` sentinel when absent.
pub fn config_hash(config: Option<&AnalysisConfig>) -> String {
    match config {
        Some(config) => short_sha256(config.canonical_string().as_bytes()),
        None => DYNAMIC_CONFIG.to_string(),
    }
}

/// Fingerprint a snapshot plus optional configuration.
pub fn fingerprint(issues: &[Issue], config: Option<&AnalysisConfig>) -> Fingerprint {
    let data_hash = data_hash(issues);
    let config_hash = config_hash(config);
    let key = format!("{data_hash}|{config_hash}");
    Fingerprint {
        data_hash,
        config_hash,
        key,
    }
}
