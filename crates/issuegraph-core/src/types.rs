use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Blocked,
    Closed,
}

impl Status {
    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Closed)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Open
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "closed" => Ok(Status::Closed),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Feature,
    Task,
    Epic,
    Chore,
}

impl Default for IssueType {
    fn default() -> Self {
        IssueType::Task
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Task => "task",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bug" => Ok(IssueType::Bug),
            "feature" => Ok(IssueType::Feature),
            "task" => Ok(IssueType::Task),
            "epic" => Ok(IssueType::Epic),
            "chore" => Ok(IssueType::Chore),
            other => Err(format!("unknown issue type: {}", other)),
        }
    }
}

/// Edge typing for issue dependencies.
///
/// `Legacy` models records written before dependency typing existed; the
/// serialized form is the empty string and it behaves exactly like `Blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Blocks,
    Related,
    ParentChild,
    DiscoveredFrom,
    #[serde(rename = "")]
    Legacy,
}

impl DependencyType {
    /// Only blocking edges constrain actionability.
    pub fn is_blocking(&self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::Legacy)
    }
}

impl Default for DependencyType {
    fn default() -> Self {
        DependencyType::Blocks
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyType::Blocks => "blocks",
            DependencyType::Related => "related",
            DependencyType::ParentChild => "parent_child",
            DependencyType::DiscoveredFrom => "discovered_from",
            DependencyType::Legacy => "",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocks" => Ok(DependencyType::Blocks),
            "related" => Ok(DependencyType::Related),
            "parent_child" | "parent-child" => Ok(DependencyType::ParentChild),
            "discovered_from" | "discovered-from" => Ok(DependencyType::DiscoveredFrom),
            "" => Ok(DependencyType::Legacy),
            other => Err(format!("unknown dependency type: {}", other)),
        }
    }
}

/// Directed dependency edge, attached to the dependent issue.
///
/// `issue_id` depends on `depends_on_id`; in graph terms the edge runs
/// `depends_on_id -> issue_id` (blocker to dependent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type", default)]
    pub dep_type: DependencyType,
}

impl Dependency {
    pub fn new(
        issue_id: impl Into<String>,
        depends_on_id: impl Into<String>,
        dep_type: DependencyType,
    ) -> Self {
        Self {
            issue_id: issue_id.into(),
            depends_on_id: depends_on_id.into(),
            dep_type,
        }
    }
}

/// An issue record as ingested by the analyzer.
///
/// Constructed by external code and passed in by value; the analytics core
/// never mutates issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub design: String,
    #[serde(default)]
    pub acceptance_criteria: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub source_repo: String,
    #[serde(default)]
    pub external_ref: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Issue {
    /// Create an open task with the given id and title, timestamped now.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            notes: String::new(),
            design: String::new(),
            acceptance_criteria: String::new(),
            assignee: String::new(),
            source_repo: String::new(),
            external_ref: None,
            status: Status::Open,
            issue_type: IssueType::Task,
            priority: 2,
            estimated_minutes: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            labels: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        if status == Status::Closed && self.closed_at.is_none() {
            self.closed_at = Some(self.updated_at);
        }
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Record that this issue depends on `blocker`.
    pub fn with_dependency(mut self, blocker: impl Into<String>, dep_type: DependencyType) -> Self {
        let dep = Dependency::new(self.id.clone(), blocker, dep_type);
        self.dependencies.push(dep);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Dependencies whose type constrains actionability.
    pub fn blocking_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.dep_type.is_blocking())
    }
}
