//! Analysis result types attached to each conferenced file

use serde::{Deserialize, Serialize};

/// Overall or per-check verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Ok,
    Alert,
    Error,
}

impl Verdict {
    /// Map the loose vocabulary the AI service uses onto a verdict
    pub fn from_alias(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ok" | "approved" | "compliant" | "success" => Some(Self::Ok),
            "alert" | "warning" | "attention" => Some(Self::Alert),
            "error" | "critical" | "rejected" | "failed" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Ok => write!(f, "ok"),
            Verdict::Alert => write!(f, "alert"),
            Verdict::Error => write!(f, "error"),
        }
    }
}

/// Severity class of a single finding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Check passed
    Ok,
    /// Informational remark
    Observation,
    /// Needs human attention
    Alert,
    /// Blocks the document
    CriticalError,
}

impl FindingKind {
    /// Lenient mapping; anything unrecognised is an observation
    pub fn from_alias(value: &str) -> Self {
        match value.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "ok" | "conforming" | "pass" => Self::Ok,
            "alert" | "warning" => Self::Alert,
            "critical_error" | "critical" | "error" => Self::CriticalError,
            _ => Self::Observation,
        }
    }

    /// Verdict implied by this kind, used when a finding carries no status
    pub fn implied_verdict(&self) -> Verdict {
        match self {
            FindingKind::Ok | FindingKind::Observation => Verdict::Ok,
            FindingKind::Alert => Verdict::Alert,
            FindingKind::CriticalError => Verdict::Error,
        }
    }
}

/// Aggregate view over all findings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub status: Verdict,
    pub critical_error_count: u32,
    pub observation_count: u32,
    pub alert_count: u32,
    pub conclusion: String,
}

/// One checked aspect of the document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    /// Document field that was checked (e.g. "incoterm")
    pub field: String,
    pub status: Verdict,
    pub kind: FindingKind,
    /// Value as read from the document
    pub extracted_value: String,
    pub description: String,
}

impl Finding {
    pub fn new(
        field: impl Into<String>,
        kind: FindingKind,
        extracted_value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            status: kind.implied_verdict(),
            kind,
            extracted_value: extracted_value.into(),
            description: description.into(),
        }
    }
}

/// Row of a tabular document (invoice items, packing list lines)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value: Option<String>,
}

/// Validated analysis of one file
///
/// Constructed only through [`AnalysisResult::from_findings`] and the
/// canonical failure constructors, so a summary with status `error` always
/// has at least one critical finding behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub summary: Summary,
    pub items: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
}

impl AnalysisResult {
    /// Build a result from the reported status and findings.
    ///
    /// Counts are taken from `counts` when given, otherwise computed from
    /// the findings. An `error` status without any critical finding gets a
    /// synthetic one so the summary never contradicts its items.
    pub fn from_findings(
        status: Verdict,
        conclusion: impl Into<String>,
        mut items: Vec<Finding>,
        counts: Option<(u32, u32, u32)>,
        line_items: Option<Vec<LineItem>>,
    ) -> Self {
        if status == Verdict::Error && !items.iter().any(|i| i.kind == FindingKind::CriticalError) {
            items.push(Finding::new(
                "summary",
                FindingKind::CriticalError,
                "",
                "Analysis reported an error without a critical finding",
            ));
        }

        let (critical, observation_count, alert_count) =
            counts.unwrap_or_else(|| count_kinds(&items));
        let critical_error_count = if status == Verdict::Error {
            critical.max(1)
        } else {
            critical
        };

        Self {
            summary: Summary {
                status,
                critical_error_count,
                observation_count,
                alert_count,
                conclusion: conclusion.into(),
            },
            items,
            line_items,
        }
    }

    /// Canonical error result: one critical finding on `field`
    pub fn failure(field: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self::from_findings(
            Verdict::Error,
            description.clone(),
            vec![Finding::new(field, FindingKind::CriticalError, "", description)],
            None,
            None,
        )
    }

    /// Result used when the AI service refused the document on safety grounds
    pub fn filtered(description: impl Into<String>) -> Self {
        let description = description.into();
        Self::from_findings(
            Verdict::Alert,
            "Document was blocked by the AI service content filter; manual review required",
            vec![Finding::new(
                "content_filter",
                FindingKind::Alert,
                "",
                description,
            )],
            None,
            None,
        )
    }

    pub fn is_error(&self) -> bool {
        self.summary.status == Verdict::Error
    }
}

fn count_kinds(items: &[Finding]) -> (u32, u32, u32) {
    items.iter().fold((0, 0, 0), |(c, o, a), item| match item.kind {
        FindingKind::CriticalError => (c + 1, o, a),
        FindingKind::Observation => (c, o + 1, a),
        FindingKind::Alert => (c, o, a + 1),
        FindingKind::Ok => (c, o, a),
    })
}
