use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use super::ids::{LogId, NotificationId, RequestId};

/// Fixed complaint categories accepted at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Waste Disposal")]
    WasteDisposal,
    #[serde(rename = "Broken Streetlights")]
    BrokenStreetlights,
    #[serde(rename = "Water Pipeline Disruptions")]
    WaterPipelineDisruptions,
    #[serde(rename = "Road Maintenance")]
    RoadMaintenance,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::WasteDisposal,
        Category::BrokenStreetlights,
        Category::WaterPipelineDisruptions,
        Category::RoadMaintenance,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::WasteDisposal => "Waste Disposal",
            Category::BrokenStreetlights => "Broken Streetlights",
            Category::WaterPipelineDisruptions => "Water Pipeline Disruptions",
            Category::RoadMaintenance => "Road Maintenance",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a service request. Resolved and Closed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::InProgress,
        RequestStatus::Resolved,
        RequestStatus::Closed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::InProgress => "In Progress",
            RequestStatus::Resolved => "Resolved",
            RequestStatus::Closed => "Closed",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.label() == label)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Resolved | RequestStatus::Closed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.label() == label)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Delivery channel for a notification. Only `Email` leaves the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Email,
    System,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::Email => "Email",
            NotificationKind::System => "System",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Email" => Some(NotificationKind::Email),
            "System" => Some(NotificationKind::System),
            _ => None,
        }
    }
}

/// Where the problem is. Persisted as a single display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub region: String,
    pub city: String,
    pub house_number: Option<String>,
}

impl Location {
    /// `"<region>, <city>"` with `", House: <n>"` appended when a house number is known.
    pub fn summary(&self) -> String {
        match self.house_number.as_deref().map(str::trim) {
            Some(house) if !house.is_empty() => {
                format!("{}, {}, House: {}", self.region, self.city, house)
            }
            _ => format!("{}, {}", self.region, self.city),
        }
    }
}

/// Metadata for an image that already passed the upload filter and was written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub content_type: String,
    pub size_bytes: u64,
    pub path: String,
}

/// Raw citizen submission, prior to validation. Missing fields arrive as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSubmission {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub region: String,
    pub city: String,
    pub house_number: Option<String>,
    pub user_id: String,
    #[serde(skip)]
    pub image: Option<ImageMetadata>,
}

/// Validated input to the ledger's create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServiceRequest {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Location,
    pub image_path: Option<String>,
    pub user_id: String,
    pub status: Option<RequestStatus>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub request_id: RequestId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: RequestStatus,
    pub priority: Priority,
    pub location: String,
    pub image_path: Option<String>,
    pub user_id: String,
    pub submission_date: DateTime<Utc>,
    pub resolution_date: Option<DateTime<Utc>>,
}

/// Identifying fields returned to the citizen after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub request_id: RequestId,
    pub title: String,
    pub category: Category,
    pub status: RequestStatus,
    pub submission_date: DateTime<Utc>,
}

impl From<&ServiceRequest> for SubmissionReceipt {
    fn from(record: &ServiceRequest) -> Self {
        Self {
            request_id: record.request_id.clone(),
            title: record.title.clone(),
            category: record.category,
            status: record.status,
            submission_date: record.submission_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citizen {
    pub user_id: String,
    pub email: String,
    pub total_requests_resolved: i64,
}

/// Immutable record of an action taken in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub log_id: LogId,
    pub user_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: NotificationId,
    pub recipient_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub sent_date: DateTime<Utc>,
    pub is_read: bool,
    pub request_id: Option<RequestId>,
}

/// A status write together with the status the row held immediately before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: RequestStatus,
    pub record: ServiceRequest,
}

impl StatusChange {
    /// True only for a move from an open status into Resolved or Closed.
    pub fn entered_terminal(&self) -> bool {
        !self.previous.is_terminal() && self.record.status.is_terminal()
    }
}
