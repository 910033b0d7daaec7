use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;
use crate::core::{IdeaId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Academic,
    Facilities,
    Technology,
    Events,
    Sports,
    Clubs,
    FoodService,
    Transportation,
    Environment,
    Other,
}

string_enum!(Category {
    Academic => "Academic",
    Facilities => "Facilities",
    Technology => "Technology",
    Events => "Events",
    Sports => "Sports",
    Clubs => "Clubs",
    FoodService => "Food Service",
    Transportation => "Transportation",
    Environment => "Environment",
    Other => "Other",
});

/// Teacher-owned axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdeaStatus {
    New,
    UnderReview,
    Forwarded,
    Approved,
    Rejected,
}

string_enum!(IdeaStatus {
    New => "new",
    UnderReview => "under-review",
    Forwarded => "forwarded",
    Approved => "approved",
    Rejected => "rejected",
});

impl IdeaStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IdeaStatus::Approved | IdeaStatus::Rejected)
    }
}

/// Principal-owned axis, live only while the idea is forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
    Implemented,
}

string_enum!(PrincipalStatus {
    Pending => "pending",
    InProgress => "in-progress",
    Approved => "approved",
    Rejected => "rejected",
    Implemented => "implemented",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

string_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// One flat record for every workflow stage. Teacher and principal fields stay `None`
/// until the matching stage writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: IdeaId,
    pub title: String,
    pub description: String,
    pub author_id: UserId,
    pub category: Category,
    pub votes: i64,
    pub comment_count: i64,
    pub status: IdeaStatus,
    pub teacher_notes: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub forwarded_date: Option<DateTime<Utc>>,
    pub principal_status: Option<PrincipalStatus>,
    pub principal_notes: Option<String>,
    pub budget: Option<f64>,
    pub priority: Option<Priority>,
    pub implementation_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    pub fn new(
        author_id: UserId,
        title: String,
        description: String,
        category: Category,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: IdeaId::new(),
            title,
            description,
            author_id,
            category,
            votes: 0,
            comment_count: 0,
            status: IdeaStatus::New,
            teacher_notes: None,
            reviewed_by: None,
            forwarded_date: None,
            principal_status: None,
            principal_notes: None,
            budget: None,
            priority: None,
            implementation_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The principal axis only means something once a teacher forwarded the idea.
    pub fn principal_axis_active(&self) -> bool {
        self.status == IdeaStatus::Forwarded
    }
}

/// Fields written by a teacher-axis transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TeacherReview {
    pub status: IdeaStatus,
    /// `None` leaves the stored notes untouched
    pub teacher_notes: Option<String>,
    pub reviewed_by: UserId,
    pub forwarded_date: Option<DateTime<Utc>>,
    pub principal_status: Option<PrincipalStatus>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a principal-axis transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalDecision {
    pub principal_status: PrincipalStatus,
    pub principal_notes: String,
    pub budget: Option<f64>,
    pub priority: Option<Priority>,
    pub implementation_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}
