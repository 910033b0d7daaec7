// Idea lifecycle - the two-axis review workflow as pure functions
//
// Teacher axis:   new -> under-review -> {forwarded | approved | rejected}
//                 new -> {forwarded | approved | rejected}
// Principal axis: only while forwarded; {unset | pending} -> {approved | rejected | in-progress}
//
// approved/rejected are terminal on both axes. in-progress and implemented have no way out.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::UserId;
use crate::error::AppError;
use crate::models::{Idea, IdeaStatus, PrincipalDecision, PrincipalStatus, Priority, TeacherReview};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TeacherAction {
    StartReview,
    Forward { notes: String },
    Approve { notes: String },
    Reject { notes: String },
}

impl TeacherAction {
    pub fn name(&self) -> &'static str {
        match self {
            TeacherAction::StartReview => "start review",
            TeacherAction::Forward { .. } => "forward",
            TeacherAction::Approve { .. } => "approve",
            TeacherAction::Reject { .. } => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum PrincipalAction {
    Approve {
        notes: String,
        budget: Option<f64>,
        priority: Option<Priority>,
        implementation_date: Option<NaiveDate>,
    },
    Reject {
        notes: String,
    },
    RequestInfo {
        notes: String,
    },
}

impl PrincipalAction {
    pub fn name(&self) -> &'static str {
        match self {
            PrincipalAction::Approve { .. } => "approve",
            PrincipalAction::Reject { .. } => "reject",
            PrincipalAction::RequestInfo { .. } => "request more info",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionError {
    MissingNotes { action: &'static str },
    MissingField { action: &'static str, field: &'static str },
    InvalidBudget(f64),
    NotAllowed { action: &'static str, from: String },
    PrincipalAxisInactive { status: IdeaStatus },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::MissingNotes { action } => {
                write!(f, "notes are required to {}", action)
            }
            TransitionError::MissingField { action, field } => {
                write!(f, "{} is required to {}", field, action)
            }
            TransitionError::InvalidBudget(budget) => {
                write!(f, "budget must be a non-negative number, got {}", budget)
            }
            TransitionError::NotAllowed { action, from } => {
                write!(f, "cannot {} an idea that is {}", action, from)
            }
            TransitionError::PrincipalAxisInactive { status } => {
                write!(f, "principal review needs a forwarded idea, this one is {}", status)
            }
        }
    }
}

impl std::error::Error for TransitionError {}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::MissingNotes { .. }
            | TransitionError::MissingField { .. }
            | TransitionError::InvalidBudget(_) => AppError::Validation(err.to_string()),
            TransitionError::NotAllowed { .. } | TransitionError::PrincipalAxisInactive { .. } => {
                AppError::InvalidTransition(err.to_string())
            }
        }
    }
}

fn required_notes(notes: &str, action: &'static str) -> Result<String, TransitionError> {
    let trimmed = notes.trim();
    if trimmed.is_empty() {
        return Err(TransitionError::MissingNotes { action });
    }
    Ok(trimmed.to_string())
}

fn required<T>(value: Option<T>, action: &'static str, field: &'static str) -> Result<T, TransitionError> {
    value.ok_or(TransitionError::MissingField { action, field })
}

/// Fields a teacher-axis action writes. The caller persists them only while the stored
/// status still equals `idea.status`.
pub fn plan_teacher_transition(
    idea: &Idea,
    action: &TeacherAction,
    reviewer: UserId,
    now: DateTime<Utc>,
) -> Result<TeacherReview, TransitionError> {
    let allowed = match action {
        TeacherAction::StartReview => idea.status == IdeaStatus::New,
        _ => matches!(idea.status, IdeaStatus::New | IdeaStatus::UnderReview),
    };
    if !allowed {
        return Err(TransitionError::NotAllowed {
            action: action.name(),
            from: idea.status.to_string(),
        });
    }

    let mut review = TeacherReview {
        status: IdeaStatus::UnderReview,
        teacher_notes: None,
        reviewed_by: reviewer,
        forwarded_date: None,
        principal_status: None,
        updated_at: now,
    };

    match action {
        TeacherAction::StartReview => {}
        TeacherAction::Forward { notes } => {
            review.status = IdeaStatus::Forwarded;
            review.teacher_notes = Some(required_notes(notes, action.name())?);
            review.forwarded_date = Some(now);
            review.principal_status = Some(PrincipalStatus::Pending);
        }
        TeacherAction::Approve { notes } => {
            review.status = IdeaStatus::Approved;
            review.teacher_notes = Some(required_notes(notes, action.name())?);
        }
        TeacherAction::Reject { notes } => {
            review.status = IdeaStatus::Rejected;
            review.teacher_notes = Some(required_notes(notes, action.name())?);
        }
    }

    Ok(review)
}

/// Fields a principal-axis action writes. Only a forwarded idea whose principal status is
/// unset or pending accepts a decision.
pub fn plan_principal_transition(
    idea: &Idea,
    action: &PrincipalAction,
    now: DateTime<Utc>,
) -> Result<PrincipalDecision, TransitionError> {
    if !idea.principal_axis_active() {
        return Err(TransitionError::PrincipalAxisInactive {
            status: idea.status,
        });
    }
    if let Some(current) = idea.principal_status {
        if current != PrincipalStatus::Pending {
            return Err(TransitionError::NotAllowed {
                action: action.name(),
                from: current.to_string(),
            });
        }
    }

    let name = action.name();
    let decision = match action {
        PrincipalAction::Approve {
            notes,
            budget,
            priority,
            implementation_date,
        } => {
            let notes = required_notes(notes, name)?;
            let budget = required(*budget, name, "budget")?;
            if !budget.is_finite() || budget < 0.0 {
                return Err(TransitionError::InvalidBudget(budget));
            }
            PrincipalDecision {
                principal_status: PrincipalStatus::Approved,
                principal_notes: notes,
                budget: Some(budget),
                priority: Some(required(*priority, name, "priority")?),
                implementation_date: Some(required(
                    *implementation_date,
                    name,
                    "implementation date",
                )?),
                updated_at: now,
            }
        }
        PrincipalAction::Reject { notes } => PrincipalDecision {
            principal_status: PrincipalStatus::Rejected,
            principal_notes: required_notes(notes, name)?,
            budget: None,
            priority: None,
            implementation_date: None,
            updated_at: now,
        },
        PrincipalAction::RequestInfo { notes } => PrincipalDecision {
            principal_status: PrincipalStatus::InProgress,
            principal_notes: required_notes(notes, name)?,
            budget: None,
            priority: None,
            implementation_date: None,
            updated_at: now,
        },
    };

    Ok(decision)
}
