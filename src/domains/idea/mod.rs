pub mod lifecycle;
pub mod service;

pub use lifecycle::{
    plan_principal_transition, plan_teacher_transition, PrincipalAction, TeacherAction,
    TransitionError,
};
pub use service::{IdeaFilter, IdeaService, IdeaStats, IdeaView, NewIdea};
