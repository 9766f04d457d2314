pub mod feedback;
pub mod hook;

pub use feedback::export_feedback;
pub use hook::{HookDecision, HookOutput};

use plannotator::annotation::Annotation;

/// Deny message used when there is no feedback to send.
pub const DEFAULT_DENY_MESSAGE: &str = "Plan changes requested.";

/// Outcome of a plan review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny { message: String },
}

/// Approval ignores annotations. A denial carries the exported feedback.
pub fn decide(approved: bool, annotations: &[Annotation], global_attachments: &[String]) -> Decision {
    if approved {
        tracing::info!(annotations = annotations.len(), "plan approved");
        return Decision::Approve;
    }

    let message = if annotations.is_empty() && global_attachments.is_empty() {
        DEFAULT_DENY_MESSAGE.to_string()
    } else {
        export_feedback(annotations, global_attachments)
    };
    tracing::info!(annotations = annotations.len(), "plan denied");
    Decision::Deny { message }
}
