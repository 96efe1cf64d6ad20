use crate::frame::{FormGlobalId, FrameToken};

/// Reasons why the forest refused to link a form into a tree. These never
/// reach callers of the router; they are logged and the link is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestError {
    #[error("linking {child} below {parent} would create a cycle")]
    Cycle { parent: FormGlobalId, child: FrameToken },

    #[error("frame {0} is its own child frame")]
    SelfReference(FrameToken),

    #[error("frame chain above {0} exceeds the maximum depth")]
    TooDeep(FrameToken),
}

/// Validation errors for [`RouterConfig`](crate::config::RouterConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterConfigError {
    #[error("max_frame_depth must be at least 1")]
    ZeroFrameDepth,

    #[error("relax_shared_autofill requires shared_autofill")]
    RelaxedWithoutSharedAutofill,
}
