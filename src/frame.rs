//! Frame and form identities.
//!
//! Every frame (main frame or iframe) is named by a [`FrameToken`]. Forms and
//! fields are only unique within their frame, so the browser addresses them
//! through [`FormGlobalId`] and [`FieldGlobalId`], which pair the frame token
//! with the renderer-local id.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// A unique identifier for a frame, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameToken(Uuid);

impl FrameToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FrameToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FrameToken {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for FrameToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Renderer-local id of a form. The null id (0) names the synthetic form that
/// collects the fields not owned by any `<form>` element.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormRendererId(pub u64);

/// Renderer-local id of a form control.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldRendererId(pub u64);

/// Browser-wide id of a form: the frame plus the renderer-local id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormGlobalId {
    pub frame_token: FrameToken,
    pub renderer_id: FormRendererId,
}

impl FormGlobalId {
    pub fn new(frame_token: FrameToken, renderer_id: FormRendererId) -> Self {
        Self { frame_token, renderer_id }
    }
}

impl Display for FormGlobalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "form({}:{})", self.frame_token, self.renderer_id.0)
    }
}

/// Browser-wide id of a field: the frame plus the renderer-local id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldGlobalId {
    pub frame_token: FrameToken,
    pub renderer_id: FieldRendererId,
}

impl FieldGlobalId {
    pub fn new(frame_token: FrameToken, renderer_id: FieldRendererId) -> Self {
        Self { frame_token, renderer_id }
    }
}

impl Display for FieldGlobalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field({}:{})", self.frame_token, self.renderer_id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn frame_tokens_are_unique() {
        let a = FrameToken::new();
        let b = FrameToken::new();
        assert_ne!(a, b);
    }

    #[test]
    fn global_ids_differ_across_frames() {
        let a = FrameToken::new();
        let b = FrameToken::new();

        let in_a = FieldGlobalId::new(a, FieldRendererId(1));
        let in_b = FieldGlobalId::new(b, FieldRendererId(1));
        assert_ne!(in_a, in_b);

        let mut set = HashSet::new();
        set.insert(FormGlobalId::new(a, FormRendererId(3)));
        set.insert(FormGlobalId::new(a, FormRendererId(3)));
        set.insert(FormGlobalId::new(b, FormRendererId(3)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display_includes_frame_and_id() {
        let token = FrameToken::from(Uuid::nil());
        let id = FormGlobalId::new(token, FormRendererId(12));
        assert_eq!(id.to_string(), "form(00000000-0000-0000-0000-000000000000:12)");
    }

    #[test]
    fn global_id_serializes_with_frame_token() {
        let token = FrameToken::new();
        let id = FieldGlobalId::new(token, FieldRendererId(5));
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.contains(&token.to_string()));

        let back: FieldGlobalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
