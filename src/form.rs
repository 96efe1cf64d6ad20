//! Form data model.
//!
//! [`FormData`] is used both for *renderer forms* (what a single frame reports)
//! and *browser forms* (the flattened view over all frames that belong to one
//! logical form). A renderer form names its iframes through [`ChildFrame`]
//! placeholders; the forest uses these placeholders to stitch the forms of
//! child frames into their parent form.

use crate::frame::{FieldGlobalId, FieldRendererId, FormGlobalId, FormRendererId, FrameToken};
use std::fmt::Display;
use url::{Origin, Url};

/// Axis-aligned rectangle in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// An iframe inside a renderer form.
///
/// `predecessor` is the index of the form field that precedes the iframe in
/// DOM order, or `None` if the iframe comes before all fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildFrame {
    pub token: FrameToken,
    pub predecessor: Option<usize>,
}

impl ChildFrame {
    pub fn new(token: FrameToken, predecessor: Option<usize>) -> Self {
        Self { token, predecessor }
    }
}

/// A single form control as reported by its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldData {
    /// Frame that hosts the control
    pub host_frame: FrameToken,
    /// Renderer-local id of the control
    pub renderer_id: FieldRendererId,
    /// Renderer-local id of the form that owns the control
    pub host_form_id: FormRendererId,
    pub name: String,
    pub label: String,
    pub value: String,
    /// Origin of the document the control lives in
    pub origin: Origin,
    pub form_control_type: String,
    pub is_focusable: bool,
}

impl FormFieldData {
    pub fn new(
        host_frame: FrameToken,
        host_form_id: FormRendererId,
        renderer_id: FieldRendererId,
        origin: Origin,
    ) -> Self {
        Self {
            host_frame,
            renderer_id,
            host_form_id,
            name: String::new(),
            label: String::new(),
            value: String::new(),
            origin,
            form_control_type: "text".to_string(),
            is_focusable: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn global_id(&self) -> FieldGlobalId {
        FieldGlobalId::new(self.host_frame, self.renderer_id)
    }

    /// The renderer form this field belongs to.
    pub fn renderer_form_id(&self) -> FormGlobalId {
        FormGlobalId::new(self.host_frame, self.host_form_id)
    }
}

/// A form, either as reported by one frame or as flattened by the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct FormData {
    /// Frame that hosts the form. For browser forms this is the frame of the root form.
    pub host_frame: FrameToken,
    pub renderer_id: FormRendererId,
    pub name: String,
    pub url: Option<Url>,
    /// Origin of the top-level document
    pub main_frame_origin: Origin,
    pub fields: Vec<FormFieldData>,
    /// Iframes of the form. On browser forms, the iframes of the root form.
    pub child_frames: Vec<ChildFrame>,
}

impl FormData {
    pub fn new(host_frame: FrameToken, renderer_id: FormRendererId, main_frame_origin: Origin) -> Self {
        Self {
            host_frame,
            renderer_id,
            name: String::new(),
            url: None,
            main_frame_origin,
            fields: Vec::new(),
            child_frames: Vec::new(),
        }
    }

    /// A form without fields, used when a lookup finds nothing.
    pub(crate) fn empty(id: FormGlobalId) -> Self {
        Self::new(id.frame_token, id.renderer_id, Origin::new_opaque())
    }

    pub fn global_id(&self) -> FormGlobalId {
        FormGlobalId::new(self.host_frame, self.renderer_id)
    }

    pub fn field_ids(&self) -> Vec<FieldGlobalId> {
        self.fields.iter().map(FormFieldData::global_id).collect()
    }

    pub fn find_field(&self, id: FieldGlobalId) -> Option<&FormFieldData> {
        self.fields.iter().find(|f| f.global_id() == id)
    }

    /// Copies everything but the fields.
    pub(crate) fn clone_without_fields(&self) -> Self {
        Self {
            host_frame: self.host_frame,
            renderer_id: self.renderer_id,
            name: self.name.clone(),
            url: self.url.clone(),
            main_frame_origin: self.main_frame_origin.clone(),
            fields: Vec::new(),
            child_frames: self.child_frames.clone(),
        }
    }
}

/// Field types the browser may predict for a field. Only the distinction
/// between sensitive and non-sensitive types matters for routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FieldType {
    #[default]
    Unknown,
    NameFull,
    EmailAddress,
    PhoneNumber,
    AddressLine1,
    AddressCity,
    AddressZip,
    CreditCardName,
    CreditCardNumber,
    CreditCardExpiry,
    CreditCardVerificationCode,
    Password,
}

impl FieldType {
    /// Sensitive fields are only filled into same-origin frames.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, FieldType::CreditCardNumber | FieldType::CreditCardVerificationCode)
    }
}

/// Prediction for a single field, sent to the renderer for debugging UI and
/// password generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPrediction {
    pub signature: u64,
    pub heuristic_type: FieldType,
    pub server_type: FieldType,
    pub overall_type: FieldType,
}

/// A form together with one prediction per field (same order as `data.fields`).
#[derive(Debug, Clone, PartialEq)]
pub struct FormDataPredictions {
    pub data: FormData,
    pub signature: u64,
    pub fields: Vec<FieldPrediction>,
}

/// Why the renderer believes a form was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionSource {
    None,
    SameDocumentNavigation,
    XhrSucceeded,
    FrameDetached,
    ProbablyFormSubmitted,
    FormSubmission,
    DomMutationAfterAutofill,
}

/// Whether a fill writes values or only shows them as a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPersistence {
    Fill,
    Preview,
}

impl Display for ActionPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionPersistence::Fill => write!(f, "Fill"),
            ActionPersistence::Preview => write!(f, "Preview"),
        }
    }
}

/// What made the renderer ask for suggestions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuggestionTriggerSource {
    #[default]
    Unspecified,
    FormControlElementClicked,
    TextFieldDidChange,
    TextFieldDidReceiveKeyDown,
    ContentEditableClicked,
    ManualFallback,
}

/// Suggestion availability announced to accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillState {
    NoSuggestions,
    AutofillAvailable,
    AutocompleteAvailable,
}
