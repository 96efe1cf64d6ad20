use super::FrameFormDriver;
use crate::form::{
    ActionPersistence, AutofillState, FormData, FormDataPredictions, FormFieldData, RectF, SubmissionSource,
    SuggestionTriggerSource,
};
use crate::frame::{FieldGlobalId, FieldRendererId, FormGlobalId, FrameToken};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Handler for key presses while an autofill popup is open. Returns `true`
/// when the key press was consumed.
pub type KeyPressHandler = Rc<dyn Fn(&str) -> bool>;

/// Messages produced by a [`ChannelFrameDriver`].
#[derive(Clone, Debug, PartialEq)]
pub enum DriverCommand {
    // ****************************************
    // ** Events for the frame's autofill manager
    FormsSeen { updated_forms: Vec<FormData>, removed_forms: Vec<FormGlobalId> },
    FormToBeProbablySubmitted { form: Option<FormData> },
    FormSubmitted { form: FormData, known_success: bool, source: SubmissionSource },
    TextFieldDidChange { form: FormData, field: FormFieldData, bounding_box: RectF, timestamp: Instant },
    TextFieldDidScroll { form: FormData, field: FormFieldData, bounding_box: RectF },
    SelectControlDidChange { form: FormData, field: FormFieldData, bounding_box: RectF },
    AskForValuesToFill {
        form: FormData,
        field: FormFieldData,
        bounding_box: RectF,
        trigger_source: SuggestionTriggerSource,
    },
    HidePopup,
    FocusNoLongerOnForm { had_interacted_form: bool },
    FocusOnFormField { form: FormData, field: FormFieldData, bounding_box: RectF },
    DidFillAutofillFormData { form: FormData, timestamp: Instant },
    DidPreviewAutofillFormData,
    DidEndTextFieldEditing,
    SelectFieldOptionsDidChange { form: FormData },
    JavaScriptChangedAutofilledValue { form: FormData, field: FormFieldData, old_value: String },
    ContextMenuShownInField { form_id: FormGlobalId, field_id: FieldGlobalId },

    // ****************************************
    // ** Messages for the renderer
    TriggerFormExtraction,
    FillOrPreviewForm { action_persistence: ActionPersistence, form: FormData },
    UndoAutofill { action_persistence: ActionPersistence, form: FormData },
    FieldTypePredictionsAvailable { predictions: Vec<FormDataPredictions> },
    FieldsEligibleForManualFilling { fields: Vec<FieldRendererId> },
    AcceptDataListSuggestion { field: FieldRendererId, value: String },
    ClearSection,
    ClearPreviewedForm,
    TriggerSuggestions { field: FieldRendererId, trigger_source: SuggestionTriggerSource },
    FillFieldWithValue { field: FieldRendererId, value: String },
    PreviewFieldWithValue { field: FieldRendererId, value: String },
    SetSuggestionAvailability { field: FieldRendererId, state: AutofillState },
}

/// A [`DriverCommand`] tagged with the frame whose driver emitted it.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameCommand {
    pub frame: FrameToken,
    pub command: DriverCommand,
}

/// Driver that turns every routed event into a [`FrameCommand`] on a channel.
/// Several drivers may share one sender.
pub struct ChannelFrameDriver {
    frame_token: FrameToken,
    parent: Option<Weak<ChannelFrameDriver>>,
    shared_autofill: bool,
    key_press_handler: RefCell<Option<KeyPressHandler>>,
    cmd_tx: UnboundedSender<FrameCommand>,
}

impl Debug for ChannelFrameDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFrameDriver")
            .field("frame_token", &self.frame_token)
            .field("shared_autofill", &self.shared_autofill)
            .finish_non_exhaustive()
    }
}

impl ChannelFrameDriver {
    pub fn new(
        frame_token: FrameToken,
        parent: Option<&Rc<ChannelFrameDriver>>,
        cmd_tx: UnboundedSender<FrameCommand>,
    ) -> Rc<Self> {
        Rc::new(Self {
            frame_token,
            parent: parent.map(Rc::downgrade),
            shared_autofill: false,
            key_press_handler: RefCell::new(None),
            cmd_tx,
        })
    }

    /// Like [`ChannelFrameDriver::new`], for a frame whose permission policy
    /// enables `shared-autofill`.
    pub fn with_shared_autofill(
        frame_token: FrameToken,
        parent: Option<&Rc<ChannelFrameDriver>>,
        cmd_tx: UnboundedSender<FrameCommand>,
    ) -> Rc<Self> {
        Rc::new(Self {
            frame_token,
            parent: parent.map(Rc::downgrade),
            shared_autofill: true,
            key_press_handler: RefCell::new(None),
            cmd_tx,
        })
    }

    fn send(&self, command: DriverCommand) {
        // send() fails only when the receiver is gone, i.e. the frame's
        // endpoint has shut down. Nothing is waiting for the message then.
        if self
            .cmd_tx
            .send(FrameCommand { frame: self.frame_token, command })
            .is_err()
        {
            log::trace!("frame {}: command receiver closed", self.frame_token);
        }
    }

    pub fn set_key_press_handler(&self, handler: &KeyPressHandler) {
        *self.key_press_handler.borrow_mut() = Some(handler.clone());
    }

    pub fn has_key_press_handler(&self) -> bool {
        self.key_press_handler.borrow().is_some()
    }

    /// Offers a key press to the installed handler, if any.
    pub fn handle_key_press(&self, key: &str) -> bool {
        let handler = self.key_press_handler.borrow().clone();
        handler.is_some_and(|h| h(key))
    }

    // Manager events

    pub fn forms_seen(&self, updated_forms: &[FormData], removed_forms: &[FormGlobalId]) {
        self.send(DriverCommand::FormsSeen {
            updated_forms: updated_forms.to_vec(),
            removed_forms: removed_forms.to_vec(),
        });
    }

    pub fn form_to_be_probably_submitted(&self, form: Option<&FormData>) {
        self.send(DriverCommand::FormToBeProbablySubmitted { form: form.cloned() });
    }

    pub fn form_submitted(&self, form: &FormData, known_success: bool, source: SubmissionSource) {
        self.send(DriverCommand::FormSubmitted { form: form.clone(), known_success, source });
    }

    pub fn text_field_did_change(&self, form: &FormData, field: &FormFieldData, bounding_box: RectF, timestamp: Instant) {
        self.send(DriverCommand::TextFieldDidChange {
            form: form.clone(),
            field: field.clone(),
            bounding_box,
            timestamp,
        });
    }

    pub fn text_field_did_scroll(&self, form: &FormData, field: &FormFieldData, bounding_box: RectF) {
        self.send(DriverCommand::TextFieldDidScroll { form: form.clone(), field: field.clone(), bounding_box });
    }

    pub fn select_control_did_change(&self, form: &FormData, field: &FormFieldData, bounding_box: RectF) {
        self.send(DriverCommand::SelectControlDidChange { form: form.clone(), field: field.clone(), bounding_box });
    }

    pub fn ask_for_values_to_fill(
        &self,
        form: &FormData,
        field: &FormFieldData,
        bounding_box: RectF,
        trigger_source: SuggestionTriggerSource,
    ) {
        self.send(DriverCommand::AskForValuesToFill {
            form: form.clone(),
            field: field.clone(),
            bounding_box,
            trigger_source,
        });
    }

    pub fn hide_popup(&self) {
        self.send(DriverCommand::HidePopup);
    }

    pub fn focus_on_form_field(&self, form: &FormData, field: &FormFieldData, bounding_box: RectF) {
        self.send(DriverCommand::FocusOnFormField { form: form.clone(), field: field.clone(), bounding_box });
    }

    pub fn did_fill_autofill_form_data(&self, form: &FormData, timestamp: Instant) {
        self.send(DriverCommand::DidFillAutofillFormData { form: form.clone(), timestamp });
    }

    pub fn did_preview_autofill_form_data(&self) {
        self.send(DriverCommand::DidPreviewAutofillFormData);
    }

    pub fn did_end_text_field_editing(&self) {
        self.send(DriverCommand::DidEndTextFieldEditing);
    }

    pub fn select_field_options_did_change(&self, form: &FormData) {
        self.send(DriverCommand::SelectFieldOptionsDidChange { form: form.clone() });
    }

    pub fn javascript_changed_autofilled_value(&self, form: &FormData, field: &FormFieldData, old_value: &str) {
        self.send(DriverCommand::JavaScriptChangedAutofilledValue {
            form: form.clone(),
            field: field.clone(),
            old_value: old_value.to_string(),
        });
    }

    pub fn context_menu_shown_in_field(&self, form_id: FormGlobalId, field_id: FieldGlobalId) {
        self.send(DriverCommand::ContextMenuShownInField { form_id, field_id });
    }

    // Renderer messages

    pub fn fill_or_preview_form(&self, action_persistence: ActionPersistence, form: &FormData) {
        self.send(DriverCommand::FillOrPreviewForm { action_persistence, form: form.clone() });
    }

    pub fn undo_autofill(&self, form: &FormData, action_persistence: ActionPersistence) {
        self.send(DriverCommand::UndoAutofill { action_persistence, form: form.clone() });
    }

    pub fn field_type_predictions_available(&self, predictions: &[FormDataPredictions]) {
        self.send(DriverCommand::FieldTypePredictionsAvailable { predictions: predictions.to_vec() });
    }

    pub fn fields_eligible_for_manual_filling(&self, fields: &[FieldRendererId]) {
        self.send(DriverCommand::FieldsEligibleForManualFilling { fields: fields.to_vec() });
    }

    pub fn accept_data_list_suggestion(&self, field: FieldRendererId, value: &str) {
        self.send(DriverCommand::AcceptDataListSuggestion { field, value: value.to_string() });
    }

    pub fn clear_section(&self) {
        self.send(DriverCommand::ClearSection);
    }

    pub fn clear_previewed_form(&self) {
        self.send(DriverCommand::ClearPreviewedForm);
    }

    pub fn trigger_suggestions(&self, field: FieldRendererId, trigger_source: SuggestionTriggerSource) {
        self.send(DriverCommand::TriggerSuggestions { field, trigger_source });
    }

    pub fn fill_field_with_value(&self, field: FieldRendererId, value: &str) {
        self.send(DriverCommand::FillFieldWithValue { field, value: value.to_string() });
    }

    pub fn preview_field_with_value(&self, field: FieldRendererId, value: &str) {
        self.send(DriverCommand::PreviewFieldWithValue { field, value: value.to_string() });
    }

    pub fn set_suggestion_availability(&self, field: FieldRendererId, state: AutofillState) {
        self.send(DriverCommand::SetSuggestionAvailability { field, state });
    }
}

impl FrameFormDriver for ChannelFrameDriver {
    fn frame_token(&self) -> FrameToken {
        self.frame_token
    }

    fn parent(&self) -> Option<Rc<Self>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn trigger_form_extraction(&self) {
        self.send(DriverCommand::TriggerFormExtraction);
    }

    fn unset_key_press_handler(&self) {
        self.key_press_handler.borrow_mut().take();
    }

    fn focus_no_longer_on_form(&self, had_interacted_form: bool) {
        self.send(DriverCommand::FocusNoLongerOnForm { had_interacted_form });
    }

    fn has_shared_autofill_permission(&self) -> bool {
        self.shared_autofill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn commands_are_tagged_with_the_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = FrameToken::new();
        let driver = ChannelFrameDriver::new(token, None, tx);

        driver.trigger_form_extraction();
        driver.clear_section();

        assert_eq!(
            rx.try_recv().unwrap(),
            FrameCommand { frame: token, command: DriverCommand::TriggerFormExtraction }
        );
        assert_eq!(rx.try_recv().unwrap().command, DriverCommand::ClearSection);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn parent_is_weak() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let main = ChannelFrameDriver::new(FrameToken::new(), None, tx.clone());
        let child = ChannelFrameDriver::new(FrameToken::new(), Some(&main), tx);

        assert_eq!(child.parent().unwrap().frame_token(), main.frame_token());
        assert!(main.parent().is_none());

        drop(main);
        assert!(child.parent().is_none());
    }

    #[test]
    fn key_press_handler_lifecycle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let driver = ChannelFrameDriver::new(FrameToken::new(), None, tx);
        assert!(!driver.handle_key_press("Enter"));

        let handler: KeyPressHandler = Rc::new(|key| key == "Enter");
        driver.set_key_press_handler(&handler);
        assert!(driver.has_key_press_handler());
        assert!(driver.handle_key_press("Enter"));
        assert!(!driver.handle_key_press("Tab"));

        driver.unset_key_press_handler();
        assert!(!driver.has_key_press_handler());
        assert!(!driver.handle_key_press("Enter"));
    }

    #[test]
    fn closed_receiver_is_not_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = ChannelFrameDriver::new(FrameToken::new(), None, tx);
        drop(rx);
        driver.hide_popup();
        driver.focus_no_longer_on_form(true);
    }

    #[test]
    fn shared_autofill_permission() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let plain = ChannelFrameDriver::new(FrameToken::new(), None, tx.clone());
        let shared = ChannelFrameDriver::with_shared_autofill(FrameToken::new(), None, tx);
        assert!(!plain.has_shared_autofill_permission());
        assert!(shared.has_shared_autofill_permission());
    }
}
