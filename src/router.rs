//! Routing of autofill events between frames.
//!
//! Every frame talks to the browser through its own driver. When a form spans
//! several frames, an event reported by one frame has to be handled by the
//! driver of the frame that hosts the *browser form*, and browser decisions
//! (fill, preview, predictions) have to be split up and sent to every frame
//! that contributed fields. [`FormRouter`] does both, backed by a
//! [`FormForest`].
//!
//! Each routing method takes the reporting driver (`source`) and a callback.
//! The router resolves the target driver(s) and invokes the callback with the
//! target and the browser-level (or renderer-level) data; it never knows how
//! a concrete driver reaches its renderer.
//!
//! Events from renderers are routed against a forest that was updated by the
//! very same call, so a missing host driver is a bug and panics. Events from
//! the browser may refer to forms that were captured before a frame went away;
//! missing drivers are skipped.

use crate::config::RouterConfig;
use crate::driver::FrameFormDriver;
use crate::forest::{FormForest, FrameData, SecurityOptions};
use crate::form::{
    ActionPersistence, AutofillState, FieldPrediction, FieldType, FormData, FormDataPredictions, FormFieldData,
    RectF, SubmissionSource, SuggestionTriggerSource,
};
use crate::frame::{FieldGlobalId, FieldRendererId, FormGlobalId, FrameToken};
use log::{debug, error, trace};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::Instant;
use url::Origin;

pub struct FormRouter<D: FrameFormDriver> {
    config: RouterConfig,
    form_forest: FormForest<D>,
    /// Frame that most recently asked for values to fill
    last_queried_source: Option<Weak<D>>,
    /// Host of the browser form of that query
    last_queried_target: Option<Weak<D>>,
    focused_frame: Option<FrameToken>,
    /// Whether focus_no_longer_on_form() fired since the last focus_on_form_field()
    focus_no_longer_on_form_has_fired: bool,
}

impl<D: FrameFormDriver> Default for FormRouter<D> {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

fn is_driver<D>(handle: &Weak<D>, driver: &Rc<D>) -> bool {
    std::ptr::eq(handle.as_ptr(), Rc::as_ptr(driver))
}

impl<D: FrameFormDriver> FormRouter<D> {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            form_forest: FormForest::new(&config),
            config,
            last_queried_source: None,
            last_queried_target: None,
            focused_frame: None,
            focus_no_longer_on_form_has_fired: true,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn form_forest(&self) -> &FormForest<D> {
        &self.form_forest
    }

    pub fn focused_frame(&self) -> Option<FrameToken> {
        self.focused_frame
    }

    pub fn last_queried_source(&self) -> Option<Rc<D>> {
        self.last_queried_source.as_ref().and_then(Weak::upgrade)
    }

    pub fn last_queried_target(&self) -> Option<Rc<D>> {
        self.last_queried_target.as_ref().and_then(Weak::upgrade)
    }

    /// The driver registered for `frame`, if any.
    pub fn driver_of_frame(&self, frame: FrameToken) -> Option<Rc<D>> {
        self.form_forest.driver_of_frame(frame)
    }

    /// Forgets `driver`. Must be called before the driver is destroyed, and
    /// when its frame navigates (`driver_is_dying == false`), in which case the
    /// frame itself stays known.
    pub fn unregister_driver(&mut self, driver: &Rc<D>, driver_is_dying: bool) {
        let frame = self
            .form_forest
            .frame_datas()
            .find(|f| f.driver.as_ref().is_some_and(|d| is_driver(d, driver)))
            .map(|f| f.frame_token);
        if let Some(frame) = frame {
            debug!("router: unregistering driver of {frame} (dying={driver_is_dying})");
            self.form_forest.erase_forms_of_frame(frame, !driver_is_dying);
        }

        if self.last_queried_source.as_ref().is_some_and(|d| is_driver(d, driver)) {
            self.set_last_queried_source(None);
        }
        if self.last_queried_target.as_ref().is_some_and(|d| is_driver(d, driver)) {
            self.last_queried_target = None;
        }
    }

    fn set_last_queried_source(&mut self, source: Option<&Rc<D>>) {
        if let Some(previous) = self.last_queried_source() {
            if source.map_or(true, |s| !Rc::ptr_eq(&previous, s)) {
                previous.unset_key_press_handler();
            }
        }
        self.last_queried_source = source.map(Rc::downgrade);
    }

    fn set_last_queried_target(&mut self, target: Option<&Rc<D>>) {
        self.last_queried_target = target.map(Rc::downgrade);
    }

    /// Snapshot of the live drivers of all known frames.
    fn live_drivers(&self) -> Vec<Rc<D>> {
        self.form_forest.frame_datas().filter_map(FrameData::driver).collect()
    }

    fn for_each_frame(&self, mut fun: impl FnMut(&D)) {
        for driver in self.live_drivers() {
            fun(&driver);
        }
    }

    /// Driver of the host frame of a browser form that was just computed
    /// from an updated forest.
    fn host_driver(&self, browser_form: &FormData) -> Rc<D> {
        match self.driver_of_frame(browser_form.host_frame) {
            Some(target) => target,
            None => {
                error!(
                    "router: browser form {} has no driver for its host frame",
                    browser_form.global_id()
                );
                panic!(
                    "host frame {} of {} has no live driver",
                    browser_form.host_frame,
                    browser_form.global_id()
                );
            }
        }
    }

    /// Updates the forest with `form` and resolves its browser form and the
    /// driver hosting it.
    fn route_renderer_form(&mut self, source: &Rc<D>, form: FormData, extract: bool) -> (Rc<D>, FormData) {
        let form_id = form.global_id();
        self.form_forest.update_tree_of_renderer_form(form, source);

        if extract {
            self.trigger_form_extraction_except(source);
        }

        let browser_form = self.form_forest.get_browser_form(form_id);
        let target = self.host_driver(&browser_form);
        trace!("router: {form_id} routed to {}", target.frame_token());
        (target, browser_form)
    }

    pub fn set_key_press_handler<H>(&self, _source: &Rc<D>, handler: &H, callback: impl FnOnce(&D, &H)) {
        // The source may already be unregistered when a popup is shown late.
        if let Some(source) = self.last_queried_source() {
            callback(&source, handler);
        }
    }

    pub fn unset_key_press_handler(&self, _source: &Rc<D>, callback: impl FnOnce(&D)) {
        if let Some(source) = self.last_queried_source() {
            callback(&source);
        }
    }

    // Routing of events called by the renderer:

    /// Calls `trigger_form_extraction()` on every driver known to the forest
    /// and on all their ancestors, except for `exception`.
    ///
    /// Ancestors are included because a frame that contains only iframes and
    /// no fields may never have reported a form, even though its iframes have
    /// meanwhile become relevant.
    pub fn trigger_form_extraction_except(&self, exception: &Rc<D>) {
        let mut already_triggered: HashSet<FrameToken> = HashSet::new();
        for driver in self.live_drivers() {
            let mut next = Some(driver);
            while let Some(driver) = next {
                if !already_triggered.insert(driver.frame_token()) {
                    // Its ancestors were handled by an earlier iteration.
                    break;
                }
                if !Rc::ptr_eq(&driver, exception) {
                    driver.trigger_form_extraction();
                }
                next = driver.parent();
            }
        }
    }

    pub fn forms_seen(
        &mut self,
        source: &Rc<D>,
        renderer_forms: Vec<FormData>,
        removed_forms: &[FormGlobalId],
        callback: impl FnOnce(&D, &[FormData], &[FormGlobalId]),
    ) {
        let forms_with_removed_fields = self.form_forest.erase_forms(removed_forms);

        let renderer_form_ids: Vec<FormGlobalId> = renderer_forms.iter().map(FormData::global_id).collect();
        for form in renderer_forms {
            self.form_forest.update_tree_of_renderer_form(form, source);
        }

        // If all reported forms are roots, each has its own browser form.
        // Otherwise they are all non-root forms of one tree, which yields a
        // single browser form.
        let mut browser_forms: Vec<FormData> = Vec::with_capacity(renderer_form_ids.len());
        for form_id in renderer_form_ids.iter().chain(forms_with_removed_fields.iter()) {
            let browser_form = self.form_forest.get_browser_form(*form_id);
            if browser_form.fields.is_empty() {
                continue;
            }
            if !browser_forms.iter().any(|f| f.global_id() == browser_form.global_id()) {
                browser_forms.push(browser_form);
            }
        }

        if let Some(first) = browser_forms.first() {
            debug_assert!(browser_forms.iter().all(|f| f.host_frame == first.host_frame));
            let target = self.host_driver(first);
            callback(&target, &browser_forms, removed_forms);
        } else if !removed_forms.is_empty() {
            callback(source, &[], removed_forms);
        }
    }

    pub fn set_form_to_be_probably_submitted(
        &mut self,
        source: &Rc<D>,
        form: Option<FormData>,
        callback: impl FnOnce(&D, Option<&FormData>),
    ) {
        let Some(form) = form else {
            callback(source, None);
            return;
        };
        let (target, browser_form) = self.route_renderer_form(source, form, false);
        callback(&target, Some(&browser_form));
    }

    pub fn form_submitted(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        known_success: bool,
        submission_source: SubmissionSource,
        callback: impl FnOnce(&D, &FormData, bool, SubmissionSource),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, false);
        callback(&target, &browser_form, known_success, submission_source);
    }

    pub fn text_field_did_change(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        field: &FormFieldData,
        bounding_box: RectF,
        timestamp: Instant,
        callback: impl FnOnce(&D, &FormData, &FormFieldData, RectF, Instant),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, true);
        callback(&target, &browser_form, field, bounding_box, timestamp);
    }

    pub fn text_field_did_scroll(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        field: &FormFieldData,
        bounding_box: RectF,
        callback: impl FnOnce(&D, &FormData, &FormFieldData, RectF),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, true);
        callback(&target, &browser_form, field, bounding_box);
    }

    pub fn select_control_did_change(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        field: &FormFieldData,
        bounding_box: RectF,
        callback: impl FnOnce(&D, &FormData, &FormFieldData, RectF),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, true);
        callback(&target, &browser_form, field, bounding_box);
    }

    pub fn ask_for_values_to_fill(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        field: &FormFieldData,
        bounding_box: RectF,
        trigger_source: SuggestionTriggerSource,
        callback: impl FnOnce(&D, &FormData, &FormFieldData, RectF, SuggestionTriggerSource),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, true);
        debug_assert!(browser_form.find_field(field.global_id()).is_some());
        self.set_last_queried_source(Some(source));
        self.set_last_queried_target(Some(&target));
        callback(&target, &browser_form, field, bounding_box, trigger_source);
    }

    pub fn hide_popup(&self, source: &Rc<D>, callback: impl FnOnce(&D)) {
        // Password forms never set a target; they do not span frames, so the
        // source is the right recipient.
        match self.last_queried_target() {
            Some(target) => callback(&target),
            None => callback(source),
        }
    }

    pub fn focus_no_longer_on_form(
        &mut self,
        source: &Rc<D>,
        had_interacted_form: bool,
        mut callback: impl FnMut(&D, bool),
    ) {
        // Focus has already moved on to another frame.
        if self.focused_frame != Some(source.frame_token()) {
            trace!("router: suppressing late focus loss from {}", source.frame_token());
            return;
        }

        self.focus_no_longer_on_form_has_fired = true;
        self.trigger_form_extraction_except(source);
        self.for_each_frame(|driver| callback(driver, had_interacted_form));
    }

    pub fn focus_on_form_field(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        field: &FormFieldData,
        bounding_box: RectF,
        callback: impl FnOnce(&D, &FormData, &FormFieldData, RectF),
    ) {
        let form_id = form.global_id();
        self.form_forest.update_tree_of_renderer_form(form, source);

        // Focus moved here from another frame that never reported losing it.
        let frame = source.frame_token();
        if self.focused_frame != Some(frame) && !self.focus_no_longer_on_form_has_fired {
            debug!("router: focus moved to {frame}, notifying all frames");
            self.for_each_frame(|driver| driver.focus_no_longer_on_form(true));
        }

        self.focused_frame = Some(frame);
        self.focus_no_longer_on_form_has_fired = false;

        self.trigger_form_extraction_except(source);

        let browser_form = self.form_forest.get_browser_form(form_id);
        debug_assert!(browser_form.find_field(field.global_id()).is_some());
        let target = self.host_driver(&browser_form);
        callback(&target, &browser_form, field, bounding_box);
    }

    pub fn did_fill_autofill_form_data(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        timestamp: Instant,
        callback: impl FnOnce(&D, &FormData, Instant),
    ) {
        // Usually the target equals the last queried target, unless the parent
        // form became known between the query and the fill.
        let (target, browser_form) = self.route_renderer_form(source, form, false);
        callback(&target, &browser_form, timestamp);
    }

    pub fn did_preview_autofill_form_data(&self, _source: &Rc<D>, callback: impl FnOnce(&D)) {
        if let Some(target) = self.last_queried_target() {
            callback(&target);
        }
    }

    pub fn did_end_text_field_editing(&self, source: &Rc<D>, callback: impl FnMut(&D)) {
        self.trigger_form_extraction_except(source);
        self.for_each_frame(callback);
    }

    pub fn select_field_options_did_change(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        callback: impl FnOnce(&D, &FormData),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, true);
        callback(&target, &browser_form);
    }

    pub fn javascript_changed_autofilled_value(
        &mut self,
        source: &Rc<D>,
        form: FormData,
        field: &FormFieldData,
        old_value: &str,
        callback: impl FnOnce(&D, &FormData, &FormFieldData, &str),
    ) {
        let (target, browser_form) = self.route_renderer_form(source, form, true);
        callback(&target, &browser_form, field, old_value);
    }

    pub fn on_context_menu_shown_in_field(
        &self,
        source: &Rc<D>,
        form_id: FormGlobalId,
        field_id: FieldGlobalId,
        mut callback: impl FnMut(&D, FormGlobalId, FieldGlobalId),
    ) {
        self.trigger_form_extraction_except(source);
        self.for_each_frame(|driver| callback(driver, form_id, field_id));
    }

    // Routing of events triggered by the browser.
    //
    // A missing driver is not a bug here: browser forms may be outdated and
    // refer to frames that no longer exist.

    fn security_options<'a>(
        &self,
        triggered_origin: &'a Origin,
        field_type_map: &'a HashMap<FieldGlobalId, FieldType>,
    ) -> SecurityOptions<'a> {
        SecurityOptions::new(triggered_origin, Some(field_type_map))
            .with_shared_autofill(self.config.shared_autofill, self.config.relax_shared_autofill)
    }

    /// Sends the fill (or preview) data of `data` to the frames that are
    /// allowed to receive it. Returns the fields that were considered safe.
    pub fn fill_or_preview_form(
        &self,
        _source: &Rc<D>,
        action_persistence: ActionPersistence,
        data: &FormData,
        triggered_origin: &Origin,
        field_type_map: &HashMap<FieldGlobalId, FieldType>,
        mut callback: impl FnMut(&D, ActionPersistence, &FormData),
    ) -> Vec<FieldGlobalId> {
        let renderer_forms = self
            .form_forest
            .get_renderer_forms_of_browser_form(data, self.security_options(triggered_origin, field_type_map));

        for renderer_form in &renderer_forms.renderer_forms {
            // Empty fill data would be a no-op in the renderer.
            if renderer_form.fields.iter().all(|f| f.value.is_empty()) {
                continue;
            }
            match self.driver_of_frame(renderer_form.host_frame) {
                Some(target) => callback(&target, action_persistence, renderer_form),
                None => debug!("router: dropping {action_persistence} for gone frame {}", renderer_form.host_frame),
            }
        }
        renderer_forms.safe_fields
    }

    pub fn undo_autofill(
        &self,
        _source: &Rc<D>,
        action_persistence: ActionPersistence,
        data: &FormData,
        triggered_origin: &Origin,
        field_type_map: &HashMap<FieldGlobalId, FieldType>,
        mut callback: impl FnMut(&D, &FormData, ActionPersistence),
    ) {
        let renderer_forms = self
            .form_forest
            .get_renderer_forms_of_browser_form(data, self.security_options(triggered_origin, field_type_map));

        for renderer_form in &renderer_forms.renderer_forms {
            if let Some(target) = self.driver_of_frame(renderer_form.host_frame) {
                callback(&target, renderer_form, action_persistence);
            }
        }
    }

    /// Splits the predictions of browser forms along their renderer forms and
    /// sends each frame the predictions of its forms.
    pub fn send_autofill_type_predictions_to_renderer(
        &self,
        _source: &Rc<D>,
        browser_fdps: &[FormDataPredictions],
        mut callback: impl FnMut(&D, &[FormDataPredictions]),
    ) {
        let mut renderer_fdps: BTreeMap<FrameToken, Vec<FormDataPredictions>> = BTreeMap::new();

        for browser_fdp in browser_fdps {
            debug_assert_eq!(browser_fdp.data.fields.len(), browser_fdp.fields.len());
            let field_predictions: HashMap<FieldGlobalId, &FieldPrediction> = browser_fdp
                .data
                .fields
                .iter()
                .zip(browser_fdp.fields.iter())
                .map(|(field, prediction)| (field.global_id(), prediction))
                .collect();

            let renderer_forms = self.form_forest.get_renderer_forms_of_browser_form(
                &browser_fdp.data,
                SecurityOptions::new(&browser_fdp.data.main_frame_origin, None),
            );
            for renderer_form in renderer_forms.renderer_forms {
                let fields = renderer_form
                    .fields
                    .iter()
                    .map(|f| field_predictions.get(&f.global_id()).map(|p| (*p).clone()).unwrap_or_default())
                    .collect();
                renderer_fdps.entry(renderer_form.host_frame).or_default().push(FormDataPredictions {
                    data: renderer_form,
                    signature: browser_fdp.signature,
                    fields,
                });
            }
        }

        for (frame, fdps) in &renderer_fdps {
            if let Some(target) = self.driver_of_frame(*frame) {
                callback(&target, fdps);
            }
        }
    }

    pub fn send_fields_eligible_for_manual_filling_to_renderer(
        &self,
        _source: &Rc<D>,
        fields: &[FieldGlobalId],
        mut callback: impl FnMut(&D, &[FieldRendererId]),
    ) {
        let mut fields_by_frame: BTreeMap<FrameToken, Vec<FieldRendererId>> = BTreeMap::new();
        for field in fields {
            fields_by_frame.entry(field.frame_token).or_default().push(field.renderer_id);
        }

        for (frame, frame_fields) in &fields_by_frame {
            if let Some(target) = self.driver_of_frame(*frame) {
                callback(&target, frame_fields);
            }
        }
    }

    pub fn renderer_should_accept_data_list_suggestion(
        &self,
        _source: &Rc<D>,
        field: FieldGlobalId,
        value: &str,
        callback: impl FnOnce(&D, FieldRendererId, &str),
    ) {
        if let Some(target) = self.driver_of_frame(field.frame_token) {
            callback(&target, field.renderer_id, value);
        }
    }

    pub fn renderer_should_clear_filled_section(&self, _source: &Rc<D>, callback: impl FnMut(&D)) {
        self.for_each_frame(callback);
    }

    pub fn renderer_should_clear_previewed_form(&self, _source: &Rc<D>, callback: impl FnMut(&D)) {
        self.for_each_frame(callback);
    }

    pub fn renderer_should_trigger_suggestions(
        &self,
        _source: &Rc<D>,
        field: FieldGlobalId,
        trigger_source: SuggestionTriggerSource,
        callback: impl FnOnce(&D, FieldRendererId, SuggestionTriggerSource),
    ) {
        if let Some(target) = self.driver_of_frame(field.frame_token) {
            callback(&target, field.renderer_id, trigger_source);
        }
    }

    pub fn renderer_should_fill_field_with_value(
        &self,
        _source: &Rc<D>,
        field: FieldGlobalId,
        value: &str,
        callback: impl FnOnce(&D, FieldRendererId, &str),
    ) {
        if let Some(target) = self.driver_of_frame(field.frame_token) {
            callback(&target, field.renderer_id, value);
        }
    }

    pub fn renderer_should_preview_field_with_value(
        &self,
        _source: &Rc<D>,
        field: FieldGlobalId,
        value: &str,
        callback: impl FnOnce(&D, FieldRendererId, &str),
    ) {
        if let Some(target) = self.driver_of_frame(field.frame_token) {
            callback(&target, field.renderer_id, value);
        }
    }

    pub fn renderer_should_set_suggestion_availability(
        &self,
        _source: &Rc<D>,
        field: FieldGlobalId,
        state: AutofillState,
        callback: impl FnOnce(&D, FieldRendererId, AutofillState),
    ) {
        if let Some(target) = self.driver_of_frame(field.frame_token) {
            callback(&target, field.renderer_id, state);
        }
    }

    /// The renderer forms of `browser_form`, without any origin filtering.
    pub fn get_renderer_forms(&self, browser_form: &FormData) -> Vec<FormData> {
        self.form_forest
            .get_renderer_forms_of_browser_form(browser_form, SecurityOptions::trust_all_origins())
            .renderer_forms
    }
}
