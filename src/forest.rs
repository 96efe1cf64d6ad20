//! The form forest.
//!
//! Every frame reports its forms independently ("renderer forms"). A renderer
//! form may contain iframes, named by [`ChildFrame`] placeholders; the forms of
//! such a child frame logically belong to the parent form. The forest keeps
//! one [`FrameData`] per frame and links frames to the form whose placeholder
//! names them, which yields a forest of form trees.
//!
//! # Concepts
//!
//! - The *browser form* of a renderer form is the root of its tree, with the
//!   fields of all forms of the tree flattened into one list. Fields of a
//!   child frame are inserted right after the field that precedes the iframe.
//!   Browser forms are not stored; [`FormForest::get_browser_form`] recomputes
//!   them from the current state.
//! - [`FormForest::get_renderer_forms_of_browser_form`] is the inverse: it
//!   splits a browser form back into per-frame renderer forms, subject to the
//!   [`SecurityOptions`].
//!
//! Links are declared by the parent: a child frame that reports its forms
//! before its parent does simply forms a tree of its own until the parent's
//! placeholder shows up.
//!
//! The forest never follows a parent chain longer than the configured
//! `max_frame_depth`, and refuses links that would make a frame its own
//! ancestor.

mod frame_data;
mod security;

pub use frame_data::FrameData;
pub use security::{RendererForms, SecurityOptions};

use crate::config::RouterConfig;
use crate::driver::FrameFormDriver;
use crate::errors::ForestError;
use crate::form::{ChildFrame, FormData, FormFieldData};
use crate::frame::{FormGlobalId, FrameToken};
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub struct FormForest<D> {
    frames: HashMap<FrameToken, FrameData<D>>,
    across_iframes: bool,
    max_depth: usize,
}

impl<D> Default for FormForest<D> {
    fn default() -> Self {
        Self::new(&RouterConfig::default())
    }
}

impl<D> FormForest<D> {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            frames: HashMap::new(),
            across_iframes: config.across_iframes,
            max_depth: config.max_frame_depth,
        }
    }

    pub fn frame_datas(&self) -> impl Iterator<Item = &FrameData<D>> {
        self.frames.values()
    }

    pub fn frame_data(&self, frame: FrameToken) -> Option<&FrameData<D>> {
        self.frames.get(&frame)
    }

    pub fn driver_of_frame(&self, frame: FrameToken) -> Option<Rc<D>> {
        self.frames.get(&frame).and_then(FrameData::driver)
    }

    /// The renderer form with the given id, as last reported.
    pub fn find_form(&self, id: FormGlobalId) -> Option<&FormData> {
        self.frames.get(&id.frame_token)?.find_form(id.renderer_id)
    }

    fn get_or_create_frame_data(&mut self, frame: FrameToken) -> &mut FrameData<D> {
        self.frames.entry(frame).or_insert_with(|| {
            trace!("forest: new frame {frame}");
            FrameData::new(frame)
        })
    }

    /// Inserts or replaces `form` in the frame that hosts it and links the
    /// child frames named by its placeholders. `driver` becomes the frame's
    /// driver.
    pub fn update_tree_of_renderer_form(&mut self, mut form: FormData, driver: &Rc<D>) {
        let form_id = form.global_id();

        if self.across_iframes {
            let child_frames = std::mem::take(&mut form.child_frames);
            form.child_frames = child_frames
                .into_iter()
                .filter(|child| match self.check_link(form_id, child.token) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("forest: ignoring child frame of {form_id}: {err}");
                        false
                    }
                })
                .collect();
        } else {
            form.child_frames.clear();
        }
        let new_children: Vec<FrameToken> = form.child_frames.iter().map(|c| c.token).collect();

        let frame = self.get_or_create_frame_data(form_id.frame_token);
        frame.driver = Some(Rc::downgrade(driver));
        let old_children: Vec<FrameToken> = match frame.position_of(form_id.renderer_id) {
            Some(i) => {
                let old = std::mem::replace(&mut frame.child_forms[i], form);
                old.child_frames.iter().map(|c| c.token).collect()
            }
            None => {
                frame.child_forms.push(form);
                Vec::new()
            }
        };

        for old in old_children.into_iter().filter(|t| !new_children.contains(t)) {
            self.unlink_child_frame(old, form_id);
        }
        for child in new_children {
            let child_frame = self.get_or_create_frame_data(child);
            if let Some(previous) = child_frame.parent_form.filter(|p| *p != form_id) {
                debug!("forest: frame {child} moves from {previous} to {form_id}");
            }
            child_frame.parent_form = Some(form_id);
        }
    }

    /// Checks that making `child` a child frame of `parent` keeps the forest acyclic.
    fn check_link(&self, parent: FormGlobalId, child: FrameToken) -> Result<(), ForestError> {
        if child == parent.frame_token {
            return Err(ForestError::SelfReference(child));
        }

        let mut frame = parent.frame_token;
        for _ in 0..self.max_depth {
            let Some(grand_parent) = self.frames.get(&frame).and_then(|f| f.parent_form) else {
                return Ok(());
            };
            if grand_parent.frame_token == child {
                return Err(ForestError::Cycle { parent, child });
            }
            frame = grand_parent.frame_token;
        }
        Err(ForestError::TooDeep(parent.frame_token))
    }

    fn unlink_child_frame(&mut self, child: FrameToken, parent: FormGlobalId) {
        if let Some(frame) = self.frames.get_mut(&child) {
            if frame.parent_form == Some(parent) {
                frame.parent_form = None;
            }
        }
    }

    /// Id of the root form of the tree that contains `id`, or `None` if the
    /// form is unknown.
    pub fn root_of(&self, id: FormGlobalId) -> Option<FormGlobalId> {
        self.find_form(id)?;

        let parent_of = |form: FormGlobalId| {
            self.frames
                .get(&form.frame_token)
                .and_then(|f| f.parent_form)
                .filter(|parent| self.find_form(*parent).is_some())
        };

        // Same bound as flattening, so a form is always part of its own browser form.
        let mut current = id;
        for _ in 0..self.max_depth {
            match parent_of(current) {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
        if parent_of(current).is_some() {
            warn!("forest: parent chain of {id} exceeds {} frames", self.max_depth);
        }
        Some(current)
    }

    /// The browser form of the renderer form `id`.
    ///
    /// A form without linked ancestors or child frames is returned as
    /// reported. An unknown id yields an empty form carrying that id.
    pub fn get_browser_form(&self, id: FormGlobalId) -> FormData {
        let Some(root) = self.root_of(id).and_then(|root| self.find_form(root)) else {
            debug!("forest: no renderer form {id}");
            return FormData::empty(id);
        };
        if root.child_frames.is_empty() {
            return root.clone();
        }

        let mut browser_form = root.clone_without_fields();
        self.flatten_into(root, &mut browser_form.fields, 0);
        browser_form
    }

    /// Appends the fields of `form` and of its child frames, in DOM order.
    fn flatten_into(&self, form: &FormData, out: &mut Vec<FormFieldData>, depth: usize) {
        let len = form.fields.len();
        // Index of the field an iframe is inserted before.
        let slot = |child: &ChildFrame| child.predecessor.map_or(0, |p| p.saturating_add(1).min(len));

        for pos in 0..=len {
            for child in form.child_frames.iter().filter(|c| slot(*c) == pos) {
                self.flatten_child_frame(child.token, form.global_id(), out, depth);
            }
            if let Some(field) = form.fields.get(pos) {
                out.push(field.clone());
            }
        }
    }

    fn flatten_child_frame(&self, token: FrameToken, parent: FormGlobalId, out: &mut Vec<FormFieldData>, depth: usize) {
        let Some(frame) = self.frames.get(&token) else {
            return;
        };
        // The frame may have moved to another form since `parent` was reported.
        if frame.parent_form != Some(parent) {
            return;
        }
        if depth >= self.max_depth {
            warn!("forest: not flattening {token}, tree deeper than {} frames", self.max_depth);
            return;
        }
        for form in &frame.child_forms {
            self.flatten_into(form, out, depth + 1);
        }
    }

    /// Removes the given renderer forms. Unknown ids are ignored.
    ///
    /// Returns the ids of the remaining browser forms that lost fields. Roots
    /// whose browser form has no fields left are not returned; their renderer
    /// forms stay, since their placeholders may be filled again.
    pub fn erase_forms(&mut self, ids: &[FormGlobalId]) -> HashSet<FormGlobalId> {
        let mut affected = HashSet::new();

        for &id in ids {
            let Some(root) = self.root_of(id) else {
                continue;
            };
            let Some(frame) = self.frames.get_mut(&id.frame_token) else {
                continue;
            };
            let Some(pos) = frame.position_of(id.renderer_id) else {
                continue;
            };
            let removed = frame.child_forms.remove(pos);
            debug!("forest: erased {id}");

            for child in &removed.child_frames {
                self.unlink_child_frame(child.token, id);
            }
            if root != id {
                affected.insert(root);
            }
        }

        affected.retain(|root| !self.get_browser_form(*root).fields.is_empty());
        affected
    }

    /// Removes all forms of `frame`. Unless `keep_frame` is set, the frame
    /// itself is forgotten too, including its driver.
    pub fn erase_forms_of_frame(&mut self, frame: FrameToken, keep_frame: bool) {
        let Some(data) = self.frames.get_mut(&frame) else {
            return;
        };
        let forms = std::mem::take(&mut data.child_forms);
        if !keep_frame {
            self.frames.remove(&frame);
        }
        debug!("forest: erased {} forms of {frame} (keep_frame={keep_frame})", forms.len());

        for form in &forms {
            for child in &form.child_frames {
                self.unlink_child_frame(child.token, form.global_id());
            }
        }
    }
}

impl<D: FrameFormDriver> FormForest<D> {
    /// Splits `browser_form` into one renderer form per contributing form.
    ///
    /// Fields keep their browser form order within each renderer form. Fields
    /// that fail the security check are left out, and so are renderer forms
    /// that end up without fields.
    pub fn get_renderer_forms_of_browser_form(
        &self,
        browser_form: &FormData,
        security: SecurityOptions<'_>,
    ) -> RendererForms {
        let mut result = RendererForms::default();
        let mut index: HashMap<FormGlobalId, usize> = HashMap::new();

        for field in &browser_form.fields {
            let safe = security.is_safe_to_fill(browser_form, field, || {
                self.driver_of_frame(field.host_frame)
                    .is_some_and(|d| d.has_shared_autofill_permission())
            });
            if !safe {
                trace!("forest: {} is not safe to fill", field.global_id());
                continue;
            }

            let renderer_form_id = field.renderer_form_id();
            let i = match index.get(&renderer_form_id) {
                Some(&i) => i,
                None => {
                    let renderer_form = match self.find_form(renderer_form_id) {
                        Some(known) => known.clone_without_fields(),
                        None => FormData::new(
                            renderer_form_id.frame_token,
                            renderer_form_id.renderer_id,
                            browser_form.main_frame_origin.clone(),
                        ),
                    };
                    result.renderer_forms.push(renderer_form);
                    index.insert(renderer_form_id, result.renderer_forms.len() - 1);
                    result.renderer_forms.len() - 1
                }
            };
            result.renderer_forms[i].fields.push(field.clone());
            result.safe_fields.push(field.global_id());
        }

        result
    }
}
