use crate::form::FormData;
use crate::frame::{FormGlobalId, FormRendererId, FrameToken};
use std::rc::{Rc, Weak};

/// Everything the forest knows about one frame.
#[derive(Debug)]
pub struct FrameData<D> {
    pub frame_token: FrameToken,
    /// The frame's current renderer forms, in the order they were first reported.
    pub child_forms: Vec<FormData>,
    /// The form in the parent frame whose placeholder names this frame.
    pub parent_form: Option<FormGlobalId>,
    /// Weak handle to the frame's driver. `None` until the frame reports a
    /// form, e.g. when only a parent form has named the frame so far.
    pub driver: Option<Weak<D>>,
}

impl<D> FrameData<D> {
    pub fn new(frame_token: FrameToken) -> Self {
        Self {
            frame_token,
            child_forms: Vec::new(),
            parent_form: None,
            driver: None,
        }
    }

    /// The frame's driver, if it is registered and still alive.
    pub fn driver(&self) -> Option<Rc<D>> {
        self.driver.as_ref().and_then(Weak::upgrade)
    }

    pub fn find_form(&self, renderer_id: FormRendererId) -> Option<&FormData> {
        self.child_forms.iter().find(|f| f.renderer_id == renderer_id)
    }

    pub(crate) fn position_of(&self, renderer_id: FormRendererId) -> Option<usize> {
        self.child_forms.iter().position(|f| f.renderer_id == renderer_id)
    }
}
