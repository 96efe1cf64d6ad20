//! Helpers shared by the unit tests.

use crate::driver::{ChannelFrameDriver, FrameCommand};
use crate::form::{ChildFrame, FormData, FormFieldData};
use crate::frame::{FieldGlobalId, FieldRendererId, FormGlobalId, FormRendererId, FrameToken};
use std::rc::Rc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::{Origin, Url};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn o(s: &str) -> Origin {
    Url::parse(s).expect("valid URL").origin()
}

/// A page made of frames whose drivers all report to one channel.
pub(crate) struct Page {
    pub main_origin: Origin,
    tx: UnboundedSender<FrameCommand>,
    rx: UnboundedReceiver<FrameCommand>,
}

impl Page {
    pub fn new(main_origin: &str) -> Self {
        init_logging();
        let (tx, rx) = mpsc::unbounded_channel();
        Self { main_origin: o(main_origin), tx, rx }
    }

    pub fn frame(&self, parent: Option<&Rc<ChannelFrameDriver>>) -> Rc<ChannelFrameDriver> {
        ChannelFrameDriver::new(FrameToken::new(), parent, self.tx.clone())
    }

    pub fn shared_frame(&self, parent: Option<&Rc<ChannelFrameDriver>>) -> Rc<ChannelFrameDriver> {
        ChannelFrameDriver::with_shared_autofill(FrameToken::new(), parent, self.tx.clone())
    }

    /// Everything sent so far.
    pub fn drain(&mut self) -> Vec<FrameCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.rx.try_recv() {
            out.push(cmd);
        }
        out
    }
}

/// Builds a renderer form hosted in `frame` whose fields come from `origin`.
pub(crate) fn form(frame: FrameToken, id: u64, origin: &Origin, main: &Origin, fields: &[u64]) -> FormData {
    let mut form = FormData::new(frame, FormRendererId(id), main.clone());
    form.name = format!("form{id}");
    for &field_id in fields {
        form.fields.push(
            FormFieldData::new(frame, FormRendererId(id), FieldRendererId(field_id), origin.clone())
                .with_name(format!("field{field_id}")),
        );
    }
    form
}

pub(crate) fn with_child(mut form: FormData, child: FrameToken, predecessor: Option<usize>) -> FormData {
    form.child_frames.push(ChildFrame::new(child, predecessor));
    form
}

pub(crate) fn form_id(frame: FrameToken, id: u64) -> FormGlobalId {
    FormGlobalId::new(frame, FormRendererId(id))
}

pub(crate) fn field_id(frame: FrameToken, id: u64) -> FieldGlobalId {
    FieldGlobalId::new(frame, FieldRendererId(id))
}
