//! Per-frame driver capability.
//!
//! A driver is the browser-side endpoint of one renderer frame. Drivers are
//! owned by whoever manages frame lifetimes; the router and forest only keep
//! [`Weak`](std::rc::Weak) handles to them and must be told through
//! [`FormRouter::unregister_driver`](crate::router::FormRouter::unregister_driver)
//! before a driver goes away.
//!
//! Event-specific receivers are not part of the trait: routed events hand the
//! resolved target to a caller-supplied closure, so the router never needs to
//! know how a concrete driver talks to its renderer. [`ChannelFrameDriver`]
//! is a driver that forwards everything as [`DriverCommand`] values.

use crate::frame::FrameToken;
use std::rc::Rc;

mod channel;

pub use channel::{ChannelFrameDriver, DriverCommand, FrameCommand, KeyPressHandler};

pub trait FrameFormDriver: Sized {
    /// Token of the frame this driver belongs to.
    fn frame_token(&self) -> FrameToken;

    /// Driver of the parent frame, if the frame is not the main frame and the
    /// parent still has a driver.
    fn parent(&self) -> Option<Rc<Self>>;

    /// Asks the renderer to extract and report its forms again.
    fn trigger_form_extraction(&self);

    /// Drops a key press handler installed while this frame was the last
    /// queried source.
    fn unset_key_press_handler(&self);

    /// Tells the frame's autofill manager that focus left all forms.
    fn focus_no_longer_on_form(&self, had_interacted_form: bool);

    /// Whether the frame is allowed to receive values from other origins
    /// (the `shared-autofill` permission policy).
    fn has_shared_autofill_permission(&self) -> bool {
        false
    }
}
