pub mod config;
pub mod driver;
pub mod errors;
pub mod forest;
pub mod form;
pub mod frame;
pub mod router;

#[cfg(test)]
mod test_util;

pub use config::{RouterConfig, RouterConfigBuilder};
pub use driver::{ChannelFrameDriver, DriverCommand, FrameCommand, FrameFormDriver};
pub use errors::{ForestError, RouterConfigError};
pub use forest::{FormForest, RendererForms, SecurityOptions};
pub use frame::{FieldGlobalId, FieldRendererId, FormGlobalId, FormRendererId, FrameToken};
pub use router::FormRouter;
