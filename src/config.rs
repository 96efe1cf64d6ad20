//! Router configuration.
//!
//! `RouterConfig` controls how the [`FormRouter`](crate::router::FormRouter)
//! builds cross-frame forms and which frames may receive filled values.
//!
//! `RouterConfig` provides defaults via [`Default`] and a fluent
//! [`RouterConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ```rust
//! use gosub_autofill::config::RouterConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = RouterConfig::builder()
//!     .shared_autofill(true)
//!     .max_frame_depth(16)
//!     .build()?;
//! assert!(cfg.across_iframes);
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `across_iframes`: Flatten forms of child frames into their parent form (default: `true`).
//! - `shared_autofill`: Allow filling cross-origin iframes that carry the `shared-autofill` permission.
//! - `relax_shared_autofill`: Also allow it when the fill was triggered in a cross-origin frame.
//! - `max_frame_depth`: Longest parent chain the forest follows before it gives up (default: 64).

use crate::errors::RouterConfigError;

const DEFAULT_MAX_FRAME_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub across_iframes: bool,
    pub shared_autofill: bool,
    pub relax_shared_autofill: bool,
    pub max_frame_depth: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            across_iframes: true,
            shared_autofill: false,
            relax_shared_autofill: false,
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
        }
    }
}

impl RouterConfig {
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }
}

/// Builder for [`RouterConfig`].
#[derive(Debug, Clone, Default)]
pub struct RouterConfigBuilder {
    inner: RouterConfig,
}

impl RouterConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut RouterConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn across_iframes(self, on: bool) -> Self { self.map(|c| c.across_iframes = on) }
    pub fn shared_autofill(self, on: bool) -> Self { self.map(|c| c.shared_autofill = on) }
    pub fn relax_shared_autofill(self, on: bool) -> Self { self.map(|c| c.relax_shared_autofill = on) }
    pub fn max_frame_depth(self, depth: usize) -> Self { self.map(|c| c.max_frame_depth = depth) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut RouterConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<RouterConfig, RouterConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

fn validate(c: &RouterConfig) -> Result<(), RouterConfigError> {
    if c.max_frame_depth == 0 {
        return Err(RouterConfigError::ZeroFrameDepth);
    }
    if c.relax_shared_autofill && !c.shared_autofill {
        return Err(RouterConfigError::RelaxedWithoutSharedAutofill);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RouterConfig::default();
        assert!(cfg.across_iframes);
        assert!(!cfg.shared_autofill);
        assert!(!cfg.relax_shared_autofill);
        assert_eq!(cfg.max_frame_depth, 64);
        assert_eq!(RouterConfig::builder().build().unwrap(), cfg);
    }

    #[test]
    fn builder_sets_fields() {
        let cfg = RouterConfig::builder()
            .across_iframes(false)
            .shared_autofill(true)
            .relax_shared_autofill(true)
            .max_frame_depth(3)
            .build()
            .unwrap();
        assert!(!cfg.across_iframes);
        assert!(cfg.shared_autofill);
        assert!(cfg.relax_shared_autofill);
        assert_eq!(cfg.max_frame_depth, 3);
    }

    #[test]
    fn with_applies_closure() {
        let cfg = RouterConfig::builder()
            .with(|c| {
                c.shared_autofill = true;
                c.max_frame_depth = 8;
            })
            .build()
            .unwrap();
        assert!(cfg.shared_autofill);
        assert_eq!(cfg.max_frame_depth, 8);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = RouterConfig::builder().max_frame_depth(0).build().unwrap_err();
        assert_eq!(err, RouterConfigError::ZeroFrameDepth);
        assert_eq!(err.to_string(), "max_frame_depth must be at least 1");
    }

    #[test]
    fn relaxed_needs_shared_autofill() {
        let err = RouterConfig::builder().relax_shared_autofill(true).build().unwrap_err();
        assert_eq!(err, RouterConfigError::RelaxedWithoutSharedAutofill);
    }
}
