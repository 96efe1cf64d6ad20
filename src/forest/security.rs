use crate::form::{FieldType, FormData, FormFieldData};
use crate::frame::FieldGlobalId;
use std::collections::HashMap;
use url::Origin;

/// Policy input for splitting a browser form into renderer forms.
///
/// With a triggered origin set, a field only ends up in a renderer form if
/// its frame may receive values from that origin. Without one, all origins
/// are trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityOptions<'a> {
    triggered_origin: Option<&'a Origin>,
    field_type_map: Option<&'a HashMap<FieldGlobalId, FieldType>>,
    shared_autofill: bool,
    relax_shared_autofill: bool,
}

impl<'a> SecurityOptions<'a> {
    pub fn new(triggered_origin: &'a Origin, field_type_map: Option<&'a HashMap<FieldGlobalId, FieldType>>) -> Self {
        Self {
            triggered_origin: Some(triggered_origin),
            field_type_map,
            shared_autofill: false,
            relax_shared_autofill: false,
        }
    }

    pub fn trust_all_origins() -> Self {
        Self::default()
    }

    pub fn with_shared_autofill(mut self, enabled: bool, relaxed: bool) -> Self {
        self.shared_autofill = enabled;
        self.relax_shared_autofill = relaxed;
        self
    }

    fn is_sensitive(&self, field: FieldGlobalId) -> bool {
        self.field_type_map
            .and_then(|m| m.get(&field))
            .is_some_and(FieldType::is_sensitive)
    }

    /// Decides whether `field` of `browser_form` may be filled.
    /// `shared_autofill_permission` reports the permission of the field's frame.
    pub(crate) fn is_safe_to_fill(
        &self,
        browser_form: &FormData,
        field: &FormFieldData,
        shared_autofill_permission: impl FnOnce() -> bool,
    ) -> bool {
        let Some(triggered_origin) = self.triggered_origin else {
            return true;
        };
        if field.origin == *triggered_origin {
            return true;
        }

        let main_origin = &browser_form.main_frame_origin;
        let sensitive = self.is_sensitive(field.global_id());
        if sensitive {
            return false;
        }
        if field.origin == *main_origin {
            return true;
        }

        self.shared_autofill
            && (self.relax_shared_autofill || triggered_origin == main_origin)
            && shared_autofill_permission()
    }
}

/// A browser form split back into the renderer forms of its frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererForms {
    pub renderer_forms: Vec<FormData>,
    /// Fields that passed the security check, in browser form order.
    pub safe_fields: Vec<FieldGlobalId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FieldRendererId, FormRendererId, FrameToken};
    use url::Url;

    fn o(s: &str) -> Origin {
        Url::parse(s).expect("valid URL").origin()
    }

    fn field_in(origin: &Origin) -> FormFieldData {
        FormFieldData::new(FrameToken::new(), FormRendererId(1), FieldRendererId(1), origin.clone())
    }

    #[test]
    fn trust_all_origins_accepts_everything() {
        let main = o("https://main.test");
        let form = FormData::new(FrameToken::new(), FormRendererId(1), main);
        let opts = SecurityOptions::trust_all_origins();
        assert!(opts.is_safe_to_fill(&form, &field_in(&o("https://evil.test")), || false));
    }

    #[test]
    fn same_origin_as_trigger_is_safe_even_if_sensitive() {
        let main = o("https://main.test");
        let pay = o("https://pay.test");
        let form = FormData::new(FrameToken::new(), FormRendererId(1), main);
        let field = field_in(&pay);
        let types = HashMap::from([(field.global_id(), FieldType::CreditCardNumber)]);

        let opts = SecurityOptions::new(&pay, Some(&types));
        assert!(opts.is_safe_to_fill(&form, &field, || false));
    }

    #[test]
    fn main_origin_is_safe_unless_sensitive() {
        let main = o("https://main.test");
        let pay = o("https://pay.test");
        let form = FormData::new(FrameToken::new(), FormRendererId(1), main.clone());
        let name = field_in(&main);
        let number = field_in(&main);
        let types = HashMap::from([
            (name.global_id(), FieldType::CreditCardName),
            (number.global_id(), FieldType::CreditCardNumber),
        ]);

        let opts = SecurityOptions::new(&pay, Some(&types));
        assert!(opts.is_safe_to_fill(&form, &name, || false));
        assert!(!opts.is_safe_to_fill(&form, &number, || false));
    }

    #[test]
    fn cross_origin_needs_shared_autofill() {
        let main = o("https://main.test");
        let other = o("https://other.test");
        let form = FormData::new(FrameToken::new(), FormRendererId(1), main.clone());
        let field = field_in(&other);

        let strict = SecurityOptions::new(&main, None);
        assert!(!strict.is_safe_to_fill(&form, &field, || true));

        let shared = SecurityOptions::new(&main, None).with_shared_autofill(true, false);
        assert!(shared.is_safe_to_fill(&form, &field, || true));
        assert!(!shared.is_safe_to_fill(&form, &field, || false));
    }

    #[test]
    fn relaxed_shared_autofill_allows_cross_origin_trigger() {
        let main = o("https://main.test");
        let other = o("https://other.test");
        let third = o("https://third.test");
        let form = FormData::new(FrameToken::new(), FormRendererId(1), main);
        let field = field_in(&other);

        let shared = SecurityOptions::new(&third, None).with_shared_autofill(true, false);
        assert!(!shared.is_safe_to_fill(&form, &field, || true));

        let relaxed = SecurityOptions::new(&third, None).with_shared_autofill(true, true);
        assert!(relaxed.is_safe_to_fill(&form, &field, || true));
    }
}
