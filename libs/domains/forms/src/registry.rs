//! Case-insensitive lookup of form definitions.

use crate::error::{FormError, FormResult};
use crate::form::Form;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Forms keyed by lowercased identifier.
///
/// Populated at startup and only read while handling requests.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    forms: HashMap<String, Arc<Form>>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert forms, overwriting any registered under the same key.
    pub fn add(&mut self, forms: impl IntoIterator<Item = Form>) {
        for form in forms {
            let key = form.key();
            debug!(form = %key, emails = form.emails.len(), "Registering form");
            self.forms.insert(key, Arc::new(form));
        }
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.add([form]);
        self
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<Arc<Form>> {
        self.forms.get(&name.to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn forms(&self) -> impl Iterator<Item = &Form> {
        self.forms.values().map(AsRef::as_ref)
    }

    /// Build a registry from a JSON array of forms.
    pub fn from_json(json: &[u8]) -> FormResult<Self> {
        let forms: Vec<Form> = serde_json::from_slice(json)
            .map_err(|e| FormError::Config(format!("Invalid forms definition: {}", e)))?;

        let mut registry = Self::new();
        registry.add(forms);
        Ok(registry)
    }

    /// Load a JSON forms definition from disk.
    pub fn from_file(path: impl AsRef<Path>) -> FormResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read(path).map_err(|e| {
            FormError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let registry = Self::from_json(&json)?;
        info!(path = %path.display(), forms = registry.len(), "Loaded form definitions");
        Ok(registry)
    }
}
