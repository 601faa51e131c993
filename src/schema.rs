//! Compiled handler property schemas.
//!
//! Handlers declare their accepted properties as a JSON Schema document. It
//! is compiled once at definition time and reused for every conformance
//! check on final properties.

use std::fmt;

use serde_json::Value;

pub struct PropertySchema {
    validator: jsonschema::Validator,
}

impl PropertySchema {
    /// Compile a JSON Schema document. Returns the compiler's message when
    /// the document is not a usable schema.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let validator = jsonschema::Validator::new(schema).map_err(|e| e.to_string())?;
        Ok(Self { validator })
    }

    /// Check `value` against the schema.
    ///
    /// On failure every violation is reported, joined with `; `.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if self.validator.is_valid(value) {
            return Ok(());
        }
        let errors: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();
        Err(errors.join("; "))
    }
}

impl fmt::Debug for PropertySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySchema").finish_non_exhaustive()
    }
}
