use crate::error::model_error::ModelError;
use crate::{ErrorLocation, HelperDescriptor};

use std::panic::Location;

/// Characters that would corrupt a catalogue cache line.
const FORBIDDEN_FIELD_CHARS: [char; 3] = [':', '\n', '\r'];

/// Builder for creating validated HelperDescriptor instances.
#[derive(Debug, Default)]
pub struct HelperDescriptorBuilder {
    uuid: Option<String>,
    name: Option<String>,
    icon: Option<String>,
    description: Option<String>,
    option: Option<u32>,
    module: Option<String>,
}

impl HelperDescriptorBuilder {
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_option(mut self, option: u32) -> Self {
        self.option = Some(option);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Build the HelperDescriptor with validation.
    #[track_caller]
    pub fn build(self) -> Result<HelperDescriptor, ModelError> {
        let uuid = required(self.uuid, "uuid")?;
        let name = required(self.name, "name")?;
        let module = required(self.module, "module")?;

        let icon = self.icon.unwrap_or_default();
        check_field(&icon, "icon")?;

        Ok(HelperDescriptor {
            uuid,
            name,
            icon,
            description: self.description.unwrap_or_default(),
            option: self.option.unwrap_or_default(),
            module,
        })
    }
}

#[track_caller]
fn required(value: Option<String>, field: &'static str) -> Result<String, ModelError> {
    let value = value.ok_or_else(|| ModelError::MissingField {
        field,
        location: ErrorLocation::from(Location::caller()),
    })?;

    if value.is_empty() {
        return Err(ModelError::EmptyField {
            field,
            location: ErrorLocation::from(Location::caller()),
        });
    }

    check_field(&value, field)?;
    Ok(value)
}

#[track_caller]
fn check_field(value: &str, field: &'static str) -> Result<(), ModelError> {
    if value.contains(FORBIDDEN_FIELD_CHARS) {
        return Err(ModelError::ReservedCharacter {
            field,
            value: value.to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(())
}
