//! Domain models for the input-method panel.
//!
//! This crate contains pure data structures representing the values that
//! travel between clients, the panel broker and input engines. Models have
//! no protocol logic - they're just data that the codec in `panel-core`
//! knows how to put on the wire.

pub mod attribute;
pub mod error;
pub mod helper_descriptor;
pub mod ise_info;
pub mod key_event;
pub mod lookup_table;
pub mod property;
pub mod rect;

#[cfg(test)]
mod tests;

pub use attribute::{Attribute, AttributeKind};
pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use helper_descriptor::HelperDescriptor;
pub use helper_descriptor::builder::HelperDescriptorBuilder;
pub use ise_info::{IseInfo, IseMode};
pub use key_event::KeyEvent;
pub use lookup_table::{Candidate, LookupTable};
pub use property::Property;
pub use rect::Rect;
