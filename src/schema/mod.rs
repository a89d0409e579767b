pub mod schema;

pub use schema::{FieldDefinition, FieldType, Schema, WILDCARD_FIELD};
