//! Rules in the `vocabulary` namespace: how concepts are looked up.

mod concept_code;
mod concept_name;
mod lookup_context;
mod schema_validation;
mod source_value;

pub use concept_code::ConceptCodeRequiresVocabularyId;
pub use concept_name::ConceptNameLookup;
pub use lookup_context::ConceptLookupContext;
pub use schema_validation::SchemaValidation;
pub use source_value::NoStringIdentification;
