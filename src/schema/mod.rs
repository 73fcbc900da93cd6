//! Form schema design and rule evaluation
//!
//! - `builder`: draft fields from an imported header row
//! - `designer`: editable design session and publish-time validation
//! - `formula`: calculation formula parser/evaluator
//! - `rules`: visibility, computed values and entry validation
//! - `ddl`: storage type mapping and create/drop statements

pub mod builder;
pub mod ddl;
pub mod designer;
pub mod error;
pub mod formula;
pub mod rules;
pub mod values;

pub use builder::{sanitize_identifier, sanitize_table_name, FieldSchemaBuilder, NameRegistry};
pub use ddl::{quote_ident, ColumnSpec, DdlGenerator, TypeMapper};
pub use designer::{validate_design, DefinitionMetadata, SchemaDesigner};
pub use error::{DesignValidationError, DesignerError, EntryValidationError, FormulaError};
pub use formula::Formula;
pub use rules::{
    computed_value, evaluate_entry, is_visible, validate, validate_entry, EntryEvaluation,
    EntryValues,
};
