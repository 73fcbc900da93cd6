//! Core types shared by the designer, the provisioning engine and the
//! persistence layer.

pub mod form;
pub mod navigation;

pub use form::{
    ConditionOperator, FieldDefinition, FieldType, FormDefinition, ValidationRules,
    VisibilityCondition,
};
pub use navigation::NavigationEntry;

/// Columns every provisioned storage table carries ahead of the designed fields.
pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "created_by", "district_id"];

/// Tables owned by the service itself; no form may be provisioned under these names.
pub const INTERNAL_TABLES: [&str; 4] = [
    "navigation_entries",
    "form_definitions",
    "deletion_log",
    "_formwright_migrations",
];

/// Whether `name` is one of the service's own tables
pub fn is_internal_table(name: &str) -> bool {
    INTERNAL_TABLES
        .iter()
        .any(|table| table.eq_ignore_ascii_case(name))
}

/// Whether `name` collides (case-insensitively) with a system column
pub fn is_reserved_column(name: &str) -> bool {
    SYSTEM_COLUMNS
        .iter()
        .any(|column| column.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_columns_are_case_insensitive() {
        assert!(is_reserved_column("ID"));
        assert!(is_reserved_column("Created_At"));
        assert!(!is_reserved_column("identity"));
        assert!(is_internal_table("Form_Definitions"));
        assert!(!is_internal_table("crop_survey"));
    }
}
