use serde::{Deserialize, Serialize};

/// Menu item exposing a published form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Parent menu section
    pub parent_id: String,
    pub label: String,
    pub icon: String,
    /// Target URL of the data-entry view
    pub url: String,
    /// Storage table of the form this entry exposes
    pub form_table: String,
}

impl NavigationEntry {
    /// Build the menu entry for a form, encoding the table name into the URL
    pub fn for_form(
        parent_id: &str,
        icon: &str,
        url_prefix: &str,
        table_name: &str,
        label: &str,
    ) -> Self {
        let url = format!(
            "{}{}",
            url_prefix,
            urlencoding::encode(table_name)
        );
        Self {
            id: None,
            parent_id: parent_id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            url,
            form_table: table_name.to_string(),
        }
    }
}
