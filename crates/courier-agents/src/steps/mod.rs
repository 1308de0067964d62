//! The common step implementations agents are assembled from.

pub mod intent;
pub mod respond;
pub mod tools;

pub use intent::IntentStep;
pub use respond::RespondStep;
pub use tools::ToolsStep;

use serde_json::Value;

fn user_message(inputs: &Value) -> &str {
    inputs
        .get("user_message")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Restrict a catalog listing to the given backend ids. An empty id
/// list means no restriction.
fn scoped<T>(catalog: Vec<(String, String, T)>, servers: &[String]) -> Vec<(String, String, T)> {
    if servers.is_empty() {
        return catalog;
    }
    catalog
        .into_iter()
        .filter(|(_, owner, _)| servers.iter().any(|id| id == owner))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::scoped;

    #[test]
    fn test_scoped_filters_by_owning_backend() {
        let catalog = vec![
            ("calc:add".to_string(), "calc".to_string(), ()),
            ("notes:save".to_string(), "notes".to_string(), ()),
        ];

        assert_eq!(scoped(catalog.clone(), &[]).len(), 2);

        let only = scoped(catalog, &["notes".to_string()]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].0, "notes:save");
    }
}
