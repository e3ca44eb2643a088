use gitpilot_github::RepoRef;
use serde_json::{json, Map, Value};

use crate::envelope::ToolFailure;

pub(crate) const DEFAULT_BRANCH: &str = "main";

pub(crate) fn required_string(arguments: &Value, key: &str) -> Result<String, ToolFailure> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(|value| value.to_string())
        .ok_or_else(|| {
            ToolFailure::invalid_argument(format!("missing required string argument '{key}'"))
        })
}

pub(crate) fn required_non_empty_string(arguments: &Value, key: &str) -> Result<String, ToolFailure> {
    let value = required_string(arguments, key)?;
    if value.trim().is_empty() {
        return Err(ToolFailure::invalid_argument(format!(
            "argument '{key}' must not be empty"
        )));
    }
    Ok(value)
}

pub(crate) fn optional_string(arguments: &Value, key: &str) -> Result<Option<String>, ToolFailure> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ToolFailure::invalid_argument(format!(
            "optional argument '{key}' must be a string"
        ))),
    }
}

pub(crate) fn optional_usize(
    arguments: &Value,
    key: &str,
    max: usize,
) -> Result<Option<usize>, ToolFailure> {
    let Some(value) = arguments.get(key).filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    let parsed = value.as_u64().ok_or_else(|| {
        ToolFailure::invalid_argument(format!("optional argument '{key}' must be an integer"))
    })? as usize;
    if parsed == 0 {
        return Err(ToolFailure::invalid_argument(format!(
            "optional argument '{key}' must be greater than 0"
        )));
    }
    if parsed > max {
        return Err(ToolFailure::invalid_argument(format!(
            "optional argument '{key}' exceeds maximum {max}"
        )));
    }
    Ok(Some(parsed))
}

pub(crate) fn repo_arg(arguments: &Value) -> Result<RepoRef, ToolFailure> {
    Ok(RepoRef::new(
        required_non_empty_string(arguments, "owner")?,
        required_non_empty_string(arguments, "repo")?,
    ))
}

pub(crate) fn branch_arg(arguments: &Value) -> Result<String, ToolFailure> {
    Ok(optional_string(arguments, "branch")?
        .filter(|branch| !branch.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string()))
}

/// Object schema with the `owner`/`repo`/`branch` triple plus tool-specific properties.
pub(crate) fn repo_schema(properties: Value, required: &[&str], with_branch: bool) -> Value {
    let mut merged = Map::new();
    merged.insert(
        "owner".to_string(),
        json!({ "type": "string", "description": "Repository owner (user or organization)" }),
    );
    merged.insert(
        "repo".to_string(),
        json!({ "type": "string", "description": "Repository name" }),
    );
    if with_branch {
        merged.insert(
            "branch".to_string(),
            json!({ "type": "string", "description": "Branch name, defaults to main" }),
        );
    }
    if let Value::Object(extra) = properties {
        merged.extend(extra);
    }

    let mut required_fields = vec!["owner", "repo"];
    required_fields.extend_from_slice(required);
    json!({
        "type": "object",
        "properties": merged,
        "required": required_fields,
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{branch_arg, optional_usize, repo_arg, repo_schema};

    #[test]
    fn unit_branch_defaults_to_main_when_absent_or_blank() {
        assert_eq!(branch_arg(&json!({})).expect("default"), "main");
        assert_eq!(branch_arg(&json!({ "branch": " " })).expect("blank"), "main");
        assert_eq!(branch_arg(&json!({ "branch": "dev" })).expect("dev"), "dev");
    }

    #[test]
    fn regression_repo_arg_rejects_blank_owner() {
        let failure = repo_arg(&json!({ "owner": "", "repo": "demo" })).expect_err("blank owner");
        assert_eq!(failure.kind, "invalid_argument");
    }

    #[test]
    fn unit_optional_usize_bounds() {
        assert_eq!(optional_usize(&json!({}), "max_length", 10).expect("absent"), None);
        assert_eq!(
            optional_usize(&json!({ "max_length": 5 }), "max_length", 10).expect("five"),
            Some(5)
        );
        assert!(optional_usize(&json!({ "max_length": 0 }), "max_length", 10).is_err());
        assert!(optional_usize(&json!({ "max_length": 11 }), "max_length", 10).is_err());
    }

    #[test]
    fn unit_repo_schema_merges_properties_and_required_fields() {
        let schema = repo_schema(
            json!({ "path": { "type": "string" } }),
            &["path"],
            true,
        );
        assert_eq!(schema["required"], json!(["owner", "repo", "path"]));
        assert!(schema["properties"]["branch"].is_object());
        assert!(schema["properties"]["path"].is_object());
    }
}
