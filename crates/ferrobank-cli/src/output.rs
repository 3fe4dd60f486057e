use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

/// Payload of one command plus non-fatal warnings.
#[derive(Debug, Serialize)]
pub struct CommandResult {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Exit with the partial-failure code after rendering.
    #[serde(skip)]
    pub partial_failure: bool,
}

impl CommandResult {
    pub fn ok(data: impl Serialize) -> Result<Self, CliError> {
        Ok(Self {
            data: serde_json::to_value(data)?,
            warnings: Vec::new(),
            partial_failure: false,
        })
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_partial_failure(mut self, partial_failure: bool) -> Self {
        self.partial_failure = partial_failure;
        self
    }
}

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn warnings_are_omitted_when_empty() {
        let result = CommandResult::ok(json!({"count": 1})).expect("serializable");

        let rendered = serde_json::to_value(&result).expect("json");

        assert_eq!(rendered, json!({"data": {"count": 1}}));
    }

    #[test]
    fn partial_failure_is_not_serialized() {
        let result = CommandResult::ok(json!([]))
            .expect("serializable")
            .with_warning("vbank: api.unauthorized")
            .with_partial_failure(true);

        let rendered = serde_json::to_value(&result).expect("json");

        assert_eq!(rendered, json!({"data": [], "warnings": ["vbank: api.unauthorized"]}));
    }
}
