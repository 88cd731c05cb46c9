use fncall::function::AgentFunction;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
struct CountWordsInput {
    text: String,
}

#[derive(Debug, Serialize)]
struct CountWordsOutput {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct AddInput {
    a: f64,
    b: f64,
}

pub fn count_words() -> AgentFunction {
    AgentFunction::new(
        "count_words",
        "Count the number of words in text",
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to count words in"
                }
            },
            "required": ["text"]
        }),
        |input: CountWordsInput| async move {
            anyhow::Ok(CountWordsOutput {
                count: input.text.split_whitespace().count(),
            })
        },
    )
}

pub fn add() -> AgentFunction {
    AgentFunction::new(
        "add",
        "Add two numbers and return the sum",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "description": "The first number"},
                "b": {"type": "number", "description": "The second number"}
            },
            "required": ["a", "b"],
            "additionalProperties": false
        }),
        |input: AddInput| async move { anyhow::Ok(input.a + input.b) },
    )
}

/// Every function the CLI offers, in the order they are enabled
pub fn all() -> Vec<AgentFunction> {
    vec![count_words(), add()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fncall::errors::AgentError;

    #[tokio::test]
    async fn test_count_words() {
        let output = count_words()
            .run(json!({"text": "the quick  brown fox"}))
            .await
            .unwrap();
        assert_eq!(output, json!({"count": 4}));
    }

    #[tokio::test]
    async fn test_add() {
        let output = add().run(json!({"a": 2, "b": 0.5})).await.unwrap();
        assert_eq!(output, json!(2.5));

        let err = add().run(json!({"a": 2})).await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn test_all_in_enable_order() {
        let names: Vec<_> = all().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, ["count_words", "add"]);
    }
}
