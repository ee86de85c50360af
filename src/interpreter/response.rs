//! Response boundary
//!
//! The HTTP layer owns the wire format. This module only turns a fully
//! evaluated result, or a failure, into a status code and a JSON body.

use serde::{Deserialize, Serialize};

use super::error::{ActionError, Result};

/// Status and serialized body produced at the application boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// JSON body
    pub body: serde_json::Value,
}

impl Response {
    /// Build a `200 OK` response from a serializable value.
    pub fn ok<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            status: 200,
            body: serde_json::to_value(value)?,
        })
    }

    /// Build an error response describing a failed evaluation.
    pub fn from_error(err: &ActionError) -> Self {
        let status = match err {
            ActionError::Handler { .. } => 502,
            _ => 500,
        };
        let mut body = serde_json::json!({ "error": err.to_string() });
        if let Some(action) = err.type_name() {
            body["action"] = serde_json::Value::from(action);
        }
        Self { status, body }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Leaf, LeafExt};
    use crate::interpreter::{Evaluate, Interpreter};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Count;

    impl Leaf for Count {
        type Output = Vec<u32>;
    }

    #[test]
    fn test_evaluate_to_response() {
        let interpreter = Interpreter::new().on::<Count>().returns(vec![1, 2]);
        let response = interpreter.evaluate_to_response(&Count.action()).unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_failure_propagates_instead_of_responding() {
        let interpreter = Interpreter::new();
        let err = interpreter
            .evaluate_to_response(&Count.action().map(|v| v.len()))
            .unwrap_err();
        assert!(matches!(err, ActionError::Unhandled { .. }));
    }

    #[test]
    fn test_error_response_names_action() {
        let err = ActionError::NoResult { type_name: "Count" };
        let response = Response::from_error(&err);

        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        assert_eq!(response.body["action"], "Count");
    }

    #[test]
    fn test_pure_response() {
        let interpreter = Interpreter::new();
        let response = interpreter
            .evaluate_to_response(&Action::pure("done".to_string()))
            .unwrap();
        assert_eq!(response.body, serde_json::json!("done"));
    }
}
