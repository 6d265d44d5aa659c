//! Assertions over aggregated pipeline outputs.

use crate::pipeline::PipelineOutputs;

/// Asserts that `component.socket` was aggregated with the expected value.
pub fn assert_output(outputs: &PipelineOutputs, component: &str, socket: &str, expected: &serde_json::Value) {
    let actual = outputs.get(component).and_then(|sockets| sockets.get(socket));
    assert_eq!(
        actual,
        Some(expected),
        "Expected {component}.{socket} = {expected}, got {actual:?}. Components: {:?}",
        outputs.keys().collect::<Vec<_>>()
    );
}

/// Asserts that a component contributed nothing to the outputs.
pub fn assert_component_absent(outputs: &PipelineOutputs, component: &str) {
    assert!(
        !outputs.contains_key(component),
        "Expected no outputs from '{component}', got {:?}",
        outputs.get(component)
    );
}

/// Asserts that a component's outputs do not contain `socket`.
pub fn assert_socket_absent(outputs: &PipelineOutputs, component: &str, socket: &str) {
    let value = outputs.get(component).and_then(|sockets| sockets.get(socket));
    assert!(value.is_none(), "Expected no {component}.{socket}, got {value:?}");
}

/// Asserts the number of components present in the outputs.
pub fn assert_output_len(outputs: &PipelineOutputs, expected: usize) {
    assert_eq!(
        outputs.len(),
        expected,
        "Expected {expected} components in outputs, got {:?}",
        outputs.keys().collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentOutputs;
    use serde_json::json;

    fn outputs() -> PipelineOutputs {
        PipelineOutputs::from([(
            "add".to_string(),
            ComponentOutputs::from([("result".to_string(), json!(3))]),
        )])
    }

    #[test]
    fn test_assertions_pass() {
        let outputs = outputs();
        assert_output(&outputs, "add", "result", &json!(3));
        assert_component_absent(&outputs, "other");
        assert_socket_absent(&outputs, "add", "value");
        assert_output_len(&outputs, 1);
    }

    #[test]
    #[should_panic(expected = "Expected add.result = 4")]
    fn test_assert_output_fails() {
        assert_output(&outputs(), "add", "result", &json!(4));
    }
}
