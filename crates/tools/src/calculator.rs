//! Calculator tool: binary arithmetic on two numbers.
//!
//! Models are unreliable at arithmetic on long decimals; this gives them an
//! exact answer. Division by zero fails the call.

use async_stream::try_stream;
use botty_core::error::ToolError;
use botty_core::tool::{Tool, ToolContext, ToolStream, ToolUpdate};
use futures::StreamExt;
use serde::Deserialize;

use crate::parse_input;

pub struct CalculatorTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    fn symbol(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '*',
            Operation::Divide => '/',
        }
    }
}

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    first_number: f64,
    second_number: f64,
    operation: Operation,
}

/// Apply `op` to `x` and `y`.
pub fn calculate(x: f64, y: f64, op: Operation) -> Result<f64, String> {
    let value = match op {
        Operation::Add => x + y,
        Operation::Subtract => x - y,
        Operation::Multiply => x * y,
        Operation::Divide if y == 0.0 => return Err("Division by zero".into()),
        Operation::Divide => x / y,
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("Result of {x} {} {y} is out of range", op.symbol()))
    }
}

/// Whole numbers come back as JSON integers, everything else as floats.
fn to_json_number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        serde_json::json!(value as i64)
    } else {
        serde_json::json!(value)
    }
}

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform mathematical operations with error handling and precision tracking"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "first_number": {
                    "type": "number",
                    "description": "First operand for the calculation"
                },
                "second_number": {
                    "type": "number",
                    "description": "Second operand for the calculation"
                },
                "operation": {
                    "type": "string",
                    "description": "Mathematical operation to perform",
                    "enum": ["add", "subtract", "multiply", "divide"]
                }
            },
            "required": ["first_number", "second_number", "operation"]
        })
    }

    fn execute<'a>(&'a self, _ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
        try_stream! {
            let CalculatorInput { first_number: x, second_number: y, operation } = parse_input(input)?;
            let value = calculate(x, y, operation).map_err(|reason| ToolError::ExecutionFailed {
                tool_name: "calculator".into(),
                reason,
            })?;
            let result = to_json_number(value);
            yield ToolUpdate::done(
                format!("✅ Calculated `{x} {} {y} = {result}`.", operation.symbol()),
                result,
            );
        }
        .boxed()
    }
}
