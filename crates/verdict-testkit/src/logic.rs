//! Principal combination expressions
//!
//! Evaluates the JSON-logic subset used by `PRINCIPAL_BOOLEAN_OPERATION`:
//! `and`, `or`, `!`, `==`/`===`/`!=`/`!==`, `var` lookups of principal
//! verdicts (`"ALLOW"`/`"DENY"`), and literals.

use indexmap::IndexMap;
use serde_json::Value;

use verdict_core::EntityVerdict;

/// Evaluate `expr` against per-principal verdicts.
pub fn evaluate(expr: &Value, verdicts: &IndexMap<String, EntityVerdict>) -> Result<bool, String> {
    match resolve(expr, verdicts)? {
        Value::Bool(b) => Ok(b),
        other => Err(format!("principal expression evaluated to non-boolean {other}")),
    }
}

fn resolve(expr: &Value, verdicts: &IndexMap<String, EntityVerdict>) -> Result<Value, String> {
    let Value::Object(op) = expr else {
        return Ok(expr.clone());
    };
    let mut entries = op.iter();
    let (name, args) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(format!("expected a single operator, got {expr}")),
    };

    match name.as_str() {
        "var" => {
            let key = args
                .as_str()
                .ok_or_else(|| format!("`var` expects a principal type, got {args}"))?;
            let verdict = verdicts
                .get(key)
                .ok_or_else(|| format!("principal `{key}` was not evaluated"))?;
            Ok(Value::from(if verdict.is_allowed() { "ALLOW" } else { "DENY" }))
        }
        "and" => {
            for arg in operands(args) {
                if !evaluate(arg, verdicts)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "or" => {
            for arg in operands(args) {
                if evaluate(arg, verdicts)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "!" => {
            let inner = operands(args)
                .first()
                .copied()
                .ok_or_else(|| "`!` expects one operand".to_string())?;
            Ok(Value::Bool(!evaluate(inner, verdicts)?))
        }
        "==" | "===" | "!=" | "!==" => {
            let pair = operands(args);
            let [lhs, rhs] = pair.as_slice() else {
                return Err(format!("`{name}` expects two operands"));
            };
            let equal = resolve(lhs, verdicts)? == resolve(rhs, verdicts)?;
            Ok(Value::Bool(if name.starts_with('!') { !equal } else { equal }))
        }
        other => Err(format!("unsupported operator `{other}`")),
    }
}

fn operands(args: &Value) -> Vec<&Value> {
    match args {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    }
}
