//! Built-in native members: ``List`1``, `string`, `Math` and the members every
//! value has (`ToString`, `Equals`).

use nodegraph_core::types::{natives, ConstValue, TypeRef};

use crate::error::RuntimeError;
use crate::value::{ListRef, Value};

/// Name of the static math helper type.
pub const MATH: &str = "Math";

/// The definition name of a type: ``List`1`` for ``List`1[int]``.
pub fn definition_name(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Generic { definition, .. } => definition.to_string(),
        other => other.to_string(),
    }
}

fn unresolved(owner: &TypeRef, name: &str) -> RuntimeError {
    RuntimeError::UnresolvedMember {
        owner: owner.to_string(),
        member: name.to_string(),
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::ArgumentCount {
            function: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn index_arg(value: &Value, len: usize) -> Result<usize, RuntimeError> {
    let index = value.as_int().ok_or_else(|| RuntimeError::TypeMismatch {
        expected: natives::INT.to_string(),
        got: value.type_name(),
    })?;
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::IndexOutOfRange { index, len });
    }
    Ok(index as usize)
}

/// Reads a built-in property.
pub fn get(owner: &TypeRef, receiver: Option<&Value>, name: &str) -> Result<Value, RuntimeError> {
    match (receiver, name) {
        (Some(Value::List(list)), "Count") => Ok(Value::Int(list.lock().len() as i64)),
        (Some(Value::Str(s)), "Length") => Ok(Value::Int(s.chars().count() as i64)),
        (None, "PI") if definition_name(owner) == MATH => Ok(Value::Float(std::f64::consts::PI)),
        _ => Err(unresolved(owner, name)),
    }
}

/// Invokes a built-in method.
pub fn invoke(
    owner: &TypeRef,
    receiver: Option<&Value>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match receiver {
        Some(Value::List(list)) => {
            if let Some(result) = list_invoke(list, name, &args) {
                return result;
            }
        }
        Some(Value::Str(s)) => {
            if let Some(result) = string_invoke(s, name, &args) {
                return result;
            }
        }
        None if definition_name(owner) == MATH => return math_invoke(owner, name, &args),
        _ => {}
    }

    match (receiver, name) {
        (Some(value), "ToString") => {
            arity(name, &args, 0)?;
            Ok(Value::Str(value.to_string()))
        }
        (Some(value), "Equals") => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(*value == args[0]))
        }
        _ => Err(unresolved(owner, name)),
    }
}

/// ``List`1`` methods. Returns `None` when the name is not a list method.
pub fn list_invoke(list: &ListRef, name: &str, args: &[Value]) -> Option<Result<Value, RuntimeError>> {
    let result = match name {
        "Add" => arity(name, args, 1).map(|_| {
            list.lock().push(args[0].clone());
            Value::Null
        }),
        "Get" => arity(name, args, 1).and_then(|_| {
            let items = list.lock();
            let index = index_arg(&args[0], items.len())?;
            Ok(items[index].clone())
        }),
        "Set" => arity(name, args, 2).and_then(|_| {
            let mut items = list.lock();
            let index = index_arg(&args[0], items.len())?;
            items[index] = args[1].clone();
            Ok(Value::Null)
        }),
        "Clear" => arity(name, args, 0).map(|_| {
            list.lock().clear();
            Value::Null
        }),
        "Contains" => {
            arity(name, args, 1).map(|_| Value::Bool(list.lock().iter().any(|v| *v == args[0])))
        }
        "Remove" => arity(name, args, 1).map(|_| {
            let mut items = list.lock();
            match items.iter().position(|v| *v == args[0]) {
                Some(pos) => {
                    items.remove(pos);
                    Value::Bool(true)
                }
                None => Value::Bool(false),
            }
        }),
        _ => return None,
    };
    Some(result)
}

fn string_invoke(s: &str, name: &str, args: &[Value]) -> Option<Result<Value, RuntimeError>> {
    let result = match name {
        "ToUpper" => arity(name, args, 0).map(|_| Value::Str(s.to_uppercase())),
        "ToLower" => arity(name, args, 0).map(|_| Value::Str(s.to_lowercase())),
        "Contains" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::Str(needle) => Ok(Value::Bool(s.contains(needle.as_str()))),
            other => Err(RuntimeError::TypeMismatch {
                expected: natives::STRING.to_string(),
                got: other.type_name(),
            }),
        }),
        _ => return None,
    };
    Some(result)
}

fn math_invoke(owner: &TypeRef, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    let numeric = |value: &Value| {
        value.as_float().ok_or_else(|| RuntimeError::TypeMismatch {
            expected: natives::FLOAT.to_string(),
            got: value.type_name(),
        })
    };
    match name {
        "Max" | "Min" => {
            arity(name, args, 2)?;
            let pick_first = {
                let (a, b) = (numeric(&args[0])?, numeric(&args[1])?);
                if name == "Max" {
                    a >= b
                } else {
                    a <= b
                }
            };
            Ok(if pick_first { args[0].clone() } else { args[1].clone() })
        }
        "Abs" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::Int(v) => v.checked_abs().map(Value::Int).ok_or(RuntimeError::IntegerOverflow),
                other => Ok(Value::Float(numeric(other)?.abs())),
            }
        }
        _ => Err(unresolved(owner, name)),
    }
}

/// Constructs a built-in type.
pub fn construct(ty: &TypeRef, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let definition = definition_name(ty);
    match definition.as_str() {
        natives::LIST => match args.as_slice() {
            [] => Ok(Value::list(Vec::new())),
            [Value::List(source)] => Ok(Value::list(source.lock().clone())),
            _ => Err(RuntimeError::ArgumentCount {
                function: format!("{ty}..ctor"),
                expected: 0,
                got: args.len(),
            }),
        },
        natives::BOOL | natives::INT | natives::FLOAT | natives::STRING if args.is_empty() => {
            Ok(match ConstValue::default_for(ty) {
                ConstValue::Null => Value::Str(String::new()),
                other => Value::from_const(&other),
            })
        }
        _ => Err(RuntimeError::NotConstructible {
            type_name: ty.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_ty() -> TypeRef {
        TypeRef::list_of(TypeRef::int())
    }

    #[test]
    fn list_members() {
        let list = construct(&list_ty(), vec![]).unwrap();
        invoke(&list_ty(), Some(&list), "Add", vec![Value::Int(4)]).unwrap();
        invoke(&list_ty(), Some(&list), "Add", vec![Value::Int(9)]).unwrap();
        assert_eq!(get(&list_ty(), Some(&list), "Count").unwrap(), Value::Int(2));
        assert_eq!(
            invoke(&list_ty(), Some(&list), "Get", vec![Value::Int(1)]).unwrap(),
            Value::Int(9)
        );
        assert_eq!(
            invoke(&list_ty(), Some(&list), "Contains", vec![Value::Int(4)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn list_index_is_bounds_checked() {
        let list = Value::list(vec![Value::Int(1)]);
        let err = invoke(&list_ty(), Some(&list), "Get", vec![Value::Int(3)]).unwrap_err();
        assert!(matches!(err, RuntimeError::IndexOutOfRange { index: 3, len: 1 }));
    }

    #[test]
    fn math_keeps_integer_results() {
        let math = TypeRef::native(MATH);
        assert_eq!(
            invoke(&math, None, "Max", vec![Value::Int(2), Value::Int(7)]).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            invoke(&math, None, "Abs", vec![Value::Float(-1.5)]).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn unknown_member_is_unresolved() {
        let err = invoke(&TypeRef::string(), Some(&Value::Str("a".into())), "Frobnicate", vec![])
            .unwrap_err();
        assert!(err.is_unresolved_member());
    }
}
