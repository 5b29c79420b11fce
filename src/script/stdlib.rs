//! Built-in functions, operators, and per-type method tables.
//!
//! Mirrors the restricted builtin environment of the reference sandbox
//! (`_create_restricted_builtins`) as a fixed table of pragmatic built-ins
//! rather than reproducing full object-method dispatch.

use std::rc::Rc;

use crate::script::ast::{BinOp, CompareOp, UnaryOp};
use crate::script::value::{BuiltinFunction, ExceptionValue, Value, ValueKey};

type MResult<T> = Result<T, String>;

/// Exception classes the restricted sandbox exposes as callable constructors,
/// mirroring `_create_restricted_builtins`'s exception entries in the
/// reference sandbox. `raise ValueError("...")` in candidate code calls one
/// of these to build the `Value::Exception` a `raise` statement consumes.
const EXCEPTION_KINDS: &[&str] = &[
    "Exception",
    "ValueError",
    "TypeError",
    "KeyError",
    "IndexError",
    "AttributeError",
    "RuntimeError",
    "StopIteration",
    "ZeroDivisionError",
    "AssertionError",
    "NotImplementedError",
];

fn exception_constructor(kind: &'static str) -> Value {
    Value::Builtin(Rc::new(BuiltinFunction {
        name: kind,
        arity: None,
        call: Box::new(move |args: Vec<Value>| {
            let message = match args.first() {
                Some(v) => v.to_display_string(),
                None => String::new(),
            };
            Ok(Value::Exception(Rc::new(ExceptionValue {
                kind: kind.to_string(),
                message,
            })))
        }),
    }))
}

pub fn apply_unary(op: UnaryOp, v: &Value) -> MResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Neg => match v {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
            other => Err(format!("bad operand type for unary -: '{}'", other.type_name())),
        },
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn is_float_op(a: &Value, b: &Value) -> bool {
    matches!(a, Value::Float(_)) || matches!(b, Value::Float(_))
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

pub fn apply_binop(op: BinOp, l: &Value, r: &Value) -> MResult<Value> {
    if op == BinOp::Add {
        if let (Value::Str(a), Value::Str(b)) = (l, r) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        if let (Value::List(a), Value::List(b)) = (l, r) {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            return Ok(Value::new_list(items));
        }
    }
    if op == BinOp::Mul {
        if let (Value::Str(s), other) | (other, Value::Str(s)) = (l, r) {
            if let Some(n) = as_i64(other) {
                return Ok(Value::Str(s.repeat(n.max(0) as usize)));
            }
        }
        if let (Value::List(list), other) | (other, Value::List(list)) = (l, r) {
            if let Some(n) = as_i64(other) {
                let mut items = Vec::new();
                for _ in 0..n.max(0) {
                    items.extend(list.borrow().iter().cloned());
                }
                return Ok(Value::new_list(items));
            }
        }
    }

    let (lf, rf) = match (as_f64(l), as_f64(r)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(format!(
                "unsupported operand type(s) for {:?}: '{}' and '{}'",
                op,
                l.type_name(),
                r.type_name()
            ))
        }
    };

    if is_float_op(l, r) || op == BinOp::Div {
        return Ok(match op {
            BinOp::Add => Value::Float(lf + rf),
            BinOp::Sub => Value::Float(lf - rf),
            BinOp::Mul => Value::Float(lf * rf),
            BinOp::Div => {
                if rf == 0.0 {
                    return Err("division by zero".to_string());
                }
                Value::Float(lf / rf)
            }
            BinOp::FloorDiv => Value::Float((lf / rf).floor()),
            BinOp::Mod => Value::Float(lf.rem_euclid(rf)),
            BinOp::Pow => Value::Float(lf.powf(rf)),
        });
    }

    let (li, ri) = (as_i64(l).unwrap(), as_i64(r).unwrap());
    Ok(match op {
        BinOp::Add => Value::Int(li + ri),
        BinOp::Sub => Value::Int(li - ri),
        BinOp::Mul => Value::Int(li * ri),
        BinOp::FloorDiv => {
            if ri == 0 {
                return Err("integer division or modulo by zero".to_string());
            }
            Value::Int(li.div_euclid(ri))
        }
        BinOp::Mod => {
            if ri == 0 {
                return Err("integer division or modulo by zero".to_string());
            }
            Value::Int(li.rem_euclid(ri))
        }
        BinOp::Pow => {
            if ri >= 0 {
                Value::Int(li.pow(ri as u32))
            } else {
                Value::Float((li as f64).powf(ri as f64))
            }
        }
        BinOp::Div => unreachable!(),
    })
}

pub fn apply_compare(op: CompareOp, l: &Value, r: &Value) -> MResult<bool> {
    match op {
        CompareOp::Eq => return Ok(l.structural_eq(r)),
        CompareOp::NotEq => return Ok(!l.structural_eq(r)),
        CompareOp::In => return Ok(contains(r, l)?),
        CompareOp::NotIn => return Ok(!contains(r, l)?),
        _ => {}
    }
    let ordering = match (l, r) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => {
            let (a, b) = (
                as_f64(l).ok_or_else(|| format!("'<' not supported for '{}'", l.type_name()))?,
                as_f64(r).ok_or_else(|| format!("'<' not supported for '{}'", r.type_name()))?,
            );
            a.partial_cmp(&b)
        }
    };
    let ordering = ordering.ok_or("cannot compare values")?;
    Ok(match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::LtE => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::GtE => ordering.is_ge(),
        _ => unreachable!(),
    })
}

fn contains(container: &Value, needle: &Value) -> MResult<bool> {
    match container {
        Value::List(l) => Ok(l.borrow().iter().any(|v| v.structural_eq(needle))),
        Value::Tuple(t) => Ok(t.iter().any(|v| v.structural_eq(needle))),
        Value::Str(s) => {
            if let Value::Str(sub) = needle {
                Ok(s.contains(sub.as_str()))
            } else {
                Err("'in <string>' requires string as left operand".to_string())
            }
        }
        Value::Dict(d) => {
            let key = needle.as_key()?;
            Ok(d.borrow().contains_key(&key))
        }
        other => Err(format!("argument of type '{}' is not iterable", other.type_name())),
    }
}

pub fn get_index(base: &Value, index: &Value) -> MResult<Value> {
    match base {
        Value::List(l) => {
            let list = l.borrow();
            let i = normalize_index(as_i64(index).ok_or("list indices must be integers")?, list.len())?;
            list.get(i).cloned().ok_or_else(|| "list index out of range".to_string())
        }
        Value::Tuple(t) => {
            let i = normalize_index(as_i64(index).ok_or("tuple indices must be integers")?, t.len())?;
            t.get(i).cloned().ok_or_else(|| "tuple index out of range".to_string())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(as_i64(index).ok_or("string indices must be integers")?, chars.len())?;
            chars.get(i).map(|c| Value::Str(c.to_string())).ok_or_else(|| "string index out of range".to_string())
        }
        Value::Dict(d) => {
            let key = index.as_key()?;
            d.borrow().get(&key).cloned().ok_or_else(|| format!("key not found: {}", index.repr()))
        }
        other => Err(format!("'{}' object is not subscriptable", other.type_name())),
    }
}

pub fn set_index(base: &Value, index: &Value, value: Value) -> MResult<()> {
    match base {
        Value::List(l) => {
            let mut list = l.borrow_mut();
            let i = normalize_index(as_i64(index).ok_or("list indices must be integers")?, list.len())?;
            if i >= list.len() {
                return Err("list assignment index out of range".to_string());
            }
            list[i] = value;
            Ok(())
        }
        Value::Dict(d) => {
            let key = index.as_key()?;
            d.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(format!("'{}' object does not support item assignment", other.type_name())),
    }
}

fn normalize_index(i: i64, len: usize) -> MResult<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 {
        return Err("index out of range".to_string());
    }
    Ok(idx as usize)
}

pub fn call_method(base: &Value, method: &str, args: Vec<Value>) -> MResult<Value> {
    match base {
        Value::List(l) => list_method(l, method, args),
        Value::Dict(d) => dict_method(d, method, args),
        Value::Str(s) => str_method(s, method, args),
        other => Err(format!("'{}' object has no attribute '{}'", other.type_name(), method)),
    }
}

fn list_method(l: &crate::script::value::ListRef, method: &str, mut args: Vec<Value>) -> MResult<Value> {
    match method {
        "append" => {
            l.borrow_mut().push(args.pop().ok_or("append() missing argument")?);
            Ok(Value::None)
        }
        "sort" => {
            let mut items = l.borrow().clone();
            items.sort_by(|a, b| {
                apply_compare(CompareOp::Lt, a, b)
                    .map(|lt| if lt { std::cmp::Ordering::Less } else { std::cmp::Ordering::Greater })
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            *l.borrow_mut() = items;
            Ok(Value::None)
        }
        "reverse" => {
            l.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => Ok(Value::new_list(l.borrow().clone())),
        "index" => {
            let target = args.first().ok_or("index() missing argument")?;
            l.borrow()
                .iter()
                .position(|v| v.structural_eq(target))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| "value not in list".to_string())
        }
        "count" => {
            let target = args.first().ok_or("count() missing argument")?;
            let n = l.borrow().iter().filter(|v| v.structural_eq(target)).count();
            Ok(Value::Int(n as i64))
        }
        "pop" => {
            let mut items = l.borrow_mut();
            if let Some(idx) = args.first() {
                let i = normalize_index(as_i64(idx).ok_or("pop index must be integer")?, items.len())?;
                if i >= items.len() {
                    return Err("pop index out of range".to_string());
                }
                Ok(items.remove(i))
            } else {
                items.pop().ok_or_else(|| "pop from empty list".to_string())
            }
        }
        other => Err(format!("'list' object has no attribute '{}'", other)),
    }
}

fn dict_method(d: &crate::script::value::DictRef, method: &str, args: Vec<Value>) -> MResult<Value> {
    match method {
        "get" => {
            let key = args.first().ok_or("get() missing argument")?.as_key()?;
            Ok(d.borrow()
                .get(&key)
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "keys" => Ok(Value::new_list(
            d.borrow()
                .keys()
                .map(|k| match k {
                    ValueKey::Int(i) => Value::Int(*i),
                    ValueKey::Str(s) => Value::Str(s.clone()),
                })
                .collect(),
        )),
        "values" => Ok(Value::new_list(d.borrow().values().cloned().collect())),
        "items" => Ok(Value::new_list(
            d.borrow()
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        ValueKey::Int(i) => Value::Int(*i),
                        ValueKey::Str(s) => Value::Str(s.clone()),
                    };
                    Value::Tuple(Rc::new(vec![key, v.clone()]))
                })
                .collect(),
        )),
        "pop" => {
            let key = args.first().ok_or("pop() missing argument")?.as_key()?;
            d.borrow_mut()
                .remove(&key)
                .or_else(|| args.get(1).cloned())
                .ok_or_else(|| "key not found".to_string())
        }
        "copy" => Ok(Value::Dict(Rc::new(std::cell::RefCell::new(d.borrow().clone())))),
        other => Err(format!("'dict' object has no attribute '{}'", other)),
    }
}

fn str_method(s: &str, method: &str, args: Vec<Value>) -> MResult<Value> {
    match method {
        "lower" => Ok(Value::Str(s.to_lowercase())),
        "upper" => Ok(Value::Str(s.to_uppercase())),
        "strip" => Ok(Value::Str(s.trim().to_string())),
        "split" => {
            let sep = args.first().and_then(|v| match v {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            });
            let parts: Vec<Value> = match sep {
                Some(sep) if !sep.is_empty() => s.split(sep.as_str()).map(|p| Value::Str(p.to_string())).collect(),
                _ => s.split_whitespace().map(|p| Value::Str(p.to_string())).collect(),
            };
            Ok(Value::new_list(parts))
        }
        "join" => {
            let items = args.first().ok_or("join() missing argument")?;
            if let Value::List(l) = items {
                let parts: Result<Vec<String>, String> = l
                    .borrow()
                    .iter()
                    .map(|v| match v {
                        Value::Str(s) => Ok(s.clone()),
                        other => Err(format!("sequence item: expected str, got '{}'", other.type_name())),
                    })
                    .collect();
                Ok(Value::Str(parts?.join(s)))
            } else {
                Err("join() argument must be a list".to_string())
            }
        }
        "replace" => {
            let from = match args.first() {
                Some(Value::Str(s)) => s.clone(),
                _ => return Err("replace() requires string arguments".to_string()),
            };
            let to = match args.get(1) {
                Some(Value::Str(s)) => s.clone(),
                _ => return Err("replace() requires string arguments".to_string()),
            };
            Ok(Value::Str(s.replace(&from, &to)))
        }
        "startswith" => match args.first() {
            Some(Value::Str(prefix)) => Ok(Value::Bool(s.starts_with(prefix.as_str()))),
            _ => Err("startswith() requires a string argument".to_string()),
        },
        "endswith" => match args.first() {
            Some(Value::Str(suffix)) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
            _ => Err("endswith() requires a string argument".to_string()),
        },
        other => Err(format!("'str' object has no attribute '{}'", other)),
    }
}

pub fn lookup_builtin(name: &str) -> Option<Value> {
    macro_rules! builtin {
        ($name:expr, $arity:expr, $body:expr) => {
            Value::Builtin(Rc::new(BuiltinFunction {
                name: $name,
                arity: $arity,
                call: Box::new($body),
            }))
        };
    }

    Some(match name {
        "len" => builtin!("len", Some(1), |args: Vec<Value>| match &args[0] {
            Value::List(l) => Ok(Value::Int(l.borrow().len() as i64)),
            Value::Dict(d) => Ok(Value::Int(d.borrow().len() as i64)),
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Tuple(t) => Ok(Value::Int(t.len() as i64)),
            other => Err(format!("object of type '{}' has no len()", other.type_name())),
        }),
        "range" => builtin!("range", None, |args: Vec<Value>| {
            let (start, stop, step) = match args.len() {
                1 => (0, as_i64_checked(&args[0])?, 1),
                2 => (as_i64_checked(&args[0])?, as_i64_checked(&args[1])?, 1),
                3 => (
                    as_i64_checked(&args[0])?,
                    as_i64_checked(&args[1])?,
                    as_i64_checked(&args[2])?,
                ),
                _ => return Err("range() expects 1 to 3 arguments".to_string()),
            };
            if step == 0 {
                return Err("range() arg 3 must not be zero".to_string());
            }
            let mut items = Vec::new();
            let mut i = start;
            if step > 0 {
                while i < stop {
                    items.push(Value::Int(i));
                    i += step;
                }
            } else {
                while i > stop {
                    items.push(Value::Int(i));
                    i += step;
                }
            }
            Ok(Value::new_list(items))
        }),
        "str" => builtin!("str", Some(1), |args: Vec<Value>| Ok(Value::Str(args[0].to_display_string()))),
        "int" => builtin!("int", Some(1), |args: Vec<Value>| match &args[0] {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) => Ok(Value::Int(*f as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| format!("invalid literal for int(): '{}'", s)),
            other => Err(format!("int() argument must be a string or number, not '{}'", other.type_name())),
        }),
        "float" => builtin!("float", Some(1), |args: Vec<Value>| match &args[0] {
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            Value::Float(f) => Ok(Value::Float(*f)),
            Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| format!("invalid literal for float(): '{}'", s)),
            other => Err(format!("float() argument must be a string or number, not '{}'", other.type_name())),
        }),
        "bool" => builtin!("bool", Some(1), |args: Vec<Value>| Ok(Value::Bool(args[0].is_truthy()))),
        "list" => builtin!("list", Some(1), |args: Vec<Value>| match &args[0] {
            Value::List(l) => Ok(Value::new_list(l.borrow().clone())),
            Value::Tuple(t) => Ok(Value::new_list(t.as_ref().clone())),
            Value::Str(s) => Ok(Value::new_list(s.chars().map(|c| Value::Str(c.to_string())).collect())),
            other => Err(format!("'{}' object is not iterable", other.type_name())),
        }),
        "dict" => builtin!("dict", Some(0), |_args: Vec<Value>| Ok(Value::new_dict(vec![]))),
        "abs" => builtin!("abs", Some(1), |args: Vec<Value>| match &args[0] {
            Value::Int(i) => Ok(Value::Int(i.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(format!("bad operand type for abs(): '{}'", other.type_name())),
        }),
        "round" => builtin!("round", None, |args: Vec<Value>| {
            let v = as_f64(&args[0]).ok_or("round() requires a numeric argument")?;
            if let Some(ndigits) = args.get(1) {
                let n = as_i64(ndigits).ok_or("ndigits must be an integer")?;
                let factor = 10f64.powi(n as i32);
                Ok(Value::Float((v * factor).round() / factor))
            } else {
                Ok(Value::Int(v.round() as i64))
            }
        }),
        "max" => builtin!("max", None, |args: Vec<Value>| reduce_cmp(args, true)),
        "min" => builtin!("min", None, |args: Vec<Value>| reduce_cmp(args, false)),
        "sum" => builtin!("sum", Some(1), |args: Vec<Value>| {
            let items = match &args[0] {
                Value::List(l) => l.borrow().clone(),
                Value::Tuple(t) => t.as_ref().clone(),
                other => return Err(format!("'{}' object is not iterable", other.type_name())),
            };
            let mut acc = Value::Int(0);
            for item in items {
                acc = apply_binop(BinOp::Add, &acc, &item)?;
            }
            Ok(acc)
        }),
        "sorted" => builtin!("sorted", Some(1), |args: Vec<Value>| {
            let mut items = match &args[0] {
                Value::List(l) => l.borrow().clone(),
                Value::Tuple(t) => t.as_ref().clone(),
                other => return Err(format!("'{}' object is not iterable", other.type_name())),
            };
            items.sort_by(|a, b| {
                apply_compare(CompareOp::Lt, a, b)
                    .map(|lt| if lt { std::cmp::Ordering::Less } else { std::cmp::Ordering::Greater })
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            Ok(Value::new_list(items))
        }),
        "enumerate" => builtin!("enumerate", Some(1), |args: Vec<Value>| {
            let items = match &args[0] {
                Value::List(l) => l.borrow().clone(),
                Value::Tuple(t) => t.as_ref().clone(),
                other => return Err(format!("'{}' object is not iterable", other.type_name())),
            };
            let pairs = items
                .into_iter()
                .enumerate()
                .map(|(i, v)| Value::Tuple(Rc::new(vec![Value::Int(i as i64), v])))
                .collect();
            Ok(Value::new_list(pairs))
        }),
        "zip" => builtin!("zip", None, |args: Vec<Value>| {
            let lists: Result<Vec<Vec<Value>>, String> = args
                .iter()
                .map(|v| match v {
                    Value::List(l) => Ok(l.borrow().clone()),
                    Value::Tuple(t) => Ok(t.as_ref().clone()),
                    other => Err(format!("'{}' object is not iterable", other.type_name())),
                })
                .collect();
            let lists = lists?;
            let len = lists.iter().map(|l| l.len()).min().unwrap_or(0);
            let mut out = Vec::new();
            for i in 0..len {
                out.push(Value::Tuple(Rc::new(lists.iter().map(|l| l[i].clone()).collect())));
            }
            Ok(Value::new_list(out))
        }),
        _ => {
            if let Some(kind) = EXCEPTION_KINDS.iter().find(|k| **k == name) {
                return Some(exception_constructor(kind));
            }
            return None;
        }
    })
}

fn as_i64_checked(v: &Value) -> MResult<i64> {
    as_i64(v).ok_or_else(|| format!("expected an integer, got '{}'", v.type_name()))
}

fn reduce_cmp(args: Vec<Value>, want_max: bool) -> MResult<Value> {
    let items: Vec<Value> = if args.len() == 1 {
        match &args[0] {
            Value::List(l) => l.borrow().clone(),
            Value::Tuple(t) => t.as_ref().clone(),
            other => return Err(format!("'{}' object is not iterable", other.type_name())),
        }
    } else {
        args
    };
    let mut iter = items.into_iter();
    let mut best = iter.next().ok_or("arg is an empty sequence")?;
    for item in iter {
        let lt = apply_compare(CompareOp::Lt, &best, &item)?;
        if (want_max && lt) || (!want_max && !lt && !best.structural_eq(&item)) {
            best = item;
        }
    }
    Ok(best)
}
