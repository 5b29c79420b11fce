//! Runtime value representation for the scripting language.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::script::ast::Stmt;
use crate::types::ScriptJson;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<BTreeMap<ValueKey, Value>>>;

/// Dict keys must be hashable/orderable; the language restricts them to the
/// scalar kinds (bools coerce to the same bucket as ints, matching the
/// original language's `hash(True) == hash(1)` behavior).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueKey {
    Int(i64),
    Str(String),
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Dict(DictRef),
    Tuple(Rc<Vec<Value>>),
    Function(Rc<FunctionValue>),
    Builtin(Rc<BuiltinFunction>),
    Exception(Rc<ExceptionValue>),
}

pub struct FunctionValue {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

pub struct BuiltinFunction {
    pub name: &'static str,
    pub arity: Option<usize>,
    pub call: Box<dyn Fn(Vec<Value>) -> Result<Value, String>>,
}

/// The value a call to an exception constructor builtin (e.g. `ValueError(...)`)
/// produces. Only meaningful as the operand of a `raise` statement — the
/// interpreter turns it into a `RuntimeError { kind, message }` there; it is
/// not otherwise a usable runtime value (arithmetic, comparison, etc. reject
/// it like any other non-numeric/non-container type).
pub struct ExceptionValue {
    pub kind: String,
    pub message: String,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Tuple(_) => "tuple",
            Value::Function(_) | Value::Builtin(_) => "function",
            Value::Exception(_) => "exception",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Function(_) | Value::Builtin(_) => true,
            Value::Exception(_) => true,
        }
    }

    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_dict(entries: Vec<(ValueKey, Value)>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn as_key(&self) -> Result<ValueKey, String> {
        match self {
            Value::Int(i) => Ok(ValueKey::Int(*i)),
            Value::Bool(b) => Ok(ValueKey::Int(if *b { 1 } else { 0 })),
            Value::Str(s) => Ok(ValueKey::Str(s.clone())),
            other => Err(format!("unhashable type: '{}'", other.type_name())),
        }
    }

    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(l) => {
                Value::new_list(l.borrow().iter().map(Value::deep_copy).collect())
            }
            Value::Dict(d) => {
                let copied: BTreeMap<ValueKey, Value> = d
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect();
                Value::Dict(Rc::new(RefCell::new(copied)))
            }
            Value::Tuple(t) => Value::Tuple(Rc::new(t.iter().map(Value::deep_copy).collect())),
            other => other.clone(),
        }
    }

    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => {
                (*a as i64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|v2| v.structural_eq(v2)))
            }
            _ => false,
        }
    }

    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{}", f),
            Value::Str(s) => format!("'{}'", s),
            Value::List(l) => {
                let items: Vec<String> = l.borrow().iter().map(Value::repr).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Tuple(t) => {
                let items: Vec<String> = t.iter().map(Value::repr).collect();
                format!("({})", items.join(", "))
            }
            Value::Dict(d) => {
                let items: Vec<String> = d
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", key_repr(k), v.repr()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Function(f) => format!("<function {}>", f.name),
            Value::Builtin(f) => format!("<builtin {}>", f.name),
            Value::Exception(e) => format!("{}('{}')", e.kind, e.message),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    pub fn from_script_json(json: &ScriptJson) -> Value {
        match json {
            ScriptJson::Null => Value::None,
            ScriptJson::Bool(b) => Value::Bool(*b),
            ScriptJson::Int(i) => Value::Int(*i),
            ScriptJson::Float(f) => Value::Float(*f),
            ScriptJson::Str(s) => Value::Str(s.clone()),
            ScriptJson::List(items) => {
                Value::new_list(items.iter().map(Value::from_script_json).collect())
            }
            ScriptJson::Map(entries) => {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| (ValueKey::Str(k.clone()), Value::from_script_json(v)))
                    .collect();
                Value::new_dict(pairs)
            }

        }
    }

    pub fn to_script_json(&self) -> Result<ScriptJson, String> {
        Ok(match self {
            Value::None => ScriptJson::Null,
            Value::Bool(b) => ScriptJson::Bool(*b),
            Value::Int(i) => ScriptJson::Int(*i),
            Value::Float(f) => ScriptJson::Float(*f),
            Value::Str(s) => ScriptJson::Str(s.clone()),
            Value::List(l) => {
                let mut out = Vec::new();
                for item in l.borrow().iter() {
                    out.push(item.to_script_json()?);
                }
                ScriptJson::List(out)
            }
            Value::Tuple(t) => {
                let mut out = Vec::new();
                for item in t.iter() {
                    out.push(item.to_script_json()?);
                }
                ScriptJson::List(out)
            }
            Value::Dict(d) => {
                let mut out = BTreeMap::new();
                for (k, v) in d.borrow().iter() {
                    let key = match k {
                        ValueKey::Int(i) => i.to_string(),
                        ValueKey::Str(s) => s.clone(),
                    };
                    out.insert(key, v.to_script_json()?);
                }
                ScriptJson::Map(out)
            }
            other => return Err(format!("cannot convert {} to JSON", other.type_name())),
        })
    }
}

fn key_repr(key: &ValueKey) -> String {
    match key {
        ValueKey::Int(i) => i.to_string(),
        ValueKey::Str(s) => format!("'{}'", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_copy_does_not_alias_nested_lists() {
        let inner = Value::new_list(vec![Value::Int(1)]);
        let outer = Value::new_list(vec![inner.clone()]);
        let copy = outer.deep_copy();
        if let (Value::List(outer_l), Value::List(copy_l)) = (&outer, &copy) {
            if let Value::List(inner_orig) = &outer_l.borrow()[0] {
                inner_orig.borrow_mut().push(Value::Int(2));
            }
            if let Value::List(inner_copy) = &copy_l.borrow()[0] {
                assert_eq!(inner_copy.borrow().len(), 1);
            }
        } else {
            panic!("expected lists");
        }
    }

    #[test]
    fn structural_eq_treats_int_and_float_as_equal() {
        assert!(Value::Int(2).structural_eq(&Value::Float(2.0)));
    }

    #[test]
    fn script_json_round_trip_for_dict() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), ScriptJson::Int(1));
        let json = ScriptJson::Map(entries);
        let value = Value::from_script_json(&json);
        let back = value.to_script_json().unwrap();
        assert_eq!(back, json);
    }
}
