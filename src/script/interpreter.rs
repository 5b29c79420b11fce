//! Tree-walking evaluator for the restricted scripting language.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use crate::script::ast::*;
use crate::script::stdlib;
use crate::script::value::{FunctionValue, Value, ValueKey};

/// Sentinel `RuntimeError.kind` used when a deadline set via
/// [`Interpreter::call_function_with_deadline`] is exceeded. `sandbox.rs`
/// maps this to `BenchError::Timeout` rather than `BenchError::Runtime`.
pub const TIMEOUT_KIND: &str = "__timeout__";

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: String,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<String> for RuntimeError {
    fn from(message: String) -> Self {
        RuntimeError::new("RuntimeError", message)
    }
}

type EResult<T> = Result<T, RuntimeError>;

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type Env = Rc<RefCell<HashMap<String, Value>>>;

pub struct Interpreter {
    globals: Env,
    deadline: Cell<Option<Instant>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            globals: Rc::new(RefCell::new(HashMap::new())),
            deadline: Cell::new(None),
        }
    }

    /// Calls `name` with `args`, checking the deadline at every loop
    /// iteration and function call so a runaway candidate solution (e.g. an
    /// infinite `while True`) is interrupted instead of hanging the caller.
    pub fn call_function_with_deadline(
        &self,
        name: &str,
        args: Vec<Value>,
        deadline: Instant,
    ) -> EResult<Value> {
        self.deadline.set(Some(deadline));
        let result = self.call_function(name, args);
        self.deadline.set(None);
        result
    }

    fn check_deadline(&self) -> EResult<()> {
        if let Some(deadline) = self.deadline.get() {
            if Instant::now() >= deadline {
                return Err(RuntimeError::new(TIMEOUT_KIND, "execution deadline exceeded"));
            }
        }
        Ok(())
    }

    /// Executes top-level statements (function defs, module-level assignments).
    /// Mirrors `exec(code, namespace)` in the reference sandbox: only
    /// definitions and simple statements are expected at this level.
    pub fn load(&mut self, program: &Program) -> EResult<()> {
        for stmt in &program.statements {
            self.exec_stmt(stmt, &self.globals.clone())?;
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn call_function(&self, name: &str, args: Vec<Value>) -> EResult<Value> {
        let func = self
            .lookup(name)
            .ok_or_else(|| RuntimeError::new("NameError", format!("name '{}' is not defined", name)))?;
        self.call_value(&func, args)
    }

    fn call_value(&self, func: &Value, args: Vec<Value>) -> EResult<Value> {
        match func {
            Value::Function(f) => self.call_user_function(f, args),
            Value::Builtin(b) => {
                if let Some(arity) = b.arity {
                    if args.len() != arity {
                        return Err(RuntimeError::new(
                            "TypeError",
                            format!(
                                "{}() takes {} argument(s) but {} were given",
                                b.name,
                                arity,
                                args.len()
                            ),
                        ));
                    }
                }
                (b.call)(args).map_err(|e| RuntimeError::new("TypeError", e))
            }
            other => Err(RuntimeError::new(
                "TypeError",
                format!("'{}' object is not callable", other.type_name()),
            )),
        }
    }

    fn call_user_function(&self, f: &Rc<FunctionValue>, args: Vec<Value>) -> EResult<Value> {
        self.check_deadline()?;
        if args.len() != f.params.len() {
            return Err(RuntimeError::new(
                "TypeError",
                format!(
                    "{}() takes {} argument(s) but {} were given",
                    f.name,
                    f.params.len(),
                    args.len()
                ),
            ));
        }
        let local: Env = Rc::new(RefCell::new(HashMap::new()));
        for (param, arg) in f.params.iter().zip(args.into_iter()) {
            local.borrow_mut().insert(param.clone(), arg);
        }
        match self.exec_block(&f.body, &local)? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::None),
        }
    }

    fn exec_block(&self, stmts: &[Stmt], env: &Env) -> EResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, env: &Env) -> EResult<Flow> {
        match stmt {
            Stmt::FunctionDef { name, params, body } => {
                let func = Value::Function(Rc::new(FunctionValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                }));
                self.globals.borrow_mut().insert(name.clone(), func);
                Ok(Flow::Normal)
            }
            Stmt::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond, env)?.is_truthy() {
                        return self.exec_block(body, env);
                    }
                }
                self.exec_block(orelse, env)
            }
            Stmt::For { target, iter, body } => {
                let iterable = self.eval(iter, env)?;
                let items = self.iterate(&iterable)?;
                for item in items {
                    self.check_deadline()?;
                    self.assign_target(target, item, env)?;
                    match self.exec_block(body, env)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, env)?.is_truthy() {
                    self.check_deadline()?;
                    match self.exec_block(body, env)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(e, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Assign { target, value } => {
                let v = self.eval(value, env)?;
                self.assign_target(target, v, env)?;
                Ok(Flow::Normal)
            }
            Stmt::AugAssign { target, op, value } => {
                let current = self.eval(&target_to_expr(target), env)?;
                let rhs = self.eval(value, env)?;
                let result = crate::script::stdlib::apply_binop(*op, &current, &rhs)
                    .map_err(|e| RuntimeError::new("TypeError", e))?;
                self.assign_target(target, result, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Import { .. } => Ok(Flow::Normal),
            Stmt::Raise(expr) => {
                let value = self.eval(expr, env)?;
                match value {
                    Value::Exception(exc) => Err(RuntimeError::new(&exc.kind, exc.message.clone())),
                    other => Err(RuntimeError::new(
                        "TypeError",
                        format!("exceptions must derive from BaseException, not '{}'", other.type_name()),
                    )),
                }
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn assign_target(&self, target: &Target, value: Value, env: &Env) -> EResult<()> {
        match target {
            Target::Name(name) => {
                env.borrow_mut().insert(name.clone(), value);
                Ok(())
            }
            Target::Index { base, index } => {
                let base_val = self.eval(base, env)?;
                let index_val = self.eval(index, env)?;
                stdlib::set_index(&base_val, &index_val, value)
                    .map_err(|e| RuntimeError::new("TypeError", e))
            }
            Target::Tuple(targets) => {
                let items = self.iterate(&value)?;
                if items.len() != targets.len() {
                    return Err(RuntimeError::new(
                        "ValueError",
                        format!(
                            "expected {} values to unpack, got {}",
                            targets.len(),
                            items.len()
                        ),
                    ));
                }
                for (t, v) in targets.iter().zip(items.into_iter()) {
                    self.assign_target(t, v, env)?;
                }
                Ok(())
            }
        }
    }

    fn iterate(&self, value: &Value) -> EResult<Vec<Value>> {
        match value {
            Value::List(l) => Ok(l.borrow().clone()),
            Value::Tuple(t) => Ok(t.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(d) => Ok(d
                .borrow()
                .keys()
                .map(|k| match k {
                    ValueKey::Int(i) => Value::Int(*i),
                    ValueKey::Str(s) => Value::Str(s.clone()),
                })
                .collect()),
            other => Err(RuntimeError::new(
                "TypeError",
                format!("'{}' object is not iterable", other.type_name()),
            )),
        }
    }

    fn eval(&self, expr: &Expr, env: &Env) -> EResult<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => self.resolve_name(name, env),
            Expr::List(items) => {
                let values: EResult<Vec<Value>> = items.iter().map(|e| self.eval(e, env)).collect();
                Ok(Value::new_list(values?))
            }
            Expr::Tuple(items) => {
                let values: EResult<Vec<Value>> = items.iter().map(|e| self.eval(e, env)).collect();
                Ok(Value::Tuple(Rc::new(values?)))
            }
            Expr::Dict(pairs) => {
                let mut entries = Vec::new();
                for (k, v) in pairs {
                    let key = self.eval(k, env)?;
                    let value = self.eval(v, env)?;
                    let key = key
                        .as_key()
                        .map_err(|e| RuntimeError::new("TypeError", e))?;
                    entries.push((key, value));
                }
                Ok(Value::new_dict(entries))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, env)?;
                stdlib::apply_unary(*op, &v).map_err(|e| RuntimeError::new("TypeError", e))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                stdlib::apply_binop(*op, &l, &r).map_err(|e| RuntimeError::new("TypeError", e))
            }
            Expr::BoolOp { op, values } => {
                let mut result = Value::Bool(true);
                for (i, v) in values.iter().enumerate() {
                    let val = self.eval(v, env)?;
                    let truthy = val.is_truthy();
                    if i == 0 {
                        result = val;
                    }
                    match op {
                        BoolOp::And => {
                            if !truthy {
                                return Ok(val);
                            }
                            result = val;
                        }
                        BoolOp::Or => {
                            if truthy {
                                return Ok(val);
                            }
                            result = val;
                        }
                    }
                }
                Ok(result)
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut current = self.eval(left, env)?;
                for (op, comp_expr) in ops.iter().zip(comparators.iter()) {
                    let comp = self.eval(comp_expr, env)?;
                    let ok = stdlib::apply_compare(*op, &current, &comp)
                        .map_err(|e| RuntimeError::new("TypeError", e))?;
                    if !ok {
                        return Ok(Value::Bool(false));
                    }
                    current = comp;
                }
                Ok(Value::Bool(true))
            }
            Expr::Call { func, args } => {
                let func_val = self.eval(func, env)?;
                let arg_values: EResult<Vec<Value>> =
                    args.iter().map(|a| self.eval(a, env)).collect();
                self.call_value(&func_val, arg_values?)
            }
            Expr::Attribute { base, attr } => {
                // Only used when not immediately called; the language has no
                // free-standing attribute access outside of method calls.
                Err(RuntimeError::new(
                    "AttributeError",
                    format!("'{}' object has no attribute '{}'", self.eval(base, env)?.type_name(), attr),
                ))
            }
            Expr::MethodCall { base, method, args } => {
                let base_val = self.eval(base, env)?;
                let arg_values: EResult<Vec<Value>> =
                    args.iter().map(|a| self.eval(a, env)).collect();
                stdlib::call_method(&base_val, method, arg_values?)
                    .map_err(|e| RuntimeError::new("TypeError", e))
            }
            Expr::Index { base, index } => {
                let base_val = self.eval(base, env)?;
                let index_val = self.eval(index, env)?;
                stdlib::get_index(&base_val, &index_val).map_err(|e| RuntimeError::new("TypeError", e))
            }
        }
    }

    fn resolve_name(&self, name: &str, env: &Env) -> EResult<Value> {
        if let Some(v) = env.borrow().get(name) {
            return Ok(v.clone());
        }
        if !Rc::ptr_eq(env, &self.globals) {
            if let Some(v) = self.globals.borrow().get(name) {
                return Ok(v.clone());
            }
        }
        if let Some(builtin) = stdlib::lookup_builtin(name) {
            return Ok(builtin);
        }
        Err(RuntimeError::new(
            "NameError",
            format!("name '{}' is not defined", name),
        ))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn target_to_expr(target: &Target) -> Expr {
    match target {
        Target::Name(name) => Expr::Name(name.clone()),
        Target::Index { base, index } => Expr::Index {
            base: base.clone(),
            index: index.clone(),
        },
        Target::Tuple(targets) => Expr::Tuple(targets.iter().map(target_to_expr).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::Lexer;
    use crate::script::parser::parse;

    fn run(src: &str, entry: &str, args: Vec<Value>) -> Value {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = parse(tokens).unwrap();
        let mut interp = Interpreter::new();
        interp.load(&program).unwrap();
        interp.call_function(entry, args).unwrap()
    }

    #[test]
    fn runs_recursive_fibonacci() {
        let src = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n";
        let result = run(src, "fib", vec![Value::Int(10)]);
        assert!(matches!(result, Value::Int(55)));
    }

    #[test]
    fn runs_for_loop_accumulation() {
        let src = "def total(items):\n    acc = 0\n    for x in items:\n        acc += x\n    return acc\n";
        let list = Value::new_list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = run(src, "total", vec![list]);
        assert!(matches!(result, Value::Int(6)));
    }

    #[test]
    fn raise_propagates_kind_and_message() {
        let src = "def check(n):\n    if n < 0:\n        raise ValueError(\"n must be non-negative\")\n    return n\n";
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = parse(tokens).unwrap();
        let mut interp = Interpreter::new();
        interp.load(&program).unwrap();
        let err = interp.call_function("check", vec![Value::Int(-1)]).unwrap_err();
        assert_eq!(err.kind, "ValueError");
        assert_eq!(err.message, "n must be non-negative");
    }

    #[test]
    fn does_not_mutate_caller_list_without_explicit_aliasing() {
        let src = "def double_all(items):\n    result = []\n    for x in items:\n        result.append(x * 2)\n    return result\n";
        let list = Value::new_list(vec![Value::Int(1), Value::Int(2)]);
        let result = run(src, "double_all", vec![list.clone()]);
        if let Value::List(original) = &list {
            assert_eq!(original.borrow().len(), 2);
        }
        if let Value::List(out) = result {
            assert!(matches!(out.borrow()[0], Value::Int(2)));
        }
    }
}
