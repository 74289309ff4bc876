//! Tree-walking evaluator for parsed snippets.

use std::{fmt, rc::Rc};

use ahash::AHashSet;

use crate::{
    args::CallArgs,
    builtins::{self, Builtin},
    exception::{ExcType, ExceptionValue, RunError, RunResult, source_line},
    expressions::{
        Arg, Comprehension, ComprehensionKind, Conversion, DictItem, Expr, ExceptHandler, FStringPart, FunctionDef,
        Import, Node, NodeLoc, Target, Try,
    },
    fstring, helpers,
    function::{Function, Scope},
    io::PrintWriter,
    modules,
    namespace::Namespace,
    ops,
    parse::{ParseError, parse},
    types::{self, Dict, Set},
    value::{Slice, Value},
};

/// Deepest call nesting before `RecursionError` is raised.
pub const MAX_CALL_DEPTH: usize = 1000;

/// How a statement finished.
#[derive(Debug)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// One function activation (or comprehension scope).
struct Frame {
    locals: Rc<Scope>,
    /// Names declared `global` in this activation.
    global_names: AHashSet<String>,
    comprehension: bool,
}

/// A snippet failed before or during execution.
#[derive(Debug, Clone)]
pub enum SnippetError {
    Parse(ParseError),
    Run(RunError),
}

impl SnippetError {
    /// Renders the error the way the Python REPL would print it.
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        match self {
            Self::Parse(err) => {
                let line = err.line();
                let mut out = format!("  File \"<snippet>\", line {line}\n");
                if let Some(text) = source_line(source, line) {
                    out.push_str("    ");
                    out.push_str(text);
                    out.push('\n');
                }
                out.push_str(&err.clone().into_exception().to_string());
                out.push('\n');
                out
            }
            Self::Run(err) => err.render(source),
        }
    }
}

impl fmt::Display for SnippetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => err.fmt(f),
            Self::Run(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SnippetError {}

/// Parses and runs `code` against `namespace`, sending output to `print`.
///
/// Assignments made before a failure stay in the namespace.
pub fn execute(code: &str, namespace: &mut Namespace, print: &mut dyn PrintWriter) -> Result<(), SnippetError> {
    let nodes = parse(code).map_err(SnippetError::Parse)?;
    Interpreter::new(namespace, print).run(&nodes).map_err(SnippetError::Run)
}

pub struct Interpreter<'a> {
    globals: &'a mut Namespace,
    print: &'a mut dyn PrintWriter,
    frames: Vec<Frame>,
    /// Exceptions being handled by enclosing `except` blocks, innermost last.
    handling: Vec<RunError>,
}

impl<'a> Interpreter<'a> {
    pub fn new(globals: &'a mut Namespace, print: &'a mut dyn PrintWriter) -> Self {
        Self {
            globals,
            print,
            frames: Vec::new(),
            handling: Vec::new(),
        }
    }

    /// Runs module-level statements.
    pub fn run(&mut self, nodes: &[NodeLoc]) -> RunResult<()> {
        match self.exec_block(nodes) {
            Ok(_) => Ok(()),
            Err(err) => Err(err.leave_frame("<module>")),
        }
    }

    pub(crate) fn print(&mut self) -> &mut dyn PrintWriter {
        &mut *self.print
    }

    /// Calls any callable value.
    pub fn call_value(&mut self, callee: Value, args: CallArgs) -> RunResult<Value> {
        match callee {
            Value::Function(func) => self.call_function(&func, args),
            Value::Builtin(builtin) => builtins::call(self, builtin, args),
            Value::ExcClass(exc_type) => builtins::new_exception(exc_type, args),
            Value::Helper(helper) => helpers::call(&helper, args),
            Value::Method(method) => types::call_method(self, &method.receiver, &method.name, args),
            Value::ModuleFunction(func) => modules::call(self, func, args),
            other => Err(ExcType::not_callable(other.type_name())),
        }
    }

    fn call_function(&mut self, func: &Rc<Function>, args: CallArgs) -> RunResult<Value> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(ExcType::recursion_error("maximum recursion depth exceeded"));
        }
        let scope = Rc::new(Scope::child(func.closure.clone()));
        bind_arguments(func, args, &scope)?;
        self.frames.push(Frame {
            locals: scope,
            global_names: AHashSet::new(),
            comprehension: false,
        });
        let result = self.exec_block(&func.def.body);
        self.frames.pop();
        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::None),
            Err(err) => Err(err.leave_frame(&func.def.name)),
        }
    }

    fn exec_block(&mut self, nodes: &[NodeLoc]) -> RunResult<Flow> {
        for node in nodes {
            match self.exec_node(&node.node) {
                Ok(Flow::Normal) => {}
                Ok(flow) => return Ok(flow),
                Err(err) => return Err(err.at_line(node.line)),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_node(&mut self, node: &Node) -> RunResult<Flow> {
        match node {
            Node::Pass => {}
            Node::Expr(expr) => {
                self.eval(expr)?;
            }
            Node::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
            }
            Node::AugAssign { target, op, value } => match target {
                Target::Name(name) => {
                    let current = self.lookup(name)?;
                    let rhs = self.eval(value)?;
                    let updated = ops::inplace_op(*op, &current, rhs)?;
                    self.assign_name(name, updated);
                }
                Target::Subscript { object, index } => {
                    let object = self.eval(object)?;
                    let index = self.eval(index)?;
                    let current = ops::get_item(&object, &index)?;
                    let rhs = self.eval(value)?;
                    let updated = ops::inplace_op(*op, &current, rhs)?;
                    ops::set_item(&object, index, updated)?;
                }
                other => return self.assign_target(other, Value::None).map(|()| Flow::Normal),
            },
            Node::Delete(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
            }
            Node::If { test, body, or_else } => {
                return if self.eval(test)?.py_bool() {
                    self.exec_block(body)
                } else {
                    self.exec_block(or_else)
                };
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => {
                let iterable = self.eval(iter)?;
                for item in iterable.py_iter()? {
                    self.assign_target(target, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(or_else);
            }
            Node::While { test, body, or_else } => {
                while self.eval(test)?.py_bool() {
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(or_else);
            }
            Node::Break => return Ok(Flow::Break),
            Node::Continue => return Ok(Flow::Continue),
            Node::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Node::FunctionDef(def) => {
                let func = self.make_function(def)?;
                self.assign_name(&def.name, func);
            }
            Node::Raise(exc) => return Err(self.raise(exc.as_ref())?),
            Node::Assert { test, msg } => {
                if !self.eval(test)?.py_bool() {
                    let message = match msg {
                        Some(msg) => self.eval(msg)?.py_str(),
                        None => String::new(),
                    };
                    return Err(ExceptionValue::new(ExcType::AssertionError, message).into());
                }
            }
            Node::Try(try_node) => return self.exec_try(try_node),
            Node::With { items, body } => return self.exec_with(items, body),
            Node::Global(names) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.global_names.extend(names.iter().cloned());
                }
            }
            Node::Import(import) => self.exec_import(import)?,
        }
        Ok(Flow::Normal)
    }

    /// Builds the error raised by a `raise` statement.
    fn raise(&mut self, exc: Option<&Expr>) -> RunResult<RunError> {
        let Some(expr) = exc else {
            return Ok(self.handling.last().cloned().unwrap_or_else(|| {
                ExceptionValue::new(ExcType::RuntimeError, "No active exception to reraise".to_owned()).into()
            }));
        };
        match self.eval(expr)? {
            Value::ExcClass(exc_type) => Ok(ExceptionValue::bare(exc_type).into()),
            Value::Exception(exc) => Ok(RunError::new((*exc).clone())),
            _ => Err(ExcType::type_error("exceptions must derive from BaseException")),
        }
    }

    fn exec_try(&mut self, try_node: &Try) -> RunResult<Flow> {
        let outcome = match self.exec_block(&try_node.body) {
            Ok(Flow::Normal) => self.exec_block(&try_node.or_else),
            Ok(flow) => Ok(flow),
            Err(err) => self.handle_exception(err, &try_node.handlers),
        };
        if try_node.finally.is_empty() {
            return outcome;
        }
        match self.exec_block(&try_node.finally)? {
            Flow::Normal => outcome,
            flow => Ok(flow),
        }
    }

    fn handle_exception(&mut self, err: RunError, handlers: &[ExceptHandler]) -> RunResult<Flow> {
        for handler in handlers {
            let matches = match &handler.exc_type {
                None => true,
                Some(spec) => {
                    let spec = self.eval(spec)?;
                    exception_matches(&spec, err.exc.exc_type)?
                }
            };
            if !matches {
                continue;
            }
            if let Some(name) = &handler.name {
                self.assign_name(name, Value::exception(err.exc.clone()));
            }
            self.handling.push(err);
            let result = self.exec_block(&handler.body);
            self.handling.pop();
            if let Some(name) = &handler.name {
                let _ = self.delete_name(name);
            }
            return result;
        }
        Err(err)
    }

    fn exec_with(&mut self, items: &[(Expr, Option<Target>)], body: &[NodeLoc]) -> RunResult<Flow> {
        let Some(((context, target), rest)) = items.split_first() else {
            return self.exec_block(body);
        };
        let manager = self.eval(context)?;
        if !matches!(manager, Value::File(_)) {
            return Err(ExcType::type_error(format_args!(
                "'{}' object does not support the context manager protocol",
                manager.type_name()
            )));
        }
        let result = match target {
            Some(target) => self
                .assign_target(target, manager.clone())
                .and_then(|()| self.exec_with(rest, body)),
            None => self.exec_with(rest, body),
        };
        if let Value::File(file) = &manager {
            file.borrow_mut().close();
        }
        result
    }

    fn exec_import(&mut self, import: &Import) -> RunResult<()> {
        match import {
            Import::Module { module, binding } => {
                let imported = modules::import(module)?;
                let bound = match module.split_once('.') {
                    Some((top, _)) if top == binding => modules::import(top)?,
                    _ => imported,
                };
                self.assign_name(binding, Value::Module(bound));
            }
            Import::From { module, names } => {
                let imported = modules::import(module)?;
                for (name, binding) in names {
                    let value = modules::get_attr(imported, name).map_err(|_| {
                        RunError::from(ExceptionValue::new(
                            ExcType::ImportError,
                            format!("cannot import name '{name}' from '{module}'"),
                        ))
                    })?;
                    self.assign_name(binding, value);
                }
            }
        }
        Ok(())
    }

    fn make_function(&mut self, def: &Rc<FunctionDef>) -> RunResult<Value> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(param.default.as_ref().map(|d| self.eval(d)).transpose()?);
        }
        let mut kw_defaults = Vec::with_capacity(def.kwonly.len());
        for param in &def.kwonly {
            kw_defaults.push(param.default.as_ref().map(|d| self.eval(d)).transpose()?);
        }
        Ok(Value::Function(Rc::new(Function {
            def: def.clone(),
            defaults,
            kw_defaults,
            closure: self.frames.last().map(|frame| frame.locals.clone()),
        })))
    }

    fn lookup(&self, name: &str) -> RunResult<Value> {
        if let Some(frame) = self.frames.last()
            && !frame.global_names.contains(name)
            && let Some(value) = frame.locals.lookup(name)
        {
            return Ok(value);
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        builtin_value(name).ok_or_else(|| ExcType::name_error(name))
    }

    fn assign_name(&mut self, name: &str, value: Value) {
        match self.frames.last() {
            Some(frame) if !frame.global_names.contains(name) => {
                frame.locals.vars.borrow_mut().insert(name.to_owned(), value);
            }
            _ => self.globals.set(name, value),
        }
    }

    /// `name := value` binds in the nearest enclosing non-comprehension scope.
    fn assign_walrus(&mut self, name: &str, value: Value) {
        match self.frames.iter().rev().find(|frame| !frame.comprehension) {
            Some(frame) if !frame.global_names.contains(name) => {
                frame.locals.vars.borrow_mut().insert(name.to_owned(), value);
            }
            _ => self.globals.set(name, value),
        }
    }

    fn delete_name(&mut self, name: &str) -> RunResult<()> {
        if let Some(frame) = self.frames.last()
            && !frame.global_names.contains(name)
        {
            return match frame.locals.vars.borrow_mut().shift_remove(name) {
                Some(_) => Ok(()),
                None => Err(ExceptionValue::new(
                    ExcType::UnboundLocalError,
                    format!("cannot access local variable '{name}' where it is not associated with a value"),
                )
                .into()),
            };
        }
        match self.globals.remove(name) {
            Some(_) => Ok(()),
            None => Err(ExcType::name_error(name)),
        }
    }

    fn assign_target(&mut self, target: &Target, value: Value) -> RunResult<()> {
        match target {
            Target::Name(name) => {
                self.assign_name(name, value);
                Ok(())
            }
            Target::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                ops::set_item(&object, index, value)
            }
            Target::Attribute { object, attr } => {
                let object = self.eval(object)?;
                Err(ExcType::attribute_error(object.type_name(), attr))
            }
            Target::Unpack(targets) => self.unpack(targets, value),
            Target::Starred(_) => Err(ExceptionValue::new(
                ExcType::SyntaxError,
                "starred assignment target must be in a list or tuple".to_owned(),
            )
            .into()),
        }
    }

    fn unpack(&mut self, targets: &[Target], value: Value) -> RunResult<()> {
        let mut items = value.to_vec().map_err(|err| {
            if err.exc.exc_type == ExcType::TypeError {
                ExcType::type_error(format_args!("cannot unpack non-iterable {} object", value.type_name()))
            } else {
                err
            }
        })?;
        let Some(star) = targets.iter().position(|t| matches!(t, Target::Starred(_))) else {
            if items.len() > targets.len() {
                return Err(ExcType::value_error(format_args!(
                    "too many values to unpack (expected {})",
                    targets.len()
                )));
            }
            if items.len() < targets.len() {
                return Err(ExcType::value_error(format_args!(
                    "not enough values to unpack (expected {}, got {})",
                    targets.len(),
                    items.len()
                )));
            }
            for (target, item) in targets.iter().zip(items) {
                self.assign_target(target, item)?;
            }
            return Ok(());
        };
        let after = targets.len() - star - 1;
        if items.len() < star + after {
            return Err(ExcType::value_error(format_args!(
                "not enough values to unpack (expected at least {}, got {})",
                star + after,
                items.len()
            )));
        }
        let tail = items.split_off(items.len() - after);
        let middle = items.split_off(star);
        for (target, item) in targets[..star].iter().zip(items) {
            self.assign_target(target, item)?;
        }
        if let Target::Starred(inner) = &targets[star] {
            self.assign_target(inner, Value::list(middle))?;
        }
        for (target, item) in targets[star + 1..].iter().zip(tail) {
            self.assign_target(target, item)?;
        }
        Ok(())
    }

    fn delete_target(&mut self, target: &Target) -> RunResult<()> {
        match target {
            Target::Name(name) => self.delete_name(name),
            Target::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                ops::del_item(&object, &index)
            }
            Target::Unpack(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
                Ok(())
            }
            Target::Attribute { object, attr } => {
                let object = self.eval(object)?;
                Err(ExcType::attribute_error(object.type_name(), attr))
            }
            Target::Starred(inner) => self.delete_target(inner),
        }
    }

    fn eval(&mut self, expr: &Expr) -> RunResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_items(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_items(items)?)),
            Expr::Set(items) => {
                let mut set = Set::new();
                for item in self.eval_items(items)? {
                    set.add(item)?;
                }
                Ok(Value::set(set))
            }
            Expr::Dict(items) => {
                let mut dict = Dict::new();
                for item in items {
                    match item {
                        DictItem::Pair(key, value) => {
                            let key = self.eval(key)?;
                            let value = self.eval(value)?;
                            dict.insert(key, value)?;
                        }
                        DictItem::Unpack(mapping) => {
                            let mapping = self.eval(mapping)?;
                            let Value::Dict(other) = &mapping else {
                                return Err(ExcType::type_error(format_args!(
                                    "'{}' object is not a mapping",
                                    mapping.type_name()
                                )));
                            };
                            let other = other.borrow().clone();
                            for (key, value) in other.items() {
                                dict.insert(key.clone(), value.clone())?;
                            }
                        }
                    }
                }
                Ok(Value::dict(dict))
            }
            Expr::Starred(_) => Err(ExcType::type_error("can't use starred expression here")),
            Expr::FString(parts) => Ok(Value::from(self.eval_fstring(parts)?)),
            Expr::Attribute { object, attr } => {
                let object = self.eval(object)?;
                types::get_attr(&object, attr)
            }
            Expr::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                ops::get_item(&object, &index)
            }
            Expr::Slice { lower, upper, step } => Ok(Value::Slice(Rc::new(Slice {
                lower: self.eval_slice_bound(lower.as_deref())?,
                upper: self.eval_slice_bound(upper.as_deref())?,
                step: self.eval_slice_bound(step.as_deref())?,
            }))),
            Expr::Call { func, args } => {
                let func = self.eval(func)?;
                let args = self.eval_args(args)?;
                self.call_value(func, args)
            }
            Expr::AttrCall { object, attr, args } => {
                let object = self.eval(object)?;
                let args = self.eval_args(args)?;
                types::call_method(self, &object, attr, args)
            }
            Expr::Op { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                ops::binary_op(*op, &left, &right)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                ops::unary_op(*op, &operand)
            }
            Expr::Compare { left, ops: comparisons } => {
                let mut left = self.eval(left)?;
                for (op, right) in comparisons {
                    let right = self.eval(right)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.py_bool() { self.eval(right) } else { Ok(left) }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.py_bool() { Ok(left) } else { self.eval(right) }
            }
            Expr::IfElse { test, body, orelse } => {
                if self.eval(test)?.py_bool() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Named { target, value } => {
                let value = self.eval(value)?;
                self.assign_walrus(target, value.clone());
                Ok(value)
            }
            Expr::Lambda(def) => self.make_function(def),
            Expr::Comprehension { kind, generators } => self.eval_comprehension(kind, generators),
        }
    }

    /// Evaluates display items, expanding `*iterable` entries.
    fn eval_items(&mut self, items: &[Expr]) -> RunResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            if let Expr::Starred(inner) = item {
                values.extend(self.eval(inner)?.py_iter()?);
            } else {
                values.push(self.eval(item)?);
            }
        }
        Ok(values)
    }

    fn eval_slice_bound(&mut self, bound: Option<&Expr>) -> RunResult<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval(expr)? {
            Value::None => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                ExcType::type_error("slice indices must be integers or None or have an __index__ method")
            }),
        }
    }

    fn eval_args(&mut self, args: &[Arg]) -> RunResult<CallArgs> {
        let mut call_args = CallArgs::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => call_args.positional.push(self.eval(expr)?),
                Arg::Star(expr) => call_args.positional.extend(self.eval(expr)?.py_iter()?),
                Arg::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    call_args.keywords.push((name.clone(), value));
                }
                Arg::DoubleStar(expr) => {
                    let mapping = self.eval(expr)?;
                    let Value::Dict(dict) = &mapping else {
                        return Err(ExcType::type_error(format_args!(
                            "argument after ** must be a mapping, not {}",
                            mapping.type_name()
                        )));
                    };
                    for (key, value) in dict.borrow().items() {
                        let Some(key) = key.as_str() else {
                            return Err(ExcType::type_error("keywords must be strings"));
                        };
                        call_args.keywords.push((key.to_owned(), value.clone()));
                    }
                }
            }
        }
        Ok(call_args)
    }

    fn eval_fstring(&mut self, parts: &[FStringPart]) -> RunResult<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Interpolation {
                    expr,
                    conversion,
                    format_spec,
                    debug_text,
                } => {
                    let value = self.eval(expr)?;
                    if let Some(text) = debug_text {
                        out.push_str(text);
                    }
                    let conversion = if debug_text.is_some() && *conversion == Conversion::None && format_spec.is_none() {
                        Conversion::Repr
                    } else {
                        *conversion
                    };
                    let value = fstring::convert(value, conversion);
                    let spec = match format_spec {
                        Some(spec_parts) => self.eval_fstring(spec_parts)?,
                        None => String::new(),
                    };
                    out.push_str(&fstring::format_value(&value, &spec)?);
                }
            }
        }
        Ok(out)
    }

    fn eval_comprehension(&mut self, kind: &ComprehensionKind, generators: &[Comprehension]) -> RunResult<Value> {
        let Some(first) = generators.first() else {
            return Ok(Value::list(Vec::new()));
        };
        // the outermost iterable is evaluated in the enclosing scope
        let first_iter = self.eval(&first.iter)?;
        let parent = self.frames.last().map(|frame| frame.locals.clone());
        self.frames.push(Frame {
            locals: Rc::new(Scope::child(parent)),
            global_names: AHashSet::new(),
            comprehension: true,
        });
        let mut results = Vec::new();
        let outcome = self.comprehension_level(kind, generators, 0, Some(first_iter), &mut results);
        self.frames.pop();
        outcome?;
        match kind {
            ComprehensionKind::List(_) | ComprehensionKind::Generator(_) => Ok(Value::list(results)),
            ComprehensionKind::Set(_) => {
                let mut set = Set::new();
                for item in results {
                    set.add(item)?;
                }
                Ok(Value::set(set))
            }
            ComprehensionKind::Dict(..) => {
                let mut dict = Dict::new();
                let mut pairs = results.into_iter();
                while let (Some(key), Some(value)) = (pairs.next(), pairs.next()) {
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
        }
    }

    /// Runs generator `level`; dict comprehensions push key and value as consecutive entries.
    fn comprehension_level(
        &mut self,
        kind: &ComprehensionKind,
        generators: &[Comprehension],
        level: usize,
        iterable: Option<Value>,
        results: &mut Vec<Value>,
    ) -> RunResult<()> {
        let generator = &generators[level];
        let iterable = match iterable {
            Some(value) => value,
            None => self.eval(&generator.iter)?,
        };
        'items: for item in iterable.py_iter()? {
            self.assign_target(&generator.target, item)?;
            for condition in &generator.ifs {
                if !self.eval(condition)?.py_bool() {
                    continue 'items;
                }
            }
            if level + 1 < generators.len() {
                self.comprehension_level(kind, generators, level + 1, None, results)?;
                continue;
            }
            match kind {
                ComprehensionKind::List(elt) | ComprehensionKind::Set(elt) | ComprehensionKind::Generator(elt) => {
                    results.push(self.eval(elt)?);
                }
                ComprehensionKind::Dict(key, value) => {
                    results.push(self.eval(key)?);
                    results.push(self.eval(value)?);
                }
            }
        }
        Ok(())
    }
}

/// Value bound to a builtin name, when no variable shadows it.
fn builtin_value(name: &str) -> Option<Value> {
    if let Ok(builtin) = name.parse::<Builtin>() {
        return Some(Value::Builtin(builtin));
    }
    ExcType::from_name(name).map(Value::ExcClass)
}

/// Whether an `except` clause naming `spec` catches `exc_type`.
fn exception_matches(spec: &Value, exc_type: ExcType) -> RunResult<bool> {
    match spec {
        Value::ExcClass(handler) => Ok(exc_type.is_subclass_of(*handler)),
        Value::Tuple(specs) => {
            for spec in specs.iter() {
                if exception_matches(spec, exc_type)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(ExcType::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

/// Binds call arguments to the parameters of `func` in `scope`.
fn bind_arguments(func: &Function, args: CallArgs, scope: &Scope) -> RunResult<()> {
    let def = &func.def;
    let name = def.name.as_str();
    let mut vars = scope.vars.borrow_mut();
    let given = args.positional.len();
    let mut extra = Vec::new();
    for (index, value) in args.positional.into_iter().enumerate() {
        if let Some(param) = def.params.get(index) {
            vars.insert(param.name.clone(), value);
        } else if def.var_args.is_some() {
            extra.push(value);
        } else {
            let expected = def.params.len();
            let plural = if expected == 1 { "" } else { "s" };
            let verb = if given == 1 { "was" } else { "were" };
            return Err(ExcType::type_error(format_args!(
                "{name}() takes {expected} positional argument{plural} but {given} {verb} given"
            )));
        }
    }
    if let Some(var_args) = &def.var_args {
        vars.insert(var_args.clone(), Value::tuple(extra));
    }
    let mut extra_keywords = Dict::new();
    for (key, value) in args.keywords {
        let known = def.params.iter().chain(&def.kwonly).any(|param| param.name == key);
        if known {
            if vars.contains_key(&key) {
                return Err(ExcType::multiple_values(name, &key));
            }
            vars.insert(key, value);
        } else if def.var_kwargs.is_some() {
            extra_keywords.set_str(&key, value);
        } else {
            return Err(ExcType::unexpected_keyword(name, &key));
        }
    }
    for (param, default) in def.params.iter().zip(&func.defaults) {
        if vars.contains_key(&param.name) {
            continue;
        }
        match default {
            Some(value) => {
                vars.insert(param.name.clone(), value.clone());
            }
            None => return Err(ExcType::missing_argument(name, &param.name)),
        }
    }
    for (param, default) in def.kwonly.iter().zip(&func.kw_defaults) {
        if vars.contains_key(&param.name) {
            continue;
        }
        match default {
            Some(value) => {
                vars.insert(param.name.clone(), value.clone());
            }
            None => {
                return Err(ExcType::type_error(format_args!(
                    "{name}() missing 1 required keyword-only argument: '{}'",
                    param.name
                )));
            }
        }
    }
    if let Some(var_kwargs) = &def.var_kwargs {
        vars.insert(var_kwargs.clone(), Value::dict(extra_keywords));
    }
    Ok(())
}
