use std::{borrow::Cow, fmt, rc::Rc};

use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ConversionFlag as RuffConversionFlag, ElifElseClause, Expr as AstExpr,
    InterpolatedStringElement, Keyword, Number, Operator as AstOperator, ParameterWithDefault, Stmt, UnaryOp,
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::{
    exception::{ExcType, ExceptionValue},
    expressions::{
        Arg, CmpOperator, Comprehension, ComprehensionKind, Conversion, DictItem, ExceptHandler, Expr, FStringPart,
        FunctionDef, Import, Node, NodeLoc, Operator, Param, Target, Try, UnaryOperator,
    },
    value::Value,
};

/// Maximum nesting depth for AST structures during parsing.
/// Matches CPython's limit of ~200 for nested parentheses.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// Debug builds have much larger stack frames, so the limit is lower.
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 35;

/// Errors produced while parsing a snippet.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// The source is not valid Python.
    Syntax { msg: Cow<'static, str>, line: u32 },
    /// Valid Python the interpreter does not execute (classes, async, ...).
    NotSupported { msg: Cow<'static, str>, line: u32 },
}

impl ParseError {
    fn syntax(msg: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self::Syntax { msg: msg.into(), line }
    }

    fn not_supported(msg: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self::NotSupported { msg: msg.into(), line }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Self::Syntax { line, .. } | Self::NotSupported { line, .. } => *line,
        }
    }

    /// Converts the error into the exception reported to snippet authors.
    #[must_use]
    pub fn into_exception(self) -> ExceptionValue {
        match self {
            Self::Syntax { msg, .. } => ExceptionValue::new(ExcType::SyntaxError, msg.into_owned()),
            Self::NotSupported { msg, .. } => {
                ExceptionValue::new(ExcType::SyntaxError, format!("{msg} is not supported in snippets"))
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { msg, line } => write!(f, "line {line}: {msg}"),
            Self::NotSupported { msg, line } => write!(f, "line {line}: {msg} is not supported"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses a snippet into the interpreter's statement list.
pub fn parse(code: &str) -> Result<Vec<NodeLoc>, ParseError> {
    let mut parser = Parser::new(code);
    let parsed = parse_module(code).map_err(|e| ParseError::syntax(e.to_string(), parser.line_of(e.range())))?;
    let module = parsed.into_syntax();
    parser.parse_statements(module.body)
}

/// Converts ruff's AST into [`NodeLoc`] statements.
struct Parser<'a> {
    code: &'a str,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
    depth_remaining: u16,
}

impl<'a> Parser<'a> {
    fn new(code: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(code.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            code,
            line_starts,
            depth_remaining: MAX_NESTING_DEPTH,
        }
    }

    fn line_of(&self, range: TextRange) -> u32 {
        let offset = usize::from(range.start());
        let line = self.line_starts.partition_point(|start| *start <= offset);
        u32::try_from(line).unwrap_or(u32::MAX)
    }

    fn decr_depth_remaining(&mut self, get_range: impl FnOnce() -> TextRange) -> Result<(), ParseError> {
        if let Some(depth_remaining) = self.depth_remaining.checked_sub(1) {
            self.depth_remaining = depth_remaining;
            Ok(())
        } else {
            Err(ParseError::syntax("too many nested parentheses", self.line_of(get_range())))
        }
    }

    fn parse_statements(&mut self, statements: Vec<Stmt>) -> Result<Vec<NodeLoc>, ParseError> {
        let mut nodes = Vec::with_capacity(statements.len());
        for statement in statements {
            let line = self.line_of(statement.range());
            self.decr_depth_remaining(|| statement.range())?;
            let node = self.parse_statement(statement, line);
            self.depth_remaining += 1;
            nodes.push(NodeLoc { line, node: node? });
        }
        Ok(nodes)
    }

    /// Lowers `elif`/`else` clauses into nested `If` nodes.
    fn parse_elif_else_clauses(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<NodeLoc>, ParseError> {
        let mut tail: Vec<NodeLoc> = Vec::new();
        for clause in clauses.into_iter().rev() {
            let line = self.line_of(clause.range);
            match clause.test {
                Some(test) => {
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body)?;
                    let node = Node::If {
                        test,
                        body,
                        or_else: tail,
                    };
                    tail = vec![NodeLoc { line, node }];
                }
                None => {
                    tail = self.parse_statements(clause.body)?;
                }
            }
        }
        Ok(tail)
    }

    fn parse_statement(&mut self, statement: Stmt, line: u32) -> Result<Node, ParseError> {
        match statement {
            Stmt::FunctionDef(ast::StmtFunctionDef {
                name,
                parameters,
                body,
                is_async,
                ..
            }) => {
                if is_async {
                    return Err(ParseError::not_supported("async def", line));
                }
                let body = self.parse_statements(body)?;
                let def = self.parse_function_def(name.as_str(), *parameters, body, line)?;
                Ok(Node::FunctionDef(Rc::new(def)))
            }
            Stmt::ClassDef(_) => Err(ParseError::not_supported("class definition", line)),
            Stmt::Return(ast::StmtReturn { value, .. }) => {
                let value = value.map(|v| self.parse_expression(*v)).transpose()?;
                Ok(Node::Return(value))
            }
            Stmt::Delete(ast::StmtDelete { targets, .. }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_target(t, line))
                    .collect::<Result<_, _>>()?;
                Ok(Node::Delete(targets))
            }
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let value = self.parse_expression(*value)?;
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_target(t, line))
                    .collect::<Result<_, _>>()?;
                Ok(Node::Assign { targets, value })
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => {
                let target = self.parse_target(*target, line)?;
                if matches!(target, Target::Unpack(_) | Target::Starred(_)) {
                    return Err(ParseError::syntax(
                        "'tuple' is an illegal expression for augmented assignment",
                        line,
                    ));
                }
                Ok(Node::AugAssign {
                    target,
                    op: convert_op(op),
                    value: self.parse_expression(*value)?,
                })
            }
            Stmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => match value {
                Some(value) => {
                    let value = self.parse_expression(*value)?;
                    let target = self.parse_target(*target, line)?;
                    Ok(Node::Assign {
                        targets: vec![target],
                        value,
                    })
                }
                None => Ok(Node::Pass),
            },
            Stmt::TypeAlias(_) => Err(ParseError::not_supported("type alias", line)),
            Stmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                if is_async {
                    return Err(ParseError::not_supported("async for", line));
                }
                Ok(Node::For {
                    target: self.parse_target(*target, line)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body)?,
                    or_else: self.parse_statements(orelse)?,
                })
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => Ok(Node::While {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body)?,
                or_else: self.parse_statements(orelse)?,
            }),
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body)?;
                let or_else = self.parse_elif_else_clauses(elif_else_clauses)?;
                Ok(Node::If { test, body, or_else })
            }
            Stmt::With(ast::StmtWith {
                is_async, items, body, ..
            }) => {
                if is_async {
                    return Err(ParseError::not_supported("async with", line));
                }
                let mut parsed_items = Vec::with_capacity(items.len());
                for item in items {
                    let context = self.parse_expression(item.context_expr)?;
                    let target = item
                        .optional_vars
                        .map(|t| self.parse_target(*t, line))
                        .transpose()?;
                    parsed_items.push((context, target));
                }
                Ok(Node::With {
                    items: parsed_items,
                    body: self.parse_statements(body)?,
                })
            }
            Stmt::Match(_) => Err(ParseError::not_supported("match statement", line)),
            Stmt::Raise(ast::StmtRaise { exc, .. }) => {
                let exc = exc.map(|e| self.parse_expression(*e)).transpose()?;
                Ok(Node::Raise(exc))
            }
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
                ..
            }) => {
                if is_star {
                    return Err(ParseError::not_supported("except*", line));
                }
                let body = self.parse_statements(body)?;
                let handlers = handlers
                    .into_iter()
                    .map(|h| self.parse_except_handler(h))
                    .collect::<Result<_, _>>()?;
                Ok(Node::Try(Box::new(Try {
                    body,
                    handlers,
                    or_else: self.parse_statements(orelse)?,
                    finally: self.parse_statements(finalbody)?,
                })))
            }
            Stmt::Assert(ast::StmtAssert { test, msg, .. }) => Ok(Node::Assert {
                test: self.parse_expression(*test)?,
                msg: msg.map(|m| self.parse_expression(*m)).transpose()?,
            }),
            Stmt::Import(ast::StmtImport { names, .. }) => {
                // `import a, b` binds each name in turn; only the first becomes the node,
                // the rest are chained through a synthetic block.
                let mut imports: Vec<Import> = names
                    .into_iter()
                    .map(|alias| {
                        let module = alias.name.as_str().to_owned();
                        let binding = match &alias.asname {
                            Some(asname) => asname.as_str().to_owned(),
                            None => module.split('.').next().unwrap_or_default().to_owned(),
                        };
                        Import::Module { module, binding }
                    })
                    .collect();
                if imports.len() == 1 {
                    Ok(Node::Import(imports.remove(0)))
                } else {
                    let body = imports
                        .into_iter()
                        .map(|import| NodeLoc {
                            line,
                            node: Node::Import(import),
                        })
                        .collect();
                    Ok(Node::If {
                        test: Expr::Literal(Value::Bool(true)),
                        body,
                        or_else: Vec::new(),
                    })
                }
            }
            Stmt::ImportFrom(ast::StmtImportFrom {
                module, names, level, ..
            }) => {
                if level > 0 {
                    return Err(ParseError::syntax(
                        "attempted relative import with no known parent package",
                        line,
                    ));
                }
                let module = module.map(|m| m.as_str().to_owned()).unwrap_or_default();
                let names = names
                    .into_iter()
                    .map(|alias| {
                        let name = alias.name.as_str().to_owned();
                        let binding = alias
                            .asname
                            .as_ref()
                            .map_or_else(|| name.clone(), |a| a.as_str().to_owned());
                        (name, binding)
                    })
                    .collect();
                Ok(Node::Import(Import::From { module, names }))
            }
            Stmt::Global(ast::StmtGlobal { names, .. }) => {
                Ok(Node::Global(names.iter().map(|n| n.as_str().to_owned()).collect()))
            }
            Stmt::Nonlocal(_) => Err(ParseError::not_supported("nonlocal", line)),
            Stmt::Expr(ast::StmtExpr { value, .. }) => Ok(Node::Expr(self.parse_expression(*value)?)),
            Stmt::Pass(_) => Ok(Node::Pass),
            Stmt::Break(_) => Ok(Node::Break),
            Stmt::Continue(_) => Ok(Node::Continue),
            Stmt::IpyEscapeCommand(_) => Err(ParseError::not_supported("IPython escape command", line)),
        }
    }

    fn parse_except_handler(&mut self, handler: ast::ExceptHandler) -> Result<ExceptHandler, ParseError> {
        let ast::ExceptHandler::ExceptHandler(handler) = handler;
        Ok(ExceptHandler {
            exc_type: handler.type_.map(|t| self.parse_expression(*t)).transpose()?,
            name: handler.name.map(|n| n.as_str().to_owned()),
            body: self.parse_statements(handler.body)?,
        })
    }

    fn parse_function_def(
        &mut self,
        name: &str,
        parameters: ast::Parameters,
        body: Vec<NodeLoc>,
        line: u32,
    ) -> Result<FunctionDef, ParseError> {
        let ast::Parameters {
            posonlyargs,
            args,
            vararg,
            kwonlyargs,
            kwarg,
            ..
        } = parameters;
        let params = posonlyargs
            .into_iter()
            .chain(args)
            .map(|p| self.parse_param(p))
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen_default = false;
        for param in &params {
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(ParseError::syntax(
                    "parameter without a default follows parameter with a default",
                    line,
                ));
            }
        }
        Ok(FunctionDef {
            name: name.to_owned(),
            params,
            var_args: vararg.map(|p| p.name.as_str().to_owned()),
            kwonly: kwonlyargs
                .into_iter()
                .map(|p| self.parse_param(p))
                .collect::<Result<_, _>>()?,
            var_kwargs: kwarg.map(|p| p.name.as_str().to_owned()),
            body,
        })
    }

    fn parse_param(&mut self, param: ParameterWithDefault) -> Result<Param, ParseError> {
        Ok(Param {
            name: param.parameter.name.as_str().to_owned(),
            default: param.default.map(|d| self.parse_expression(*d)).transpose()?,
        })
    }

    fn parse_target(&mut self, target: AstExpr, line: u32) -> Result<Target, ParseError> {
        match target {
            AstExpr::Name(ast::ExprName { id, .. }) => Ok(Target::Name(id.to_string())),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(Target::Subscript {
                object: self.parse_expression(*value)?,
                index: self.parse_expression(*slice)?,
            }),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(Target::Attribute {
                object: self.parse_expression(*value)?,
                attr: attr.as_str().to_owned(),
            }),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) | AstExpr::List(ast::ExprList { elts, .. }) => {
                let targets: Vec<Target> = elts
                    .into_iter()
                    .map(|e| self.parse_target(e, line))
                    .collect::<Result<_, _>>()?;
                if targets.iter().filter(|t| matches!(t, Target::Starred(_))).count() > 1 {
                    return Err(ParseError::syntax("multiple starred expressions in assignment", line));
                }
                Ok(Target::Unpack(targets))
            }
            AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                Ok(Target::Starred(Box::new(self.parse_target(*value, line)?)))
            }
            other => Err(ParseError::syntax(
                format!("cannot assign to {}", describe_expr(&other)),
                line,
            )),
        }
    }

    fn parse_expression(&mut self, expression: AstExpr) -> Result<Expr, ParseError> {
        self.decr_depth_remaining(|| expression.range())?;
        let result = self.parse_expression_impl(expression);
        self.depth_remaining += 1;
        result
    }

    fn parse_expressions(&mut self, expressions: Vec<AstExpr>) -> Result<Vec<Expr>, ParseError> {
        expressions.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    fn parse_expression_impl(&mut self, expression: AstExpr) -> Result<Expr, ParseError> {
        let line = self.line_of(expression.range());
        match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
                // `a and b and c` right-folds into `a and (b and c)`
                let mut values_iter = values.into_iter().rev();
                let Some(last_value) = values_iter.next() else {
                    return Err(ParseError::syntax("empty boolean operation", line));
                };
                let mut result = self.parse_expression(last_value)?;
                for value in values_iter {
                    let left = Box::new(self.parse_expression(value)?);
                    result = match op {
                        BoolOp::And => Expr::And(left, Box::new(result)),
                        BoolOp::Or => Expr::Or(left, Box::new(result)),
                    };
                }
                Ok(result)
            }
            AstExpr::Named(ast::ExprNamed { target, value, .. }) => {
                let AstExpr::Name(ast::ExprName { id, .. }) = *target else {
                    return Err(ParseError::syntax(
                        "assignment expression target must be a name",
                        line,
                    ));
                };
                Ok(Expr::Named {
                    target: id.to_string(),
                    value: Box::new(self.parse_expression(*value)?),
                })
            }
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => Ok(Expr::Op {
                left: Box::new(self.parse_expression(*left)?),
                op: convert_op(op),
                right: Box::new(self.parse_expression(*right)?),
            }),
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
                let operand = self.parse_expression(*operand)?;
                let op = match op {
                    UnaryOp::Not => UnaryOperator::Not,
                    UnaryOp::USub => UnaryOperator::Neg,
                    UnaryOp::UAdd => UnaryOperator::Pos,
                    UnaryOp::Invert => UnaryOperator::Invert,
                };
                // fold negative numeric literals so `-5` is a constant
                match (op, &operand) {
                    (UnaryOperator::Neg, Expr::Literal(Value::Int(i))) if *i != i64::MIN => {
                        Ok(Expr::Literal(Value::Int(-*i)))
                    }
                    (UnaryOperator::Neg, Expr::Literal(Value::Float(f))) => Ok(Expr::Literal(Value::Float(-*f))),
                    _ => Ok(Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    }),
                }
            }
            AstExpr::Lambda(ast::ExprLambda { parameters, body, .. }) => {
                let body_expr = self.parse_expression(*body)?;
                let body = vec![NodeLoc {
                    line,
                    node: Node::Return(Some(body_expr)),
                }];
                let def = match parameters {
                    Some(parameters) => self.parse_function_def("<lambda>", *parameters, body, line)?,
                    None => FunctionDef {
                        name: "<lambda>".to_owned(),
                        params: Vec::new(),
                        var_args: None,
                        kwonly: Vec::new(),
                        var_kwargs: None,
                        body,
                    },
                };
                Ok(Expr::Lambda(Rc::new(def)))
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => Ok(Expr::IfElse {
                test: Box::new(self.parse_expression(*test)?),
                body: Box::new(self.parse_expression(*body)?),
                orelse: Box::new(self.parse_expression(*orelse)?),
            }),
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut parsed = Vec::with_capacity(items.len());
                for ast::DictItem { key, value } in items {
                    let value = self.parse_expression(value)?;
                    parsed.push(match key {
                        Some(key) => DictItem::Pair(self.parse_expression(key)?, value),
                        None => DictItem::Unpack(value),
                    });
                }
                Ok(Expr::Dict(parsed))
            }
            AstExpr::Set(ast::ExprSet { elts, .. }) => Ok(Expr::Set(self.parse_expressions(elts)?)),
            AstExpr::ListComp(ast::ExprListComp { elt, generators, .. }) => Ok(Expr::Comprehension {
                kind: ComprehensionKind::List(Box::new(self.parse_expression(*elt)?)),
                generators: self.parse_comprehensions(generators, line)?,
            }),
            AstExpr::SetComp(ast::ExprSetComp { elt, generators, .. }) => Ok(Expr::Comprehension {
                kind: ComprehensionKind::Set(Box::new(self.parse_expression(*elt)?)),
                generators: self.parse_comprehensions(generators, line)?,
            }),
            AstExpr::DictComp(ast::ExprDictComp {
                key, value, generators, ..
            }) => Ok(Expr::Comprehension {
                kind: ComprehensionKind::Dict(
                    Box::new(self.parse_expression(*key)?),
                    Box::new(self.parse_expression(*value)?),
                ),
                generators: self.parse_comprehensions(generators, line)?,
            }),
            AstExpr::Generator(ast::ExprGenerator { elt, generators, .. }) => Ok(Expr::Comprehension {
                kind: ComprehensionKind::Generator(Box::new(self.parse_expression(*elt)?)),
                generators: self.parse_comprehensions(generators, line)?,
            }),
            AstExpr::Await(_) => Err(ParseError::not_supported("await", line)),
            AstExpr::Yield(_) | AstExpr::YieldFrom(_) => Err(ParseError::not_supported("yield", line)),
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => {
                let left = Box::new(self.parse_expression(*left)?);
                let ops = ops
                    .into_vec()
                    .into_iter()
                    .zip(comparators.into_vec())
                    .map(|(op, comparator)| Ok((convert_compare_op(op), self.parse_expression(comparator)?)))
                    .collect::<Result<_, ParseError>>()?;
                Ok(Expr::Compare { left, ops })
            }
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let ast::Arguments { args, keywords, .. } = arguments;
                let args = self.parse_call_args(args.into_vec(), keywords.into_vec())?;
                match *func {
                    AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(Expr::AttrCall {
                        object: Box::new(self.parse_expression(*value)?),
                        attr: attr.as_str().to_owned(),
                        args,
                    }),
                    other => Ok(Expr::Call {
                        func: Box::new(self.parse_expression(other)?),
                        args,
                    }),
                }
            }
            AstExpr::FString(ast::ExprFString { value, .. }) => {
                let mut parts = Vec::new();
                for fstring_part in &value {
                    match fstring_part {
                        ast::FStringPart::Literal(lit) => parts.push(FStringPart::Literal(lit.value.to_string())),
                        ast::FStringPart::FString(fstring) => {
                            for element in &fstring.elements {
                                parts.push(self.parse_fstring_element(element)?);
                            }
                        }
                    }
                }
                Ok(Expr::FString(parts))
            }
            AstExpr::TString(_) => Err(ParseError::not_supported("template string", line)),
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                Ok(Expr::Literal(Value::from(value.to_string())))
            }
            AstExpr::BytesLiteral(ast::ExprBytesLiteral { value, .. }) => {
                let bytes: Cow<'_, [u8]> = Cow::from(&value);
                Ok(Expr::Literal(Value::Bytes(bytes.into_owned().into())))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => match value {
                Number::Int(i) => match i.as_i64() {
                    Some(i) => Ok(Expr::Literal(Value::Int(i))),
                    None => Err(ParseError::not_supported("integer literal larger than 64 bits", line)),
                },
                Number::Float(f) => Ok(Expr::Literal(Value::Float(f))),
                Number::Complex { .. } => Err(ParseError::not_supported("complex number", line)),
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => Ok(Expr::Literal(Value::Bool(value))),
            AstExpr::NoneLiteral(_) => Ok(Expr::Literal(Value::None)),
            AstExpr::EllipsisLiteral(_) => Ok(Expr::Literal(Value::Ellipsis)),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(Expr::Attribute {
                object: Box::new(self.parse_expression(*value)?),
                attr: attr.as_str().to_owned(),
            }),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(Expr::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_expression(*slice)?),
            }),
            AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                Ok(Expr::Starred(Box::new(self.parse_expression(*value)?)))
            }
            AstExpr::Name(ast::ExprName { id, .. }) => Ok(Expr::Name(id.to_string())),
            AstExpr::List(ast::ExprList { elts, .. }) => Ok(Expr::List(self.parse_expressions(elts)?)),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Ok(Expr::Tuple(self.parse_expressions(elts)?)),
            AstExpr::Slice(ast::ExprSlice {
                lower, upper, step, ..
            }) => Ok(Expr::Slice {
                lower: self.parse_optional_box(lower)?,
                upper: self.parse_optional_box(upper)?,
                step: self.parse_optional_box(step)?,
            }),
            AstExpr::IpyEscapeCommand(_) => Err(ParseError::not_supported("IPython escape command", line)),
        }
    }

    fn parse_optional_box(&mut self, expr: Option<Box<AstExpr>>) -> Result<Option<Box<Expr>>, ParseError> {
        expr.map(|e| self.parse_expression(*e).map(Box::new)).transpose()
    }

    fn parse_comprehensions(
        &mut self,
        generators: Vec<ast::Comprehension>,
        line: u32,
    ) -> Result<Vec<Comprehension>, ParseError> {
        generators
            .into_iter()
            .map(|generator| {
                if generator.is_async {
                    return Err(ParseError::not_supported("async comprehension", line));
                }
                Ok(Comprehension {
                    target: self.parse_target(generator.target, line)?,
                    iter: self.parse_expression(generator.iter)?,
                    ifs: self.parse_expressions(generator.ifs)?,
                })
            })
            .collect()
    }

    fn parse_call_args(&mut self, args: Vec<AstExpr>, keywords: Vec<Keyword>) -> Result<Vec<Arg>, ParseError> {
        let mut parsed = Vec::with_capacity(args.len() + keywords.len());
        for arg in args {
            parsed.push(match arg {
                AstExpr::Starred(ast::ExprStarred { value, .. }) => Arg::Star(self.parse_expression(*value)?),
                other => Arg::Positional(self.parse_expression(other)?),
            });
        }
        for Keyword { arg, value, .. } in keywords {
            let value = self.parse_expression(value)?;
            parsed.push(match arg {
                Some(name) => Arg::Keyword(name.as_str().to_owned(), value),
                None => Arg::DoubleStar(value),
            });
        }
        Ok(parsed)
    }

    fn parse_fstring_element(&mut self, element: &InterpolatedStringElement) -> Result<FStringPart, ParseError> {
        match element {
            InterpolatedStringElement::Literal(lit) => Ok(FStringPart::Literal(lit.value.to_string())),
            InterpolatedStringElement::Interpolation(interp) => {
                let expr = Box::new(self.parse_expression((*interp.expression).clone())?);
                let format_spec = match &interp.format_spec {
                    Some(spec) => Some(
                        spec.elements
                            .iter()
                            .map(|e| self.parse_fstring_element(e))
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    None => None,
                };
                let debug_text = interp
                    .debug_text
                    .as_ref()
                    .map(|debug| format!("{}{}{}", debug.leading, &self.code[interp.expression.range()], debug.trailing));
                Ok(FStringPart::Interpolation {
                    expr,
                    conversion: convert_conversion_flag(interp.conversion),
                    format_spec,
                    debug_text,
                })
            }
        }
    }
}

fn convert_op(op: AstOperator) -> Operator {
    match op {
        AstOperator::Add => Operator::Add,
        AstOperator::Sub => Operator::Sub,
        AstOperator::Mult => Operator::Mult,
        AstOperator::MatMult => Operator::MatMult,
        AstOperator::Div => Operator::Div,
        AstOperator::Mod => Operator::Mod,
        AstOperator::Pow => Operator::Pow,
        AstOperator::LShift => Operator::LShift,
        AstOperator::RShift => Operator::RShift,
        AstOperator::BitOr => Operator::BitOr,
        AstOperator::BitXor => Operator::BitXor,
        AstOperator::BitAnd => Operator::BitAnd,
        AstOperator::FloorDiv => Operator::FloorDiv,
    }
}

fn convert_compare_op(op: CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

fn convert_conversion_flag(flag: RuffConversionFlag) -> Conversion {
    match flag {
        RuffConversionFlag::None => Conversion::None,
        RuffConversionFlag::Str => Conversion::Str,
        RuffConversionFlag::Repr => Conversion::Repr,
        RuffConversionFlag::Ascii => Conversion::Ascii,
    }
}

/// Human-readable name of an expression kind for "cannot assign to" errors.
fn describe_expr(expr: &AstExpr) -> &'static str {
    match expr {
        AstExpr::Call(_) => "function call",
        AstExpr::StringLiteral(_)
        | AstExpr::BytesLiteral(_)
        | AstExpr::NumberLiteral(_)
        | AstExpr::BooleanLiteral(_)
        | AstExpr::NoneLiteral(_)
        | AstExpr::EllipsisLiteral(_) => "literal",
        AstExpr::FString(_) => "f-string expression",
        AstExpr::Lambda(_) => "lambda",
        AstExpr::Compare(_) => "comparison",
        AstExpr::BinOp(_) | AstExpr::UnaryOp(_) | AstExpr::BoolOp(_) => "expression",
        _ => "this expression",
    }
}
