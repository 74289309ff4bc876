//! Standard-library modules snippets can `import`.

pub mod json;
pub mod math;
pub mod os;
pub mod re;
pub mod sys;

use crate::{
    args::CallArgs,
    exception::{ExcType, ExceptionValue, RunResult},
    run::Interpreter,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Re,
    Json,
    Os,
    OsPath,
    Math,
    Sys,
}

impl Module {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Re => "re",
            Self::Json => "json",
            Self::Os => "os",
            Self::OsPath => "os.path",
            Self::Math => "math",
            Self::Sys => "sys",
        }
    }
}

/// A function living in one of the modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFunction {
    Re(re::ReFunction),
    Json(json::JsonFunction),
    Os(os::OsFunction),
    Path(os::PathFunction),
    Math(math::MathFunction),
}

impl ModuleFunction {
    /// Dotted name, e.g. `re.findall`.
    #[must_use]
    pub fn qualified_name(self) -> String {
        let (module, function): (Module, &'static str) = match self {
            Self::Re(f) => (Module::Re, f.into()),
            Self::Json(f) => (Module::Json, f.into()),
            Self::Os(f) => (Module::Os, f.into()),
            Self::Path(f) => (Module::OsPath, f.into()),
            Self::Math(f) => (Module::Math, f.into()),
        };
        format!("{}.{function}", module.name())
    }
}

/// `sys.stdout` / `sys.stderr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Resolves `import name`.
pub fn import(name: &str) -> RunResult<Module> {
    match name {
        "re" => Ok(Module::Re),
        "json" => Ok(Module::Json),
        "os" => Ok(Module::Os),
        "os.path" => Ok(Module::OsPath),
        "math" => Ok(Module::Math),
        "sys" => Ok(Module::Sys),
        _ => Err(ExceptionValue::new(ExcType::ModuleNotFoundError, format!("No module named '{name}'")).into()),
    }
}

/// `module.name`
pub fn get_attr(module: Module, name: &str) -> RunResult<Value> {
    let found = match module {
        Module::Re => name
            .parse()
            .ok()
            .map(|f| Value::ModuleFunction(ModuleFunction::Re(f)))
            .or_else(|| re::constant(name)),
        Module::Json => match name {
            "JSONDecodeError" => Some(Value::ExcClass(ExcType::JSONDecodeError)),
            _ => name.parse().ok().map(|f| Value::ModuleFunction(ModuleFunction::Json(f))),
        },
        Module::Os => match name {
            "path" => Some(Value::Module(Module::OsPath)),
            "sep" => Some(Value::from("/")),
            "linesep" => Some(Value::from("\n")),
            _ => name.parse().ok().map(|f| Value::ModuleFunction(ModuleFunction::Os(f))),
        },
        Module::OsPath => match name {
            "sep" => Some(Value::from("/")),
            _ => name.parse().ok().map(|f| Value::ModuleFunction(ModuleFunction::Path(f))),
        },
        Module::Math => name
            .parse()
            .ok()
            .map(|f| Value::ModuleFunction(ModuleFunction::Math(f)))
            .or_else(|| math::constant(name)),
        Module::Sys => sys::constant(name),
    };
    found.ok_or_else(|| {
        ExceptionValue::new(
            ExcType::AttributeError,
            format!("module '{}' has no attribute '{name}'", module.name()),
        )
        .into()
    })
}

pub(crate) fn call(interp: &mut Interpreter<'_>, function: ModuleFunction, args: CallArgs) -> RunResult<Value> {
    match function {
        ModuleFunction::Re(f) => re::call(interp, f, args),
        ModuleFunction::Json(f) => json::call(f, args),
        ModuleFunction::Os(f) => os::call(f, args),
        ModuleFunction::Path(f) => os::call_path(f, args),
        ModuleFunction::Math(f) => math::call(f, args),
    }
}
