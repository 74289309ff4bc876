use crate::{
    args::{CallArgs, expect_str},
    exception::{ExcType, RunResult},
    modules::Stream,
    run::Interpreter,
    value::Value,
};

pub(crate) fn constant(name: &str) -> Option<Value> {
    match name {
        "stdout" => Some(Value::Stream(Stream::Stdout)),
        "stderr" => Some(Value::Stream(Stream::Stderr)),
        "maxsize" => Some(Value::Int(i64::MAX)),
        "platform" => Some(Value::from(std::env::consts::OS)),
        _ => None,
    }
}

/// `sys.stdout.write(text)` and friends; output goes to the captured streams.
pub(crate) fn call_stream_method(
    interp: &mut Interpreter<'_>,
    stream: Stream,
    name: &str,
    args: CallArgs,
) -> RunResult<Value> {
    match name {
        "write" => {
            let text = args.get_one_arg("write")?;
            let text = expect_str(&text, "write() argument")?;
            let written = text.chars().count();
            match stream {
                Stream::Stdout => interp.print().stdout_write(text.to_owned().into()),
                Stream::Stderr => interp.print().stderr_write(text.to_owned().into()),
            }
            Ok(Value::from(written))
        }
        "flush" => {
            args.check_zero_args("flush")?;
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("TextIOWrapper", name)),
    }
}
