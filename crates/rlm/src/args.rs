use crate::{
    exception::{ExcType, RunResult},
    value::Value,
};

/// Evaluated arguments of a call: positional values then keyword pairs in source order.
#[derive(Debug, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    #[must_use]
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    /// Checks that no arguments were passed.
    pub fn check_zero_args(self, name: &str) -> RunResult<()> {
        match self.count() {
            0 => Ok(()),
            count => Err(ExcType::type_error(format_args!(
                "{name}() takes no arguments ({count} given)"
            ))),
        }
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub fn get_one_arg(self, name: &str) -> RunResult<Value> {
        if let Some((key, _)) = self.keywords.first() {
            return Err(ExcType::unexpected_keyword(name, key));
        }
        let count = self.positional.len();
        let mut positional = self.positional.into_iter();
        match (positional.next(), count) {
            (Some(value), 1) => Ok(value),
            _ => Err(ExcType::arg_count(name, 1, count)),
        }
    }

    /// Removes and returns keyword argument `key`, if present.
    pub fn take_keyword(&mut self, key: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(k, _)| k == key)?;
        Some(self.keywords.remove(index).1)
    }

    /// Binds arguments to named parameters, positionally first and then by keyword.
    ///
    /// The first `required` parameters must be supplied; the rest come back as `None`
    /// when omitted.
    pub fn bind<const N: usize>(
        self,
        name: &str,
        params: [&str; N],
        required: usize,
    ) -> RunResult<[Option<Value>; N]> {
        let mut slots: [Option<Value>; N] = std::array::from_fn(|_| None);
        let count = self.positional.len();
        if count > N {
            return Err(ExcType::at_most(name, N, count));
        }
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (key, value) in self.keywords {
            let Some(index) = params.iter().position(|p| *p == key) else {
                return Err(ExcType::unexpected_keyword(name, &key));
            };
            if slots[index].is_some() {
                return Err(ExcType::multiple_values(name, &key));
            }
            slots[index] = Some(value);
        }
        if let Some(missing) = params.iter().take(required).zip(&slots).find(|(_, slot)| slot.is_none()) {
            return Err(ExcType::missing_argument(name, missing.0));
        }
        Ok(slots)
    }
}

/// Extracts an integer argument; bools count as ints.
pub(crate) fn expect_int(value: &Value, what: &str) -> RunResult<i64> {
    value.as_int().ok_or_else(|| {
        ExcType::type_error(format_args!(
            "{what} must be an integer, not '{}'",
            value.type_name()
        ))
    })
}

/// Integer argument that defaults when omitted or `None`.
pub(crate) fn int_or(value: Option<Value>, default: i64, what: &str) -> RunResult<i64> {
    match value {
        None | Some(Value::None) => Ok(default),
        Some(value) => expect_int(&value, what),
    }
}

pub(crate) fn expect_str<'a>(value: &'a Value, what: &str) -> RunResult<&'a str> {
    value.as_str().ok_or_else(|| {
        ExcType::type_error(format_args!(
            "{what} must be str, not {}",
            value.type_name()
        ))
    })
}
