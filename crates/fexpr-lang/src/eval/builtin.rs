use std::sync::LazyLock;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::value::Value;

/// Name of the foreign-dataset lookup, evaluated by the tree walker itself.
pub const GET_FEATURE: &str = "getfeature";
/// Conditional, evaluated lazily by the tree walker.
pub const IF: &str = "if";

#[derive(Clone, Debug)]
pub struct BuiltinFunction {
    pub num_params: ParamNum,
    pub func: fn(&[Value]) -> Value,
}

#[derive(Clone, Debug)]
pub enum ParamNum {
    Fixed(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl ParamNum {
    /// The count reported when a call has the wrong number of arguments.
    pub fn to_num(&self) -> usize {
        match self {
            ParamNum::Fixed(n) | ParamNum::AtLeast(n) => *n,
            ParamNum::Range(_, max) => *max,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self, num_args: usize) -> bool {
        match self {
            ParamNum::Fixed(n) => num_args == *n,
            ParamNum::Range(min, max) => (*min..=*max).contains(&num_args),
            ParamNum::AtLeast(min) => num_args >= *min,
        }
    }
}

impl BuiltinFunction {
    pub fn new(num_params: ParamNum, func: fn(&[Value]) -> Value) -> Self {
        BuiltinFunction { num_params, func }
    }
}

pub static BUILTIN_FUNCTIONS: LazyLock<FxHashMap<SmolStr, BuiltinFunction>> =
    LazyLock::new(|| {
        let mut map = FxHashMap::default();

        map.insert(
            SmolStr::new("coalesce"),
            BuiltinFunction::new(ParamNum::AtLeast(1), |args| {
                args.iter()
                    .find(|v| !v.is_none())
                    .cloned()
                    .unwrap_or_default()
            }),
        );
        map.insert(
            SmolStr::new("concat"),
            BuiltinFunction::new(ParamNum::AtLeast(1), |args| {
                Value::String(args.iter().filter(|v| !v.is_none()).join(""))
            }),
        );
        map.insert(
            SmolStr::new("upper"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match args {
                [Value::String(s)] => Value::String(s.to_uppercase()),
                _ => Value::None,
            }),
        );
        map.insert(
            SmolStr::new("lower"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match args {
                [Value::String(s)] => Value::String(s.to_lowercase()),
                _ => Value::None,
            }),
        );
        map.insert(
            SmolStr::new("length"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match args {
                [Value::String(s)] => Value::Number(s.chars().count().into()),
                [Value::Array(a)] => Value::Number(a.len().into()),
                _ => Value::None,
            }),
        );
        map.insert(
            SmolStr::new("abs"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match args {
                [Value::Number(n)] => Value::Number(n.abs()),
                _ => Value::None,
            }),
        );
        map.insert(
            SmolStr::new("round"),
            BuiltinFunction::new(ParamNum::Range(1, 2), |args| match args {
                [Value::Number(n)] => Value::Number(n.round(0)),
                [Value::Number(n), Value::Number(digits)] => {
                    Value::Number(n.round(digits.value() as i32))
                }
                _ => Value::None,
            }),
        );
        map.insert(
            SmolStr::new("to_number"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match args {
                [value @ (Value::Number(_) | Value::String(_) | Value::Bool(_))] => value
                    .as_number()
                    .map(Value::Number)
                    .unwrap_or_default(),
                _ => Value::None,
            }),
        );
        map.insert(
            SmolStr::new("to_string"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match args {
                [Value::None] => Value::None,
                [value] => Value::String(value.to_string()),
                _ => Value::None,
            }),
        );

        map
    });
