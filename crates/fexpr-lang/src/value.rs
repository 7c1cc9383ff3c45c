use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::number::Number;

#[derive(Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Record(Arc<Record>),
    Filter(Filter),
}

/// A feature's attributes, keyed by attribute name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    attributes: FxHashMap<SmolStr, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(SmolStr::new(name), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Value)> {
        self.attributes.iter()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (SmolStr::new(k.as_ref()), v.into()))
                .collect(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Like => "LIKE",
        }
    }

    /// Applies the operator to two values; comparisons involving `None` are false.
    pub fn apply(&self, lhs: &Value, rhs: &Value) -> bool {
        if let FilterOp::Like = self {
            return match (lhs, rhs) {
                (Value::None, _) | (_, Value::None) => false,
                (lhs, Value::String(pattern)) => like(&lhs.to_string(), pattern),
                _ => false,
            };
        }

        match lhs.compare(rhs) {
            Some(ordering) => match self {
                FilterOp::Eq => ordering == Ordering::Equal,
                FilterOp::NotEq => ordering != Ordering::Equal,
                FilterOp::Lt => ordering == Ordering::Less,
                FilterOp::Lte => ordering != Ordering::Greater,
                FilterOp::Gt => ordering == Ordering::Greater,
                FilterOp::Gte => ordering != Ordering::Less,
                FilterOp::Like => unreachable!(),
            },
            None => false,
        }
    }
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Predicate fragment produced by filter-mode evaluation and consumed by feature sources.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        attribute: SmolStr,
        operator: FilterOp,
        value: Box<Value>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(attribute: &str, operator: FilterOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            attribute: SmolStr::new(attribute),
            operator,
            value: Box::new(value.into()),
        }
    }

    pub fn eq(attribute: &str, value: impl Into<Value>) -> Self {
        Self::compare(attribute, FilterOp::Eq, value)
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::And(mut lhs), Filter::And(rhs)) => {
                lhs.extend(rhs);
                Filter::And(lhs)
            }
            (Filter::And(mut lhs), rhs) => {
                lhs.push(rhs);
                Filter::And(lhs)
            }
            (lhs, rhs) => Filter::And(vec![lhs, rhs]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::Or(mut lhs), Filter::Or(rhs)) => {
                lhs.extend(rhs);
                Filter::Or(lhs)
            }
            (Filter::Or(mut lhs), rhs) => {
                lhs.push(rhs);
                Filter::Or(lhs)
            }
            (lhs, rhs) => Filter::Or(vec![lhs, rhs]),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Compare {
                attribute,
                operator,
                value,
            } => record
                .get(attribute)
                .is_some_and(|actual| operator.apply(actual, value)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(filter) => !filter.matches(record),
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare {
                attribute,
                operator,
                value,
            } => write!(f, "{{{}}} {} {:?}", attribute, operator, value),
            Filter::And(filters) => write!(f, "({})", filters.iter().join(" and ")),
            Filter::Or(filters) => write!(f, "({})", filters.iter().join(" or ")),
            Filter::Not(filter) => write!(f, "not {}", filter),
        }
    }
}

/// SQL `LIKE` matching where `%` matches any run and `_` any single character.
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(Arc::new(record))
    }
}

impl From<Arc<Record>> for Value {
    fn from(record: Arc<Record>) -> Self {
        Value::Record(record)
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        Value::Filter(filter)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::None)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::from).unwrap_or(Value::None),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Into::into).collect()),
            serde_json::Value::Object(o) => Value::Record(Arc::new(o.into_iter().collect())),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => (*n).into(),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Into::into).collect()),
            Value::Record(r) => serde_json::Value::Object(
                r.iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect(),
            ),
            Value::Filter(filter) => filter.into(),
        }
    }
}

impl From<&Filter> for serde_json::Value {
    fn from(filter: &Filter) -> Self {
        match filter {
            Filter::Compare {
                attribute,
                operator,
                value,
            } => serde_json::json!([attribute.as_str(), operator.as_str(), serde_json::Value::from(value.as_ref())]),
            Filter::And(filters) => serde_json::json!({
                "and": filters.iter().map(serde_json::Value::from).collect::<Vec<_>>()
            }),
            Filter::Or(filters) => serde_json::json!({
                "or": filters.iter().map(serde_json::Value::from).collect::<Vec<_>>()
            }),
            Filter::Not(filter) => serde_json::json!({ "not": serde_json::Value::from(filter.as_ref()) }),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::None => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(a) => write!(f, "[{}]", a.iter().join(", ")),
            Value::Record(r) => write!(f, "{}", serde_json::Value::from(&Value::Record(Arc::clone(r)))),
            Value::Filter(filter) => write!(f, "{}", filter),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(a) => write!(f, "[{}]", a.iter().map(|v| format!("{:?}", v)).join(", ")),
            _ => write!(f, "{}", self),
        }
    }
}

impl Value {
    pub const NONE: Value = Self::None;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.is_truthy(),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Record(_) | Value::Filter(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Filter(_) => "filter",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => Number::parse(s),
            Value::Bool(b) => Some(Number::from(*b as i32)),
            _ => None,
        }
    }

    /// Orders two scalar values. Numbers compare with numeric strings numerically;
    /// `None`, records and filters are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::String(_)) => other.as_number().map(|b| a.cmp(&b)),
            (Value::String(_), Value::Number(b)) => self.as_number().map(|a| a.cmp(b)),
            _ => None,
        }
    }

    pub fn get(&self, attribute: &str) -> Value {
        match self {
            Value::Record(record) => record.get(attribute).cloned().unwrap_or_default(),
            _ => Value::None,
        }
    }
}
