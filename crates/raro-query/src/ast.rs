use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Arg::Str(s) => Value::String(s.clone()),
            Arg::Num(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Arg::Bool(b) => Value::Bool(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    V(Vec<String>),
    E(Vec<String>),
    HasLabel(Vec<String>),
    Has(String, Option<Value>),
    Out(Vec<String>),
    In(Vec<String>),
    Both(Vec<String>),
    Values(Vec<String>),
    Count,
    Limit(usize),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub steps: Vec<Step>,
}
