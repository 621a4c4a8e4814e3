use std::collections::BTreeMap;
use std::fmt;

/// Value of a `#define` injected ahead of a shader's source.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineValue::Int(v) => write!(f, "{v}"),
            DefineValue::Float(v) => write!(f, "{v}"),
            DefineValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i32> for DefineValue {
    fn from(v: i32) -> Self { DefineValue::Int(v.into()) }
}

impl From<i64> for DefineValue {
    fn from(v: i64) -> Self { DefineValue::Int(v) }
}

impl From<u32> for DefineValue {
    fn from(v: u32) -> Self { DefineValue::Int(v.into()) }
}

impl From<f32> for DefineValue {
    fn from(v: f32) -> Self { DefineValue::Float(v.into()) }
}

impl From<f64> for DefineValue {
    fn from(v: f64) -> Self { DefineValue::Float(v) }
}

impl From<&str> for DefineValue {
    fn from(v: &str) -> Self { DefineValue::Str(v.to_owned()) }
}

impl From<String> for DefineValue {
    fn from(v: String) -> Self { DefineValue::Str(v) }
}

/// Macro definitions for one shader instance.
///
/// Entries are kept sorted by name, so the rendered `#define` block and the
/// instance key do not depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderDefines {
    entries: BTreeMap<String, DefineValue>,
}

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<DefineValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<DefineValue>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&DefineValue> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DefineValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `#define NAME VALUE` lines in name order.
    pub fn to_lines(&self) -> Vec<String> {
        self.iter().map(|(name, value)| format!("#define {name} {value}")).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ShaderDefines
where
    K: Into<String>,
    V: Into<DefineValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut defines = ShaderDefines::new();
        for (k, v) in iter {
            defines.insert(k, v);
        }
        defines
    }
}

/// Cache key identifying a compiled shader instance.
///
/// Two requests with the same URI, preamble, and define set produce the same
/// key regardless of the order the defines were inserted in.
pub fn instance_key(uri: &str, preamble: &str, defines: &ShaderDefines) -> String {
    let mut key = String::with_capacity(uri.len() + preamble.len() + 16 * defines.len());
    key.push_str(uri);
    key.push('\0');
    key.push_str(preamble);
    for (name, value) in defines.iter() {
        key.push('\0');
        key.push_str(name);
        key.push('\u{1}');
        key.push_str(&value.to_string());
    }
    key
}
