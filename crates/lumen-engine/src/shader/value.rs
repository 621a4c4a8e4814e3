use std::borrow::Cow;

/// A value passed to a uniform setter or a uniform-block field.
///
/// Scalars write a single element; slices are flat arrays (vector
/// components, matrix columns, array elements, in that nesting order).
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
    Floats(&'a [f32]),
    Ints(&'a [i32]),
    Uints(&'a [u32]),
}

impl<'a> UniformValue<'a> {
    pub fn is_array(&self) -> bool {
        matches!(self, UniformValue::Floats(_) | UniformValue::Ints(_) | UniformValue::Uints(_))
    }

    pub fn len(&self) -> usize {
        match self {
            UniformValue::Floats(v) => v.len(),
            UniformValue::Ints(v) => v.len(),
            UniformValue::Uints(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i` as a loosely typed number.
    pub(crate) fn scalar(&self, i: usize) -> Option<Scalar> {
        match self {
            UniformValue::Float(v) => (i == 0).then_some(Scalar::F(*v)),
            UniformValue::Int(v) => (i == 0).then_some(Scalar::I(*v)),
            UniformValue::Uint(v) => (i == 0).then_some(Scalar::U(*v)),
            UniformValue::Bool(v) => (i == 0).then_some(Scalar::U(u32::from(*v))),
            UniformValue::Floats(v) => v.get(i).map(|x| Scalar::F(*x)),
            UniformValue::Ints(v) => v.get(i).map(|x| Scalar::I(*x)),
            UniformValue::Uints(v) => v.get(i).map(|x| Scalar::U(*x)),
        }
    }

    /// Float data, if the value is float-typed.
    pub fn as_f32s(&self) -> Option<Cow<'a, [f32]>> {
        match *self {
            UniformValue::Float(v) => Some(Cow::Owned(vec![v])),
            UniformValue::Floats(v) => Some(Cow::Borrowed(v)),
            _ => None,
        }
    }

    /// Signed integer data; booleans become 0/1.
    pub fn as_i32s(&self) -> Option<Cow<'a, [i32]>> {
        match *self {
            UniformValue::Int(v) => Some(Cow::Owned(vec![v])),
            UniformValue::Bool(v) => Some(Cow::Owned(vec![i32::from(v)])),
            UniformValue::Ints(v) => Some(Cow::Borrowed(v)),
            _ => None,
        }
    }

    /// Unsigned integer data; booleans become 0/1.
    pub fn as_u32s(&self) -> Option<Cow<'a, [u32]>> {
        match *self {
            UniformValue::Uint(v) => Some(Cow::Owned(vec![v])),
            UniformValue::Bool(v) => Some(Cow::Owned(vec![u32::from(v)])),
            UniformValue::Uints(v) => Some(Cow::Borrowed(v)),
            _ => None,
        }
    }
}

/// One element of a [`UniformValue`], before conversion to field storage.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum Scalar {
    F(f32),
    I(i32),
    U(u32),
}

impl Scalar {
    pub(crate) fn to_f32(self) -> f32 {
        match self {
            Scalar::F(v) => v,
            Scalar::I(v) => v as f32,
            Scalar::U(v) => v as f32,
        }
    }

    pub(crate) fn to_i32(self) -> i32 {
        match self {
            Scalar::F(v) => v as i32,
            Scalar::I(v) => v,
            Scalar::U(v) => v as i32,
        }
    }

    pub(crate) fn to_u32(self) -> u32 {
        match self {
            Scalar::F(v) => v as u32,
            Scalar::I(v) => v as u32,
            Scalar::U(v) => v,
        }
    }
}

impl From<f32> for UniformValue<'_> {
    fn from(v: f32) -> Self { UniformValue::Float(v) }
}

impl From<i32> for UniformValue<'_> {
    fn from(v: i32) -> Self { UniformValue::Int(v) }
}

impl From<u32> for UniformValue<'_> {
    fn from(v: u32) -> Self { UniformValue::Uint(v) }
}

impl From<bool> for UniformValue<'_> {
    fn from(v: bool) -> Self { UniformValue::Bool(v) }
}

impl<'a> From<&'a [f32]> for UniformValue<'a> {
    fn from(v: &'a [f32]) -> Self { UniformValue::Floats(v) }
}

impl<'a> From<&'a [i32]> for UniformValue<'a> {
    fn from(v: &'a [i32]) -> Self { UniformValue::Ints(v) }
}

impl<'a> From<&'a [u32]> for UniformValue<'a> {
    fn from(v: &'a [u32]) -> Self { UniformValue::Uints(v) }
}

impl<'a, const N: usize> From<&'a [f32; N]> for UniformValue<'a> {
    fn from(v: &'a [f32; N]) -> Self { UniformValue::Floats(v) }
}

impl<'a, const N: usize> From<&'a [i32; N]> for UniformValue<'a> {
    fn from(v: &'a [i32; N]) -> Self { UniformValue::Ints(v) }
}

impl<'a, const N: usize> From<&'a [u32; N]> for UniformValue<'a> {
    fn from(v: &'a [u32; N]) -> Self { UniformValue::Uints(v) }
}

impl<'a> From<&'a Vec<f32>> for UniformValue<'a> {
    fn from(v: &'a Vec<f32>) -> Self { UniformValue::Floats(v) }
}

/// Named values for one `set` call on a uniform block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockValues<'a> {
    entries: Vec<(&'a str, UniformValue<'a>)>,
}

impl<'a> BlockValues<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'a str, value: impl Into<UniformValue<'a>>) -> Self {
        self.entries.push((name, value.into()));
        self
    }

    pub fn push(&mut self, name: &'a str, value: impl Into<UniformValue<'a>>) {
        self.entries.push((name, value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &UniformValue<'a>)> {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
