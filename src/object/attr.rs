//! Attribute side table attached to objects, polygons and vertices.
//!
//! Attributes are name/value pairs kept in insertion order. Names compare
//! case-insensitively, matching the keyword rules of the text format.

use smallvec::SmallVec;
use std::fmt;

use super::Object;

/// Attribute holding the animation data of an object.
pub const ATTR_ANIMATION: &str = "animation";
/// Attribute hiding an object from flattening.
pub const ATTR_INVISIBLE: &str = "invisible";
/// Marker set on geometry produced by instance resolution.
pub const ATTR_INSTANCE: &str = "_instance";

/// Non-owning alias to another object, e.g. a host-side handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub u64);

/// Typed attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Int(i32),
    Real(f64),
    Uv([f32; 2]),
    Str(String),
    /// Opaque host pointer. Never persisted.
    Ptr(usize),
    /// Borrowed reference to an object owned elsewhere. Never persisted.
    RefPtr(ObjectRef),
    /// Owned nested object.
    Object(Box<Object>),
}

impl AttrValue {
    /// Whether the writers can serialize this value.
    #[inline]
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Ptr(_) | Self::RefPtr(_))
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Uv(_) => "uv",
            Self::Str(_) => "string",
            Self::Ptr(_) => "ptr",
            Self::RefPtr(_) => "refptr",
            Self::Object(_) => "object",
        }
    }

    /// Numeric value, integers widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Structural comparison with a tolerance on reals.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        match (self, other) {
            (Self::Real(a), Self::Real(b)) => crate::util::approx_eq(*a, *b, eps),
            (Self::Uv(a), Self::Uv(b)) => a
                .iter()
                .zip(b)
                .all(|(x, y)| crate::util::approx_eq(*x as f64, *y as f64, eps)),
            (Self::Object(a), Self::Object(b)) => a.approx_eq(b, eps),
            (a, b) => a == b,
        }
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Object> for AttrValue {
    fn from(v: Object) -> Self {
        Self::Object(Box::new(v))
    }
}

/// A named attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

/// Ordered attribute list.
///
/// Uses SmallVec optimization for the common case of few entries.
#[derive(Clone, Default, PartialEq)]
pub struct Attributes {
    entries: SmallVec<[Attribute; 2]>,
}

impl Attributes {
    /// Create an empty attribute list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any attribute with the same name in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();

        for attr in &mut self.entries {
            if attr.name.eq_ignore_ascii_case(&name) {
                attr.value = value;
                return;
            }
        }
        self.entries.push(Attribute { name, value });
    }

    /// Get an attribute value by name.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| &a.value)
    }

    /// Get a mutable attribute value by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttrValue> {
        self.entries
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| &mut a.value)
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Real value; integer attributes are widened.
    pub fn get_real(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_real()
    }

    pub fn get_uv(&self, name: &str) -> Option<[f32; 2]> {
        match self.get(name)? {
            AttrValue::Uv(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            AttrValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_object(&self, name: &str) -> Option<&Object> {
        match self.get(name)? {
            AttrValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Check if an attribute exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Remove an attribute and return its value.
    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let pos = self
            .entries
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).value)
    }

    /// Iterate over attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }

    /// Attributes the writers serialize.
    pub fn persistent(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter().filter(|a| a.value.is_persistent())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only attributes matching the predicate.
    pub fn retain(&mut self, mut f: impl FnMut(&Attribute) -> bool) {
        self.entries.retain(|a| f(a))
    }

    /// Order-insensitive comparison of the persistent attributes.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        let count = self.persistent().count();
        count == other.persistent().count()
            && self.persistent().all(|a| {
                other
                    .get(&a.name)
                    .is_some_and(|b| a.value.approx_eq(b, eps))
            })
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|a| (&a.name, &a.value)))
            .finish()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
