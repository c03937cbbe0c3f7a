//! Typed value boxes carried by vertices and edges.
//!
//! Every vertex holds a [`GraphData`] describing the live state of its step,
//! and every edge holds a [`GraphData`] describing the condition that state
//! must meet. [`compare`] decides whether a vertex value satisfies an edge
//! condition.
//!
//! # Type locking
//!
//! A box created with [`GraphData::locked`] only ever holds values of one
//! [`DataType`]. Assigning a value of another type is a no-op, and assigning
//! [`Value::Absent`] resets the box to the type's zero value.
//!
//! ```
//! use waypoint_graph::data::{DataType, GraphData, Value};
//!
//! let mut data = GraphData::locked(DataType::Int);
//! assert_eq!(data.value(), &Value::Int(0));
//!
//! data.assign(Value::Int(3));
//! data.assign(Value::from("ignored"));
//! assert_eq!(data.value(), &Value::Int(3));
//!
//! data.assign(Value::Absent);
//! assert_eq!(data.value(), &Value::Int(0));
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

/// Absolute tolerance applied when two floats are compared without a special case.
pub const FLOAT_TOLERANCE: f64 = 0.3;

/// Prefix of the string value a [`SpecialCase::Button`] condition is rewritten to.
pub const BUTTON_PREFIX: &str = "button:";

/// Returns the value a named UI button pokes into the current vertex.
#[must_use]
pub fn button_value(name: &str) -> Value {
    Value::Str(format!("{BUTTON_PREFIX}{name}").into())
}

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime identity of an object payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectType {
    id: TypeId,
    name: &'static str,
}

impl ObjectType {
    /// Returns the object type for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Signed integer.
    Int,
    /// Double precision float.
    Float,
    /// Boolean flag.
    Bool,
    /// Shared string. Nullable.
    Str,
    /// Shared object of a specific Rust type. Nullable.
    Object(ObjectType),
}

impl DataType {
    /// Returns `true` for types whose absence is a meaningful null.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, DataType::Str | DataType::Object(_))
    }

    /// The zero value a locked box of this type resets to.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            DataType::Int => Value::Int(0),
            DataType::Float => Value::Float(0.0),
            DataType::Bool => Value::Bool(false),
            DataType::Str | DataType::Object(_) => Value::Absent,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => f.write_str("int"),
            DataType::Float => f.write_str("float"),
            DataType::Bool => f.write_str("bool"),
            DataType::Str => f.write_str("string"),
            DataType::Object(ty) => f.write_str(ty.name),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Values
// ─────────────────────────────────────────────────────────────────────────────

/// A shared, type-tagged object payload.
///
/// Equality is identity: two refs are equal when they point at the same allocation.
#[derive(Clone)]
pub struct ObjectRef {
    ty: ObjectType,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Wraps a value in a new shared allocation.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an existing shared allocation.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            ty: ObjectType::of::<T>(),
            inner: value,
        }
    }

    /// Returns the runtime type of the payload.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        self.ty
    }

    /// Borrows the payload as `T`, if that is its type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("type", &self.ty.name)
            .finish()
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// No value. Plays the role of null for reference types.
    #[default]
    Absent,
    /// Signed integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Shared string.
    Str(Arc<str>),
    /// Shared object.
    Object(ObjectRef),
}

impl Value {
    /// Returns the type tag, or `None` for [`Value::Absent`].
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Absent => None,
            Value::Int(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Str(_) => Some(DataType::Str),
            Value::Object(obj) => Some(DataType::Object(obj.ty)),
        }
    }

    /// Returns `true` for [`Value::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Returns the integer payload.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(&**v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("<absent>"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Object(obj) => write!(f, "<{}>", obj.ty.name),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Absent, Into::into)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Special cases
// ─────────────────────────────────────────────────────────────────────────────

/// Named comparison rules usable on an edge condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SpecialCase {
    /// Plain equality (with float tolerance).
    #[default]
    None,
    /// Always satisfied.
    AlwaysPass,
    /// Satisfied when the vertex holds a non-null reference value.
    NotNull,
    /// Satisfied when the vertex value's type equals the condition's locked type.
    PassByType,
    /// Satisfied by a named UI button. Rewritten to plain string equality when
    /// the edge is built; see [`GraphData::resolve_button`].
    Button(String),
    /// Vertex int strictly greater than the condition int.
    GreaterThanInt,
    /// Vertex int strictly less than the condition int.
    LessThanInt,
    /// Vertex float strictly greater than the condition float.
    GreaterThanFloat,
    /// Vertex float strictly less than the condition float.
    LessThanFloat,
}

/// Error returned when parsing an unknown special-case name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown special case: '{0}'")]
pub struct ParseSpecialCaseError(pub String);

impl FromStr for SpecialCase {
    type Err = ParseSpecialCaseError;

    /// Parses the authoring vocabulary: `AlwaysPass`, `NotNull`, `PassByType`,
    /// `Button(name)`, `GreaterThan_Int`, `LessThan_Int`, `GreaterThan_Float`,
    /// `LessThan_Float` (and `None`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let case = match trimmed {
            "None" => SpecialCase::None,
            "AlwaysPass" => SpecialCase::AlwaysPass,
            "NotNull" => SpecialCase::NotNull,
            "PassByType" => SpecialCase::PassByType,
            "GreaterThan_Int" => SpecialCase::GreaterThanInt,
            "LessThan_Int" => SpecialCase::LessThanInt,
            "GreaterThan_Float" => SpecialCase::GreaterThanFloat,
            "LessThan_Float" => SpecialCase::LessThanFloat,
            other => {
                let name = other
                    .strip_prefix("Button(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ParseSpecialCaseError(other.to_string()))?;
                SpecialCase::Button(name.to_string())
            }
        };
        Ok(case)
    }
}

impl fmt::Display for SpecialCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialCase::None => f.write_str("None"),
            SpecialCase::AlwaysPass => f.write_str("AlwaysPass"),
            SpecialCase::NotNull => f.write_str("NotNull"),
            SpecialCase::PassByType => f.write_str("PassByType"),
            SpecialCase::Button(name) => write!(f, "Button({name})"),
            SpecialCase::GreaterThanInt => f.write_str("GreaterThan_Int"),
            SpecialCase::LessThanInt => f.write_str("LessThan_Int"),
            SpecialCase::GreaterThanFloat => f.write_str("GreaterThan_Float"),
            SpecialCase::LessThanFloat => f.write_str("LessThan_Float"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GraphData
// ─────────────────────────────────────────────────────────────────────────────

/// A value box with an optional type lock and an optional special case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphData {
    value: Value,
    locked_type: Option<DataType>,
    special_case: SpecialCase,
}

impl GraphData {
    /// Creates an unlocked box holding `value`.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            locked_type: None,
            special_case: SpecialCase::None,
        }
    }

    /// Creates an unlocked, empty box.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a box locked to `ty`, holding the type's zero value.
    #[must_use]
    pub fn locked(ty: DataType) -> Self {
        Self {
            value: ty.default_value(),
            locked_type: Some(ty),
            special_case: SpecialCase::None,
        }
    }

    /// Creates a box locked to the type of `value`.
    ///
    /// An absent value produces an unlocked empty box.
    #[must_use]
    pub fn locked_to(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            locked_type: value.data_type(),
            value,
            special_case: SpecialCase::None,
        }
    }

    /// Creates an empty condition carrying only a special case.
    #[must_use]
    pub fn special(case: SpecialCase) -> Self {
        Self::empty().with_special(case)
    }

    /// Condition that is always satisfied.
    #[must_use]
    pub fn always() -> Self {
        Self::special(SpecialCase::AlwaysPass)
    }

    /// Condition satisfied by pressing the named button.
    #[must_use]
    pub fn button(name: impl Into<String>) -> Self {
        Self::special(SpecialCase::Button(name.into())).resolve_button()
    }

    /// Sets the special case.
    #[must_use]
    pub fn with_special(mut self, case: SpecialCase) -> Self {
        self.special_case = case;
        self
    }

    /// Rewrites a [`SpecialCase::Button`] condition into plain string equality
    /// against [`button_value`]. Other conditions are returned unchanged.
    #[must_use]
    pub fn resolve_button(self) -> Self {
        match &self.special_case {
            SpecialCase::Button(name) => Self::locked_to(button_value(name)),
            _ => self,
        }
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the locked type, if any.
    #[must_use]
    pub fn locked_type(&self) -> Option<DataType> {
        self.locked_type
    }

    /// Returns the special case.
    #[must_use]
    pub fn special_case(&self) -> &SpecialCase {
        &self.special_case
    }

    /// Assigns a value, honoring the type lock.
    ///
    /// Returns `false` when a locked box ignored a value of another type.
    pub fn assign(&mut self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let Some(locked) = self.locked_type else {
            self.value = value;
            return true;
        };

        if value.is_absent() {
            self.value = locked.default_value();
            return true;
        }

        if value.data_type() == Some(locked) {
            self.value = value;
            true
        } else {
            tracing::trace!(
                locked = %locked,
                rejected = %value,
                "ignoring assignment of mismatched type"
            );
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Comparison
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether the vertex data satisfies the edge condition.
///
/// Never panics. Misuse of a special case is logged and yields `false`.
#[must_use]
pub fn compare(vertex: &GraphData, edge: &GraphData) -> bool {
    match &edge.special_case {
        SpecialCase::None => plain_equals(&vertex.value, &edge.value),
        SpecialCase::AlwaysPass => true,
        SpecialCase::NotNull => is_non_null_reference(vertex),
        SpecialCase::PassByType => match edge.locked_type {
            Some(expected) => vertex.value.data_type() == Some(expected),
            None => {
                tracing::warn!("PassByType condition has no locked type");
                false
            }
        },
        SpecialCase::GreaterThanInt => match (&vertex.value, &edge.value) {
            (Value::Int(a), Value::Int(b)) => a > b,
            _ => false,
        },
        SpecialCase::LessThanInt => match (&vertex.value, &edge.value) {
            (Value::Int(a), Value::Int(b)) => a < b,
            _ => false,
        },
        SpecialCase::GreaterThanFloat => match (&vertex.value, &edge.value) {
            (Value::Float(a), Value::Float(b)) => a > b,
            _ => false,
        },
        SpecialCase::LessThanFloat => match (&vertex.value, &edge.value) {
            (Value::Float(a), Value::Float(b)) => a < b,
            _ => false,
        },
        SpecialCase::Button(name) => {
            tracing::warn!(button = %name, "unresolved button condition reached comparison");
            false
        }
    }
}

fn plain_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(a), Value::Float(b)) => (a - b).abs() <= FLOAT_TOLERANCE,
        _ => a == b,
    }
}

fn is_non_null_reference(vertex: &GraphData) -> bool {
    let ty = vertex.locked_type.or_else(|| vertex.value.data_type());
    match ty {
        Some(ty) if !ty.is_reference() => {
            tracing::warn!(data_type = %ty, "NotNull used on a value type");
            false
        }
        _ => !vertex.value.is_absent(),
    }
}
