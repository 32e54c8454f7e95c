//! Entity and key capabilities
//!
//! Mapped types expose their fields through [`Entity`] by name, and their
//! keys through [`KeyValue`]. Both are plain traits: implement them by hand
//! or generate them.

use std::fmt::Debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::value::Value;

/// A key that can be split into ordered components and rebuilt from them
///
/// Single keys decompose to one component. Multi-component keys decompose
/// to their components in declared order, with `Value::Null` for an unset
/// component.
pub trait KeyValue {
    /// Components in declared order
    fn decompose(&self) -> Vec<Value>;

    /// Rebuild a key from components in declared order
    fn recompose(components: Vec<Value>) -> Result<Self>
    where
        Self: Sized;
}

/// Pull exactly one component out of `components`
fn single_component(components: Vec<Value>, expected: &'static str) -> Result<Value> {
    let mut iter = components.into_iter();
    match (iter.next(), iter.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(Error::serialization(format!(
            "{} key expects exactly one component",
            expected
        ))),
    }
}

fn mismatch(expected: &'static str, actual: &Value) -> Error {
    Error::serialization(format!(
        "expected a {} key component, got {}",
        expected,
        actual.type_name()
    ))
}

impl KeyValue for Value {
    fn decompose(&self) -> Vec<Value> {
        vec![self.clone()]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        single_component(components, "Value")
    }
}

impl KeyValue for Vec<Value> {
    fn decompose(&self) -> Vec<Value> {
        self.clone()
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        Ok(components)
    }
}

impl KeyValue for i64 {
    fn decompose(&self) -> Vec<Value> {
        vec![Value::Long(*self)]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        match single_component(components, "Long")? {
            Value::Long(v) => Ok(v),
            other => Err(mismatch("Long", &other)),
        }
    }
}

impl KeyValue for i32 {
    fn decompose(&self) -> Vec<Value> {
        vec![Value::Int(*self)]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        match single_component(components, "Int")? {
            Value::Int(v) => Ok(v),
            other => Err(mismatch("Int", &other)),
        }
    }
}

impl KeyValue for bool {
    fn decompose(&self) -> Vec<Value> {
        vec![Value::Bool(*self)]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        match single_component(components, "Bool")? {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch("Bool", &other)),
        }
    }
}

impl KeyValue for String {
    fn decompose(&self) -> Vec<Value> {
        vec![Value::Text(self.clone())]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        match single_component(components, "Text")? {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("Text", &other)),
        }
    }
}

impl KeyValue for Uuid {
    fn decompose(&self) -> Vec<Value> {
        vec![Value::Uuid(*self)]
    }

    fn recompose(components: Vec<Value>) -> Result<Self> {
        match single_component(components, "Uuid")? {
            Value::Uuid(v) => Ok(v),
            other => Err(mismatch("Uuid", &other)),
        }
    }
}

/// A mapped entity type
///
/// Fields are addressed by the property names declared in the entity's
/// metadata. The id is kept apart from the other fields because it is
/// optional until the entity is persisted.
pub trait Entity: Clone + Default + Debug + Send + Sync + 'static {
    /// Primary key type
    type Key: KeyValue + Clone + Debug + Send + Sync;

    /// Current primary key, if set
    fn key(&self) -> Option<Self::Key>;

    /// Set the primary key
    fn set_key(&mut self, key: Self::Key);

    /// Read a non-id field; unknown names read as `Value::Null`
    fn get_field(&self, name: &str) -> Value;

    /// Write a non-id field
    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;
}
