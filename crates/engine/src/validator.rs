//! Entity validation
//!
//! Validation runs before any statement is built. A failure here means
//! nothing reaches the executor.

use wideorm_core::{Entity, EntityMeta, Error, KeyLayout, KeyValue, PropertyMeta, Result, Value};

use crate::proxy::EntityProxy;

/// Checks entities and primary keys before they are written or looked up
pub trait EntityValidator: Send + Sync {
    /// Check a whole entity: its key and its required fields
    ///
    /// `key` is the decomposed primary key, `field` reads a non-id field
    /// by name and returns `None` for a field that was never loaded.
    fn validate_entity(
        &self,
        meta: &EntityMeta,
        key: Option<&[Value]>,
        field: &dyn Fn(&str) -> Option<Value>,
    ) -> Result<()>;

    /// Check a primary key against its metadata
    fn validate_primary_key(&self, id_meta: &PropertyMeta, key: Option<&[Value]>) -> Result<()>;
}

/// Validate a typed entity through an [`EntityValidator`]
pub fn validate<E: Entity>(
    validator: &dyn EntityValidator,
    meta: &EntityMeta,
    entity: &E,
) -> Result<()> {
    let key = entity.key().map(|k| k.decompose());
    validator.validate_entity(meta, key.as_deref(), &|name| Some(entity.get_field(name)))
}

/// Validate the loaded part of a proxy
///
/// Fields the proxy never loaded are already in the store and are not
/// checked.
pub fn validate_proxy<E: Entity>(
    validator: &dyn EntityValidator,
    meta: &EntityMeta,
    proxy: &EntityProxy<E>,
) -> Result<()> {
    let key = proxy.key().map(|k| k.decompose());
    validator.validate_entity(meta, key.as_deref(), &|name| {
        proxy
            .is_loaded(name)
            .then(|| proxy.target().get_field(name))
    })
}

/// Default validator: key shape and required fields
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl EntityValidator for StructuralValidator {
    fn validate_entity(
        &self,
        meta: &EntityMeta,
        key: Option<&[Value]>,
        field: &dyn Fn(&str) -> Option<Value>,
    ) -> Result<()> {
        self.validate_primary_key(meta.id_meta(), key)?;
        for property in meta.properties() {
            if property.is_required() && field(property.name()).map_or(false, |v| v.is_null()) {
                return Err(Error::validation(format!(
                    "required property '{}' of '{}' is null",
                    property.name(),
                    meta.entity_name()
                )));
            }
        }
        Ok(())
    }

    fn validate_primary_key(&self, id_meta: &PropertyMeta, key: Option<&[Value]>) -> Result<()> {
        let key = key.ok_or_else(|| {
            Error::validation(format!("primary key '{}' is null", id_meta.name()))
        })?;

        let expected = match id_meta.layout() {
            KeyLayout::Single(_) => 1,
            KeyLayout::Multi(multi) => multi.len(),
        };
        if key.len() != expected {
            return Err(Error::validation(format!(
                "primary key '{}' expects {} components, got {}",
                id_meta.name(),
                expected,
                key.len()
            )));
        }
        if let Some(index) = key.iter().position(Value::is_null) {
            return Err(Error::validation(format!(
                "component {} of primary key '{}' is null",
                index,
                id_meta.name()
            )));
        }
        Ok(())
    }
}
