//! Record instances.
//!
//! A `Record<S>` pairs a current attribute map with the snapshot taken at
//! hydration or last save. The difference between the two is the dirty set,
//! and only the dirty set goes out on update.

use std::marker::PhantomData;

use serde_json::Value;

use crate::schema::{accessor_for, apply_cast, cast_for, fillable_check, mutator_for, Schema};

/// Attribute maps are plain JSON maps, the shape both storage crates
/// already speak
pub type AttributeMap = serde_json::Map<String, Value>;

#[derive(Debug, Clone)]
pub struct Record<S: Schema> {
    attributes: AttributeMap,
    original: AttributeMap,
    exists: bool,
    _schema: PhantomData<S>,
}

impl<S: Schema> Default for Record<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Record<S> {
    /// A fresh, unpersisted record with no attributes
    pub fn new() -> Self {
        Self {
            attributes: AttributeMap::new(),
            original: AttributeMap::new(),
            exists: false,
            _schema: PhantomData,
        }
    }

    /// A fresh record mass-assigned from caller input (fillable rules
    /// apply)
    pub fn from_attributes(attrs: AttributeMap) -> Self {
        let mut record = Self::new();
        record.fill(attrs);
        record
    }

    /// Hydrate from a storage row: casts run, the original snapshot is
    /// taken, and the record counts as persisted
    pub fn from_row(row: AttributeMap) -> Self {
        let attributes: AttributeMap = row
            .into_iter()
            .map(|(name, value)| match cast_for::<S>(&name) {
                Some(cast) => {
                    let value = apply_cast(cast, value);
                    (name, value)
                }
                None => (name, value),
            })
            .collect();
        Self {
            original: attributes.clone(),
            attributes,
            exists: true,
            _schema: PhantomData,
        }
    }

    /// Read one attribute, through its accessor when one is registered
    pub fn get(&self, name: &str) -> Option<Value> {
        let stored = self.attributes.get(name)?;
        match accessor_for::<S>(name) {
            Some(accessor) => Some(accessor(stored)),
            None => Some(stored.clone()),
        }
    }

    /// Write one attribute. A registered mutator always runs, replacing
    /// the caller's value with its output.
    pub fn set(&mut self, name: &str, value: Value) {
        let value = match mutator_for::<S>(name) {
            Some(mutator) => mutator(value),
            None => value,
        };
        self.attributes.insert(name.to_string(), value);
    }

    /// Mass-assign attributes that pass the fillable/guarded check;
    /// everything else is silently skipped
    pub fn fill(&mut self, attrs: AttributeMap) {
        for (name, value) in attrs {
            if fillable_check::<S>(&name) {
                self.set(&name, value);
            }
        }
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn original(&self) -> &AttributeMap {
        &self.original
    }

    /// The primary key value, if assigned
    pub fn key(&self) -> Option<&Value> {
        self.attributes.get(S::primary_key())
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(name, value)| self.original.get(name) != Some(value))
    }

    /// Attributes whose current value differs from the snapshot
    pub fn dirty(&self) -> AttributeMap {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Refresh the snapshot after a successful write
    pub(crate) fn sync_original(&mut self) {
        self.original = self.attributes.clone();
        self.exists = true;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.exists = false;
    }

    pub(crate) fn set_unchecked(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }
}
