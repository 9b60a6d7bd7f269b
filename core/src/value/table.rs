//! Hybrid array/dictionary table.

use hashbrown::HashMap;

use super::Value;
use crate::vm::BoundsError;

/// A table with a fixed-capacity array part and a string-keyed dict part.
///
/// The array part is sized once at construction and never grows; the dict
/// part grows on demand. [`Table::len`] reports the array capacity, not the
/// number of stored values.
#[derive(Debug, Default)]
pub struct Table {
    array: Vec<Value>,
    dict: HashMap<String, Value>,
}

impl Table {
    pub fn new(capacity: usize) -> Self {
        Table {
            array: vec![Value::Nil; capacity],
            dict: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.dict.get(key)
    }

    /// Binds `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.dict.insert(key.into(), value);
    }

    pub fn get_array(&self, index: i64) -> Result<&Value, BoundsError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.array.get(i))
            .ok_or(BoundsError::ArrayIndex {
                index,
                capacity: self.array.len(),
            })
    }

    pub fn set_array(&mut self, index: i64, value: Value) -> Result<(), BoundsError> {
        let capacity = self.array.len();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.array.get_mut(i))
            .ok_or(BoundsError::ArrayIndex { index, capacity })?;
        *slot = value;
        Ok(())
    }

    /// Array capacity, independent of what is stored.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn dict_len(&self) -> usize {
        self.dict.len()
    }

    pub fn array(&self) -> &[Value] {
        &self.array
    }
}
