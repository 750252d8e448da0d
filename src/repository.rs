//! Generic CRUD over one record collection.
//!
//! Every operation loads the whole collection through `Storage`, changes it in
//! memory and writes it back in one `save`. A write that fails validation
//! never reaches the store. Stored entries that no longer decode are written
//! back untouched rather than dropped.

use std::marker::PhantomData;

use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::CrmError;
use crate::store::{LoadedCollection, Storage};
use crate::util::{next_record_id, numeric_id};
use crate::validation::FieldError;

pub struct Repository<T: Entity> {
    storage: Storage,
    _record: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self::new(&self.storage)
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(storage: &Storage) -> Self {
        Self {
            storage: storage.clone(),
            _record: PhantomData,
        }
    }

    /// All records in stored order.
    pub fn list(&self) -> Vec<T> {
        self.storage.load(T::KIND.collection())
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.list().into_iter().find(|r| r.id() == id)
    }

    fn load_all(&self) -> LoadedCollection<T> {
        self.storage.load_all(T::KIND.collection())
    }

    /// Create a record from a partial JSON object. Any `id` in the input is
    /// ignored; a fresh one is assigned.
    pub fn create(&self, input: Value) -> Result<T, CrmError> {
        let mut fields = into_object(input)?;
        fields.remove("id");
        let record: T = decode(fields)?;
        self.insert(record)
    }

    /// Create a record from a typed value, assigning a fresh id.
    pub fn insert(&self, mut record: T) -> Result<T, CrmError> {
        let LoadedCollection {
            mut records,
            unreadable,
        } = self.load_all();
        let floor = records
            .iter()
            .filter_map(|r| numeric_id(r.id()))
            .chain(unreadable.iter().filter_map(|v| raw_id(v).and_then(|id| numeric_id(&id))))
            .max()
            .unwrap_or(0);
        record.set_id(next_record_id(floor));

        prepare_write(&mut record, None, &records)?;

        records.push(record.clone());
        self.storage
            .save_keeping(T::KIND.collection(), &records, &unreadable)?;
        log::info!("Created {} {}", T::KIND, record.id());
        Ok(record)
    }

    /// Shallow-merge `patch` over the stored record. `Ok(None)` when no
    /// record has that id; the collection is left untouched.
    pub fn update(&self, id: &str, patch: Value) -> Result<Option<T>, CrmError> {
        let patch = into_object(patch)?;
        self.modify(id, |current| {
            let mut merged = match serde_json::to_value(current).map_err(crate::store::StoreError::from)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            for (key, value) in patch {
                if key == "id" {
                    continue;
                }
                let key = match T::FIELD_ALIASES.iter().find(|(alias, _)| *alias == key) {
                    Some((_, field)) => field.to_string(),
                    None => key,
                };
                if value.is_null() {
                    merged.remove(&key);
                } else {
                    merged.insert(key, value);
                }
            }
            decode(merged)
        })
    }

    /// Apply `change` to a copy of the stored record, then validate and
    /// persist it like `update`.
    pub fn update_with<F>(&self, id: &str, change: F) -> Result<Option<T>, CrmError>
    where
        F: FnOnce(&mut T) -> Result<(), CrmError>,
    {
        self.modify(id, |current| {
            let mut next = current.clone();
            change(&mut next)?;
            Ok(next)
        })
    }

    fn modify<F>(&self, id: &str, build: F) -> Result<Option<T>, CrmError>
    where
        F: FnOnce(&T) -> Result<T, CrmError>,
    {
        let LoadedCollection {
            mut records,
            unreadable,
        } = self.load_all();
        let Some(index) = records.iter().position(|r| r.id() == id) else {
            if unreadable.iter().any(|v| raw_id(v).as_deref() == Some(id)) {
                log::warn!("{} {} is stored but unreadable, not updating it", T::KIND, id);
            } else {
                log::debug!("{} {} not found, nothing updated", T::KIND, id);
            }
            return Ok(None);
        };

        let current = records[index].clone();
        let mut next = build(&current)?;
        next.set_id(current.id().to_string());

        let others: Vec<T> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, r)| r.clone())
            .collect();
        prepare_write(&mut next, Some(&current), &others)?;

        records[index] = next.clone();
        self.storage
            .save_keeping(T::KIND.collection(), &records, &unreadable)?;
        log::info!("Updated {} {}", T::KIND, id);
        Ok(Some(next))
    }

    /// Delete by id. Returns whether a record was removed; a missing id is
    /// not an error and does not write. An unreadable entry with that id is
    /// removed too.
    pub fn remove(&self, id: &str) -> Result<bool, CrmError> {
        let LoadedCollection {
            mut records,
            mut unreadable,
        } = self.load_all();
        let before = records.len() + unreadable.len();
        records.retain(|r| r.id() != id);
        unreadable.retain(|v| raw_id(v).as_deref() != Some(id));
        if records.len() + unreadable.len() == before {
            log::debug!("{} {} not found, nothing removed", T::KIND, id);
            return Ok(false);
        }
        self.storage
            .save_keeping(T::KIND.collection(), &records, &unreadable)?;
        log::info!("Deleted {} {}", T::KIND, id);
        Ok(true)
    }
}

/// Normalize, apply write side effects, validate and check uniqueness.
fn prepare_write<T: Entity>(record: &mut T, previous: Option<&T>, others: &[T]) -> Result<(), CrmError> {
    record.normalize();
    record.on_write(previous)?;

    let errors = record.validate();
    if !errors.is_empty() {
        return Err(CrmError::Validation(errors));
    }

    if let Some((email, message)) = record.unique_email() {
        if !email.is_empty() {
            let taken = others.iter().any(|other| {
                other.id() != record.id()
                    && other
                        .unique_email()
                        .is_some_and(|(e, _)| e.eq_ignore_ascii_case(email))
            });
            if taken {
                return Err(CrmError::Conflict(message.to_string()));
            }
        }
    }
    Ok(())
}

/// `id` of a stored entry that didn't decode; numbers count too.
fn raw_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn into_object(input: Value) -> Result<Map<String, Value>, CrmError> {
    match input {
        Value::Object(map) => Ok(map),
        _ => Err(CrmError::validation(
            "body",
            "Request body must be a JSON object",
        )),
    }
}

/// Decode a record, reporting which fields could not be read.
fn decode<T: Entity>(mut fields: Map<String, Value>) -> Result<T, CrmError> {
    // null means "not set"; the field default applies
    fields.retain(|_, v| !v.is_null());

    match serde_json::from_value::<T>(Value::Object(fields.clone())) {
        Ok(record) => Ok(record),
        Err(whole) => {
            let mut errors = Vec::new();
            for (key, value) in fields {
                let mut single = Map::new();
                single.insert(key.clone(), value);
                if let Err(e) = serde_json::from_value::<T>(Value::Object(single)) {
                    errors.push(FieldError::new(key, e.to_string()));
                }
            }
            if errors.is_empty() {
                errors.push(FieldError::new("body", whole.to_string()));
            }
            Err(CrmError::Validation(errors))
        }
    }
}
