//! Reactive writes: equality check, `beforeSet`, store, `afterSet`.
//!
//! A write to a reactive entry runs, in order:
//!
//! 1. the entry's equality policy against the current value; an equal value
//!    is a no-op and neither hook fires
//! 2. `beforeSet(new, old)`, whose return value is what gets stored
//! 3. the store itself
//! 4. `afterSet(stored, old)`, unless the transformed value equals the old
//!    one
//!
//! An error from `beforeSet` leaves the entry unmodified. An error from
//! `afterSet` leaves the new value stored with its side effect incomplete.
//! Either way the error propagates out of the setter and the enclosing
//! mutation scope discards its staged tree.
//!
//! A hook may write the same entry again. The nested write runs to completion
//! (store, then hooks) before control returns to the outer hook, so no
//! observer sees a half-applied write. Nesting deeper than
//! `ReactiveConfig::max_reentrant_depth` fails with `RecursionLimit`.

use std::sync::Arc;

use tracing::trace;

use crate::class::kind_of;
use crate::error::{ConfigError, Result};
use crate::registry::ClassSchema;
use crate::scope::MutationScope;
use crate::value::Value;

impl MutationScope<'_> {
    /// Write one config entry. Plain entries are assigned; reactive entries
    /// go through their hooks.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let schema = Arc::clone(&self.component.schema);
        let index = schema
            .index_of(name)
            .ok_or_else(|| self.component.unknown_property(name))?;

        if schema.entries()[index].reactive {
            self.write_reactive(&schema, index, value.into())
        } else {
            self.component.values[index] = Some(value.into());
            Ok(())
        }
    }

    /// Write every entry of `config` in schema order. Unknown keys are
    /// rejected before anything is written.
    pub fn set_many(&mut self, config: Value) -> Result<()> {
        let schema = Arc::clone(&self.component.schema);
        let mut config = match config {
            Value::Null => return Ok(()),
            Value::Map(map) => map,
            other => {
                return Err(ConfigError::InvalidConfig {
                    class: schema.class_name().to_string(),
                    found: kind_of(&other).to_string(),
                })
            }
        };

        if let Some(key) = config.keys().find(|key| !schema.contains(key)) {
            return Err(ConfigError::UnknownConfigKey {
                class: schema.class_name().to_string(),
                key: key.clone(),
            });
        }

        for (index, entry) in schema.entries().iter().enumerate() {
            let Some(value) = config.remove(&entry.name) else {
                continue;
            };
            if entry.reactive {
                self.write_reactive(&schema, index, value)?;
            } else {
                self.component.values[index] = Some(value);
            }
        }
        Ok(())
    }

    pub(crate) fn write_reactive(
        &mut self,
        schema: &Arc<ClassSchema>,
        index: usize,
        value: Value,
    ) -> Result<()> {
        let entry = &schema.entries()[index];
        let old = self.component.values[index].clone();

        if let Some(current) = &old {
            if entry.equality.is_equal(current, &value) {
                trace!(class = %schema.class_name(), property = %entry.name, "unchanged, skipped");
                return Ok(());
            }
        }

        let limit = self.component.configurator.reactive_config().max_reentrant_depth;
        if self.component.active_writes[index] > limit {
            return Err(ConfigError::RecursionLimit {
                property: entry.name.clone(),
                limit,
            });
        }

        self.component.active_writes[index] += 1;
        let result = self.apply(schema, index, value, old);
        self.component.active_writes[index] -= 1;
        result
    }

    fn apply(
        &mut self,
        schema: &Arc<ClassSchema>,
        index: usize,
        value: Value,
        old: Option<Value>,
    ) -> Result<()> {
        let entry = &schema.entries()[index];

        let value = match &entry.hooks.before {
            Some(before) => before(self, value, old.as_ref())?,
            None => value,
        };

        let unchanged = old
            .as_ref()
            .is_some_and(|current| entry.equality.is_equal(current, &value));
        self.component.values[index] = Some(value.clone());

        if unchanged {
            trace!(class = %schema.class_name(), property = %entry.name, "coerced to current value");
            return Ok(());
        }

        trace!(class = %schema.class_name(), property = %entry.name, "stored");
        if let Some(after) = &entry.hooks.after {
            after(self, &value, old.as_ref())?;
        }
        Ok(())
    }
}
