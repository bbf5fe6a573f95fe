//! Caller-facing request types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::{ClassSchema, ObjectClass};

/// Whether the targeted records should exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Present => "present",
            State::Absent => "absent",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(State::Present),
            "absent" => Ok(State::Absent),
            other => Err(Error::schema(format!("state must be present or absent, got \"{other}\""))),
        }
    }
}

/// Desired state for one object, or a filtered set of objects, of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileRequest {
    pub class: ObjectClass,
    /// Identity, filter and desired attributes, not yet normalized.
    pub params: Map<String, Value>,
    pub state: State,
    pub force_multi_delete: bool,
    /// `None` falls back to the engine default.
    pub save_to_disk: Option<bool>,
    pub load_to_runtime: Option<bool>,
    pub dry_run: bool,
}

impl ReconcileRequest {
    pub fn new(class: ObjectClass) -> Self {
        Self {
            class,
            params: Map::new(),
            state: State::Present,
            force_multi_delete: false,
            save_to_disk: None,
            load_to_runtime: None,
            dry_run: false,
        }
    }

    /// Build a request from one flat parameter document.
    ///
    /// Control keys (`state`, `force_multi_delete`/`force_delete`,
    /// `save_to_disk`, `load_to_runtime`, `dry_run`/`check_mode`) are lifted
    /// out; everything else is an attribute.
    pub fn from_params(class: ObjectClass, params: Value) -> Result<Self> {
        let Value::Object(mut params) = params else {
            return Err(Error::schema("parameters must be a JSON object"));
        };

        let mut request = Self::new(class);
        if let Some(state) = params.remove("state") {
            request.state = match state {
                Value::String(s) => s.parse()?,
                other => return Err(Error::schema(format!("state must be a string, got {other}"))),
            };
        }
        for key in ["force_multi_delete", "force_delete"] {
            if let Some(value) = params.remove(key) {
                request.force_multi_delete = control_bool(key, &value)?;
            }
        }
        if let Some(value) = params.remove("save_to_disk") {
            request.save_to_disk = Some(control_bool("save_to_disk", &value)?);
        }
        if let Some(value) = params.remove("load_to_runtime") {
            request.load_to_runtime = Some(control_bool("load_to_runtime", &value)?);
        }
        for key in ["dry_run", "check_mode"] {
            if let Some(value) = params.remove(key) {
                request.dry_run |= control_bool(key, &value)?;
            }
        }

        request.params = params;
        Ok(request)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn force_multi_delete(mut self, force: bool) -> Self {
        self.force_multi_delete = force;
        self
    }

    pub fn save_to_disk(mut self, enabled: bool) -> Self {
        self.save_to_disk = Some(enabled);
        self
    }

    pub fn load_to_runtime(mut self, enabled: bool) -> Self {
        self.load_to_runtime = Some(enabled);
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Reject control flags the class does not support.
    pub fn validate(&self, schema: &ClassSchema) -> Result<()> {
        if self.force_multi_delete && !schema.multi_delete {
            return Err(Error::schema(format!(
                "force_multi_delete is not supported for {}",
                schema.class
            )));
        }
        if self.state == State::Absent && !schema.deletable {
            return Err(Error::schema(format!("{} cannot be deleted", schema.table)));
        }
        Ok(())
    }
}

/// The reduced global-variable surface: read when `value` is `None`,
/// otherwise set if different.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRequest {
    pub variable: String,
    pub value: Option<Value>,
    pub save_to_disk: Option<bool>,
    pub load_to_runtime: Option<bool>,
    pub dry_run: bool,
}

impl VariableRequest {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            value: None,
            save_to_disk: None,
            load_to_runtime: None,
            dry_run: false,
        }
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn save_to_disk(mut self, enabled: bool) -> Self {
        self.save_to_disk = Some(enabled);
        self
    }

    pub fn load_to_runtime(mut self, enabled: bool) -> Self {
        self.load_to_runtime = Some(enabled);
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }
}

fn control_bool(name: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(Error::schema(format!("{name} must be a boolean, got \"{s}\""))),
        },
        other => Err(Error::schema(format!("{name} must be a boolean, got {other}"))),
    }
}
