//! Object class definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Row;
use crate::error::{Error, Result};
use crate::propagation::ConfigSettings;

/// Attribute name to normalized text value, `None` for NULL.
pub type Attributes = BTreeMap<String, Option<String>>;

/// A named kind of manageable configuration entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    BackendServers,
    MysqlUsers,
    QueryRules,
    ReplicationHostgroups,
    Scheduler,
    GlobalVariables,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 6] = [
        ObjectClass::BackendServers,
        ObjectClass::MysqlUsers,
        ObjectClass::QueryRules,
        ObjectClass::ReplicationHostgroups,
        ObjectClass::Scheduler,
        ObjectClass::GlobalVariables,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectClass::BackendServers => "backend_servers",
            ObjectClass::MysqlUsers => "mysql_users",
            ObjectClass::QueryRules => "query_rules",
            ObjectClass::ReplicationHostgroups => "replication_hostgroups",
            ObjectClass::Scheduler => "scheduler",
            ObjectClass::GlobalVariables => "global_variables",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectClass {
    type Err = Error;

    /// Accepts the class name or its table name, with `-` or `_`.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        let class = match name.as_str() {
            "backend_servers" | "mysql_servers" | "servers" => ObjectClass::BackendServers,
            "mysql_users" | "users" => ObjectClass::MysqlUsers,
            "query_rules" | "mysql_query_rules" | "rules" => ObjectClass::QueryRules,
            "replication_hostgroups" | "mysql_replication_hostgroups" => ObjectClass::ReplicationHostgroups,
            "scheduler" | "schedules" => ObjectClass::Scheduler,
            "global_variables" | "variables" => ObjectClass::GlobalVariables,
            _ => return Err(Error::schema(format!("unknown object class \"{}\"", s.trim()))),
        };
        Ok(class)
    }
}

/// Value kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Int,
    /// Stored as `1`/`0`.
    Bool,
    Text,
    /// One of a fixed set of spellings.
    Choice(&'static [&'static str]),
}

/// Attribute definition within a class.
#[derive(Debug, Clone, Copy)]
pub struct AttrDef {
    pub name: &'static str,
    pub kind: AttrKind,
    /// Value materialized on create when the caller omits the attribute.
    pub default: Option<&'static str>,
    pub nullable: bool,
    /// Must be supplied on create (no default exists).
    pub required: bool,
    /// Masked in result documents.
    pub secret: bool,
    /// Assigned by the store on insert.
    pub auto: bool,
}

impl AttrDef {
    const fn new(name: &'static str, kind: AttrKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            nullable: false,
            required: false,
            secret: false,
            auto: false,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self::new(name, AttrKind::Int)
    }

    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, AttrKind::Bool)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, AttrKind::Text)
    }

    pub const fn choice(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self::new(name, AttrKind::Choice(choices))
    }

    pub const fn default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn secret(mut self) -> Self {
        self.secret = true;
        self.nullable = true;
        self
    }

    pub const fn auto_increment(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Normalize a caller-supplied value to the text form the store returns.
    pub fn normalize(&self, raw: &Value) -> Result<Option<String>> {
        if raw.is_null() {
            return if self.nullable {
                Ok(None)
            } else {
                Err(Error::schema(format!("attribute \"{}\" cannot be null", self.name)))
            };
        }

        let invalid = || {
            Error::schema(format!(
                "invalid value {raw} for attribute \"{}\" ({})",
                self.name,
                self.kind_name()
            ))
        };

        let text = match (self.kind, raw) {
            (AttrKind::Int, Value::Number(n)) => n.as_i64().ok_or_else(invalid)?.to_string(),
            (AttrKind::Int, Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?.to_string(),
            (AttrKind::Bool, Value::Bool(b)) => bool_text(*b),
            (AttrKind::Bool, Value::Number(n)) => match n.as_i64() {
                Some(0) => bool_text(false),
                Some(1) => bool_text(true),
                _ => return Err(invalid()),
            },
            (AttrKind::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => bool_text(true),
                "0" | "false" | "no" | "off" => bool_text(false),
                _ => return Err(invalid()),
            },
            (AttrKind::Text, Value::String(s)) => s.clone(),
            (AttrKind::Text, Value::Number(n)) => n.to_string(),
            (AttrKind::Choice(choices), Value::String(s)) => choices
                .iter()
                .find(|choice| choice.eq_ignore_ascii_case(s.trim()))
                .map(|choice| choice.to_string())
                .ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        Ok(Some(text))
    }

    /// Normalize a bare string such as a `key=value` CLI argument.
    pub fn normalize_str(&self, raw: &str) -> Result<Option<String>> {
        self.normalize(&Value::String(raw.to_string()))
    }

    fn kind_name(&self) -> String {
        match self.kind {
            AttrKind::Int => "integer".to_string(),
            AttrKind::Bool => "boolean".to_string(),
            AttrKind::Text => "text".to_string(),
            AttrKind::Choice(choices) => format!("one of {}", choices.join(", ")),
        }
    }
}

fn bool_text(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// How the records a request targets are identified.
#[derive(Debug, Clone, Copy)]
pub enum IdentityPolicy {
    /// Every key must resolve, from the request or the attribute default.
    Keys(&'static [&'static str]),
    /// The opaque key when supplied, otherwise every supplied attribute.
    KeyOrFilter(&'static str),
    /// Required keys, narrowed by whichever filter attributes are supplied.
    KeysWithFilters {
        keys: &'static [&'static str],
        filters: &'static [&'static str],
    },
}

/// Settings group a class propagates with.
#[derive(Debug, Clone, Copy)]
pub enum SettingsGroup {
    Fixed(ConfigSettings),
    /// Chosen by the `mysql-`/`admin-` prefix of the variable name.
    ByVariablePrefix,
}

/// Everything the engine knows about one object class.
#[derive(Debug)]
pub struct ClassSchema {
    pub class: ObjectClass,
    pub table: &'static str,
    /// Singular noun used in messages.
    pub noun: &'static str,
    /// Key under which results are reported.
    pub result_key: &'static str,
    /// Report a list rather than a single record.
    pub list_result: bool,
    pub identity: IdentityPolicy,
    /// Columns addressing one row in UPDATE/DELETE.
    pub primary_key: &'static [&'static str],
    pub ordering_key: Option<&'static str>,
    pub attributes: &'static [AttrDef],
    pub settings: SettingsGroup,
    pub creatable: bool,
    pub deletable: bool,
    /// Whether `force_multi_delete` may be set.
    pub multi_delete: bool,
}

impl ClassSchema {
    pub fn attr(&self, name: &str) -> Option<&AttrDef> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    fn attr_or_err(&self, name: &str) -> Result<&AttrDef> {
        self.attr(name).ok_or_else(|| {
            Error::schema(format!("unknown attribute \"{name}\" for {}", self.class))
        })
    }

    /// Normalize caller parameters, rejecting unknown attributes.
    pub fn normalize(&self, params: &serde_json::Map<String, Value>) -> Result<Attributes> {
        params
            .iter()
            .map(|(name, raw)| {
                let attr = self.attr_or_err(name)?;
                Ok((attr.name.to_string(), attr.normalize(raw)?))
            })
            .collect()
    }

    /// Normalize `key=value` pairs.
    pub fn normalize_pairs<'a, I>(&self, pairs: I) -> Result<Attributes>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .map(|(name, raw)| {
                let attr = self.attr_or_err(name)?;
                Ok((attr.name.to_string(), attr.normalize_str(raw)?))
            })
            .collect()
    }

    /// Criteria selecting the records `desired` refers to.
    pub fn criteria(&self, desired: &Attributes) -> Result<Attributes> {
        match self.identity {
            IdentityPolicy::Keys(keys) => self.key_criteria(keys, desired),
            IdentityPolicy::KeyOrFilter(key) => match desired.get(key) {
                Some(value) => Ok(Attributes::from([(key.to_string(), value.clone())])),
                None => Ok(desired.clone()),
            },
            IdentityPolicy::KeysWithFilters { keys, filters } => {
                let mut criteria = self.key_criteria(keys, desired)?;
                for filter in filters {
                    if let Some(value) = desired.get(*filter) {
                        criteria.insert(filter.to_string(), value.clone());
                    }
                }
                Ok(criteria)
            }
        }
    }

    fn key_criteria(&self, keys: &[&str], desired: &Attributes) -> Result<Attributes> {
        let mut criteria = Attributes::new();
        for key in keys {
            let attr = self.attr_or_err(key)?;
            let value = match desired.get(*key) {
                Some(value) => value.clone(),
                None => match attr.default {
                    Some(default) => Some(default.to_string()),
                    None => {
                        return Err(Error::schema(format!(
                            "missing identity attribute \"{key}\" for {}",
                            self.class
                        )))
                    }
                },
            };
            criteria.insert(key.to_string(), value);
        }
        Ok(criteria)
    }

    /// Desired attributes merged with declared defaults, for insertion.
    ///
    /// Store-assigned keys and nullable attributes without a default are
    /// left out so the store decides them.
    pub fn with_defaults(&self, desired: &Attributes) -> Result<Attributes> {
        let mut merged = Attributes::new();
        for attr in self.attributes {
            if let Some(value) = desired.get(attr.name) {
                merged.insert(attr.name.to_string(), value.clone());
            } else if let Some(default) = attr.default {
                merged.insert(attr.name.to_string(), Some(default.to_string()));
            } else if attr.required {
                return Err(Error::schema(format!(
                    "missing required attribute \"{}\" to create a {}",
                    attr.name, self.noun
                )));
            }
        }
        Ok(merged)
    }

    /// Primary-key values of a record.
    pub fn row_key(&self, record: &ObjectRecord) -> Attributes {
        self.primary_key
            .iter()
            .map(|key| (key.to_string(), record.value(key)))
            .collect()
    }

    /// Primary key of a freshly inserted row.
    pub fn inserted_key(&self, inserted: &Attributes, last_insert_id: Option<i64>) -> Result<Attributes> {
        self.primary_key
            .iter()
            .map(|key| {
                let value = match inserted.get(*key) {
                    Some(value) => value.clone(),
                    None if self.attr(key).is_some_and(|attr| attr.auto) => {
                        let id = last_insert_id.ok_or_else(|| {
                            Error::schema(format!("store did not report an id for the new {}", self.noun))
                        })?;
                        Some(id.to_string())
                    }
                    None => None,
                };
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Settings group to propagate after mutating `record`.
    pub fn settings_for(&self, record: &Attributes) -> ConfigSettings {
        match self.settings {
            SettingsGroup::Fixed(settings) => settings,
            SettingsGroup::ByVariablePrefix => {
                let name = record.get("variable_name").cloned().flatten().unwrap_or_default();
                if name.starts_with("admin-") {
                    ConfigSettings::AdminVariables
                } else {
                    ConfigSettings::MysqlVariables
                }
            }
        }
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes.iter().map(|attr| attr.name)
    }

    /// Columns to order resolution results by.
    pub fn order_by(&self) -> Vec<&'static str> {
        match self.ordering_key {
            Some(key) => vec![key],
            None => self.primary_key.to_vec(),
        }
    }
}

/// One persisted instance of an object class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRecord(Attributes);

impl ObjectRecord {
    pub fn new(fields: Attributes) -> Self {
        Self(fields)
    }

    /// Text value of a column; `None` when NULL or absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|value| value.as_deref())
    }

    /// Raw column value, NULL as `None`.
    pub fn value(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned().flatten()
    }

    pub fn fields(&self) -> &Attributes {
        &self.0
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.insert(name.into(), value);
    }

    pub fn into_fields(self) -> Attributes {
        self.0
    }
}

impl From<Row> for ObjectRecord {
    fn from(row: Row) -> Self {
        Self(row)
    }
}
