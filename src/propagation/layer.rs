//! Layer, direction, action and settings-group vocabulary.
//!
//! These render verbatim into `LOAD`/`SAVE` statements, so `as_str` is the
//! wire spelling the admin interface expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A durability tier holding a copy of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layer {
    /// The classical config file. Read-only.
    Config,
    /// The main in-memory store edited by the engine.
    Memory,
    /// The durable on-disk store.
    Disk,
    /// The live data structures used by the serving threads.
    Runtime,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Config => "CONFIG",
            Layer::Memory => "MEMORY",
            Layer::Disk => "DISK",
            Layer::Runtime => "RUNTIME",
        }
    }

    /// Name under which `table` is readable in this layer.
    ///
    /// Returns `None` for CONFIG, which is a file and cannot be queried.
    pub fn table_name(self, table: &str) -> Option<String> {
        match self {
            Layer::Config => None,
            Layer::Memory => Some(table.to_string()),
            Layer::Disk => Some(format!("disk.{table}")),
            Layer::Runtime => Some(format!("runtime_{table}")),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONFIG" => Ok(Layer::Config),
            "MEMORY" | "MAIN" => Ok(Layer::Memory),
            "DISK" => Ok(Layer::Disk),
            "RUNTIME" => Ok(Layer::Runtime),
            other => Err(Error::invalid_layer(format!("unknown layer \"{other}\""))),
        }
    }
}

/// Which way a propagation statement is read relative to its named layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Read the named layer, write its neighbour.
    From,
    /// Read the neighbour, write the named layer.
    To,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::From => "FROM",
            Direction::To => "TO",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FROM" => Ok(Direction::From),
            "TO" => Ok(Direction::To),
            other => Err(Error::invalid_layer(format!("unknown direction \"{other}\""))),
        }
    }
}

/// LOAD moves state toward RUNTIME, SAVE moves it away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Load,
    Save,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Load => "LOAD",
            Action::Save => "SAVE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOAD" => Ok(Action::Load),
            "SAVE" => Ok(Action::Save),
            other => Err(Error::invalid_layer(format!("unknown action \"{other}\""))),
        }
    }
}

/// A group of tables that always moves between layers together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigSettings {
    #[serde(rename = "MYSQL USERS")]
    MysqlUsers,
    #[serde(rename = "MYSQL SERVERS")]
    MysqlServers,
    #[serde(rename = "MYSQL QUERY RULES")]
    MysqlQueryRules,
    #[serde(rename = "MYSQL VARIABLES")]
    MysqlVariables,
    #[serde(rename = "ADMIN VARIABLES")]
    AdminVariables,
    #[serde(rename = "SCHEDULER")]
    Scheduler,
}

impl ConfigSettings {
    pub const ALL: [ConfigSettings; 6] = [
        ConfigSettings::MysqlUsers,
        ConfigSettings::MysqlServers,
        ConfigSettings::MysqlQueryRules,
        ConfigSettings::MysqlVariables,
        ConfigSettings::AdminVariables,
        ConfigSettings::Scheduler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSettings::MysqlUsers => "MYSQL USERS",
            ConfigSettings::MysqlServers => "MYSQL SERVERS",
            ConfigSettings::MysqlQueryRules => "MYSQL QUERY RULES",
            ConfigSettings::MysqlVariables => "MYSQL VARIABLES",
            ConfigSettings::AdminVariables => "ADMIN VARIABLES",
            ConfigSettings::Scheduler => "SCHEDULER",
        }
    }

    /// Tables copied when this group is propagated.
    pub fn tables(self) -> &'static [&'static str] {
        match self {
            ConfigSettings::MysqlUsers => &["mysql_users"],
            ConfigSettings::MysqlServers => &["mysql_servers", "mysql_replication_hostgroups"],
            ConfigSettings::MysqlQueryRules => &["mysql_query_rules"],
            ConfigSettings::MysqlVariables | ConfigSettings::AdminVariables => &["global_variables"],
            ConfigSettings::Scheduler => &["scheduler"],
        }
    }

    /// Variable-name prefix restricting the rows this group owns.
    pub fn variable_prefix(self) -> Option<&'static str> {
        match self {
            ConfigSettings::MysqlVariables => Some("mysql-"),
            ConfigSettings::AdminVariables => Some("admin-"),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigSettings {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        ConfigSettings::ALL
            .into_iter()
            .find(|settings| settings.as_str() == normalized)
            .ok_or_else(|| Error::schema(format!("unknown config settings \"{}\"", s.trim())))
    }
}
