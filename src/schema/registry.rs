//! The Registry - built-in object class catalogue.

use crate::error::Result;
use crate::propagation::ConfigSettings;
use crate::schema::types::{AttrDef, ClassSchema, IdentityPolicy, ObjectClass, SettingsGroup};

const SERVER_STATUS: &[&str] = &["ONLINE", "OFFLINE_SOFT", "OFFLINE_HARD"];

const BACKEND_SERVER_ATTRS: &[AttrDef] = &[
    AttrDef::int("hostgroup_id").default("0"),
    AttrDef::text("hostname").required(),
    AttrDef::int("port").default("3306"),
    AttrDef::choice("status", SERVER_STATUS).default("ONLINE"),
    AttrDef::int("weight").default("1"),
    AttrDef::int("compression").default("0"),
    AttrDef::int("max_connections").default("1000"),
    AttrDef::int("max_replication_lag").default("0"),
    AttrDef::bool("use_ssl").default("0"),
    AttrDef::int("max_latency_ms").default("0"),
    AttrDef::text("comment").default(""),
];

const MYSQL_USER_ATTRS: &[AttrDef] = &[
    AttrDef::text("username").required(),
    AttrDef::text("password").secret(),
    AttrDef::bool("active").default("1"),
    AttrDef::bool("use_ssl").default("0"),
    AttrDef::int("default_hostgroup").default("0"),
    AttrDef::text("default_schema").nullable(),
    AttrDef::bool("schema_locked").default("0"),
    AttrDef::bool("transaction_persistent").default("0"),
    AttrDef::bool("fast_forward").default("0"),
    AttrDef::bool("backend").default("1"),
    AttrDef::bool("frontend").default("1"),
    AttrDef::int("max_connections").default("10000"),
];

// flagIN/flagOUT/apply chain rules together; they are stored verbatim.
const QUERY_RULE_ATTRS: &[AttrDef] = &[
    AttrDef::int("rule_id").auto_increment(),
    AttrDef::bool("active").default("0"),
    AttrDef::text("username").nullable(),
    AttrDef::text("schemaname").nullable(),
    AttrDef::int("flagIN").default("0"),
    AttrDef::text("client_addr").nullable(),
    AttrDef::text("proxy_addr").nullable(),
    AttrDef::int("proxy_port").nullable(),
    AttrDef::text("digest").nullable(),
    AttrDef::text("match_digest").nullable(),
    AttrDef::text("match_pattern").nullable(),
    AttrDef::bool("negate_match_pattern").default("0"),
    AttrDef::int("flagOUT").nullable(),
    AttrDef::text("replace_pattern").nullable(),
    AttrDef::int("destination_hostgroup").nullable(),
    AttrDef::int("cache_ttl").nullable(),
    AttrDef::int("reconnect").nullable(),
    AttrDef::int("timeout").nullable(),
    AttrDef::int("retries").nullable(),
    AttrDef::int("delay").nullable(),
    AttrDef::int("mirror_flagOUT").nullable(),
    AttrDef::int("mirror_hostgroup").nullable(),
    AttrDef::text("error_msg").nullable(),
    AttrDef::bool("log").nullable(),
    AttrDef::bool("apply").default("0"),
    AttrDef::text("comment").nullable(),
];

const REPLICATION_HOSTGROUP_ATTRS: &[AttrDef] = &[
    AttrDef::int("writer_hostgroup").required(),
    AttrDef::int("reader_hostgroup").required(),
    AttrDef::text("comment").default(""),
];

const SCHEDULER_ATTRS: &[AttrDef] = &[
    AttrDef::int("id").auto_increment(),
    AttrDef::bool("active").default("1"),
    AttrDef::int("interval_ms").default("10000"),
    AttrDef::text("filename").required(),
    AttrDef::text("arg1").nullable(),
    AttrDef::text("arg2").nullable(),
    AttrDef::text("arg3").nullable(),
    AttrDef::text("arg4").nullable(),
    AttrDef::text("arg5").nullable(),
    AttrDef::text("comment").default(""),
];

const GLOBAL_VARIABLE_ATTRS: &[AttrDef] = &[
    AttrDef::text("variable_name").required(),
    AttrDef::text("variable_value").nullable(),
];

static CLASSES: [ClassSchema; 6] = [
    ClassSchema {
        class: ObjectClass::BackendServers,
        table: "mysql_servers",
        noun: "server",
        result_key: "server",
        list_result: false,
        identity: IdentityPolicy::Keys(&["hostgroup_id", "hostname", "port"]),
        primary_key: &["hostgroup_id", "hostname", "port"],
        ordering_key: None,
        attributes: BACKEND_SERVER_ATTRS,
        settings: SettingsGroup::Fixed(ConfigSettings::MysqlServers),
        creatable: true,
        deletable: true,
        multi_delete: false,
    },
    ClassSchema {
        class: ObjectClass::MysqlUsers,
        table: "mysql_users",
        noun: "user",
        result_key: "user",
        list_result: false,
        identity: IdentityPolicy::Keys(&["username", "backend", "frontend"]),
        primary_key: &["username", "backend", "frontend"],
        ordering_key: None,
        attributes: MYSQL_USER_ATTRS,
        settings: SettingsGroup::Fixed(ConfigSettings::MysqlUsers),
        creatable: true,
        deletable: true,
        multi_delete: false,
    },
    ClassSchema {
        class: ObjectClass::QueryRules,
        table: "mysql_query_rules",
        noun: "rule",
        result_key: "rules",
        list_result: true,
        identity: IdentityPolicy::KeyOrFilter("rule_id"),
        primary_key: &["rule_id"],
        ordering_key: Some("rule_id"),
        attributes: QUERY_RULE_ATTRS,
        settings: SettingsGroup::Fixed(ConfigSettings::MysqlQueryRules),
        creatable: true,
        deletable: true,
        multi_delete: true,
    },
    ClassSchema {
        class: ObjectClass::ReplicationHostgroups,
        table: "mysql_replication_hostgroups",
        noun: "replication hostgroup",
        result_key: "repl_group",
        list_result: false,
        identity: IdentityPolicy::Keys(&["writer_hostgroup", "reader_hostgroup"]),
        primary_key: &["writer_hostgroup", "reader_hostgroup"],
        ordering_key: None,
        attributes: REPLICATION_HOSTGROUP_ATTRS,
        settings: SettingsGroup::Fixed(ConfigSettings::MysqlServers),
        creatable: true,
        deletable: true,
        multi_delete: false,
    },
    ClassSchema {
        class: ObjectClass::Scheduler,
        table: "scheduler",
        noun: "schedule",
        result_key: "schedules",
        list_result: true,
        identity: IdentityPolicy::KeysWithFilters {
            keys: &["filename"],
            filters: &["id", "arg1", "arg2", "arg3", "arg4", "arg5"],
        },
        primary_key: &["id"],
        ordering_key: Some("id"),
        attributes: SCHEDULER_ATTRS,
        settings: SettingsGroup::Fixed(ConfigSettings::Scheduler),
        creatable: true,
        deletable: true,
        multi_delete: true,
    },
    ClassSchema {
        class: ObjectClass::GlobalVariables,
        table: "global_variables",
        noun: "variable",
        result_key: "var",
        list_result: false,
        identity: IdentityPolicy::Keys(&["variable_name"]),
        primary_key: &["variable_name"],
        ordering_key: None,
        attributes: GLOBAL_VARIABLE_ATTRS,
        settings: SettingsGroup::ByVariablePrefix,
        creatable: false,
        deletable: false,
        multi_delete: false,
    },
];

/// Immutable lookup of class schemas.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    classes: &'static [ClassSchema],
}

impl Registry {
    /// The built-in catalogue.
    pub fn builtin() -> Self {
        Self { classes: &CLASSES }
    }

    /// Look up a class by name; unknown names are a schema error.
    pub fn schema_for(&self, name: &str) -> Result<&'static ClassSchema> {
        let class: ObjectClass = name.parse()?;
        Ok(self.get(class))
    }

    pub fn get(&self, class: ObjectClass) -> &'static ClassSchema {
        // CLASSES is declared in ObjectClass order.
        &self.classes[class as usize]
    }

    /// Class stored in `table`.
    pub fn by_table(&self, table: &str) -> Option<&'static ClassSchema> {
        self.classes.iter().find(|schema| schema.table == table)
    }

    pub fn all(&self) -> impl Iterator<Item = &'static ClassSchema> {
        self.classes.iter()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
