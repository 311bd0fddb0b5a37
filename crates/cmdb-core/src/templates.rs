//! Built-in schema templates
//!
//! Templates are starting points an administrator clones into a real schema
//! under a name of their choice. The clone is an ordinary schema: it passes
//! through the definition validator like any hand-written one.

use serde::Serialize;
use serde_json::json;

use crate::model::{AttributeDefinition, AttributeType, SchemaDraft, SchemaKind};

/// A named, reusable schema definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub name: &'static str,
    pub kind: SchemaKind,
    pub description: &'static str,
    pub attributes: Vec<AttributeDefinition>,
}

impl Template {
    /// Clone this template into a draft named `name`
    pub fn instantiate(&self, name: impl Into<String>) -> SchemaDraft {
        SchemaDraft {
            name: name.into(),
            description: self.description.to_string(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Every built-in template, CI templates first
pub fn catalog() -> Vec<Template> {
    vec![
        server(),
        application(),
        database(),
        network_device(),
        depends_on(),
        hosts(),
        connected_to(),
        runs_on(),
    ]
}

/// Templates of one kind
pub fn catalog_for(kind: SchemaKind) -> Vec<Template> {
    catalog().into_iter().filter(|t| t.kind == kind).collect()
}

pub fn find(name: &str) -> Option<Template> {
    catalog().into_iter().find(|t| t.name == name)
}

fn server() -> Template {
    Template {
        name: "server",
        kind: SchemaKind::Ci,
        description: "Physical or virtual server",
        attributes: vec![
            AttributeDefinition::required("hostname", AttributeType::String)
                .with_description("Fully qualified host name")
                .with_rule("minLength", json!(1))
                .with_rule("maxLength", json!(253)),
            AttributeDefinition::required("ip_address", AttributeType::String)
                .with_description("Primary IPv4 address")
                .with_rule("format", json!("ipv4")),
            AttributeDefinition::new("cpu_cores", AttributeType::Number)
                .with_rule("min", json!(1))
                .with_default(json!(1)),
            AttributeDefinition::new("memory_gb", AttributeType::Number).with_rule("min", json!(0)),
            AttributeDefinition::new("os", AttributeType::String)
                .with_rule("enum", json!(["linux", "windows", "bsd", "other"])),
            AttributeDefinition::new("environment", AttributeType::String)
                .with_rule("enum", json!(["production", "staging", "development"]))
                .with_default(json!("production")),
            AttributeDefinition::new("commissioned_on", AttributeType::Date),
        ],
    }
}

fn application() -> Template {
    Template {
        name: "application",
        kind: SchemaKind::Ci,
        description: "Deployed software application",
        attributes: vec![
            AttributeDefinition::required("version", AttributeType::String)
                .with_rule("pattern", json!(r"^\d+\.\d+(\.\d+)?([-+].+)?$")),
            AttributeDefinition::new("owner_email", AttributeType::String)
                .with_rule("format", json!("email")),
            AttributeDefinition::new("repository", AttributeType::String)
                .with_rule("format", json!("url")),
            AttributeDefinition::new("critical", AttributeType::Boolean).with_default(json!(false)),
            AttributeDefinition::new("tags", AttributeType::Array).with_default(json!([])),
        ],
    }
}

fn database() -> Template {
    Template {
        name: "database",
        kind: SchemaKind::Ci,
        description: "Database instance",
        attributes: vec![
            AttributeDefinition::required("engine", AttributeType::String)
                .with_rule("enum", json!(["postgres", "mysql", "mariadb", "mongodb", "redis"])),
            AttributeDefinition::new("port", AttributeType::Number)
                .with_rule("min", json!(1))
                .with_rule("max", json!(65535)),
            AttributeDefinition::new("version", AttributeType::String),
            AttributeDefinition::new("replicas", AttributeType::Number)
                .with_rule("min", json!(0))
                .with_default(json!(0)),
            AttributeDefinition::new("settings", AttributeType::Object),
        ],
    }
}

fn network_device() -> Template {
    Template {
        name: "network_device",
        kind: SchemaKind::Ci,
        description: "Switch, router, firewall or load balancer",
        attributes: vec![
            AttributeDefinition::required("device_type", AttributeType::String)
                .with_rule("enum", json!(["switch", "router", "firewall", "load_balancer"])),
            AttributeDefinition::required("management_ip", AttributeType::String)
                .with_rule("format", json!("ipv4")),
            AttributeDefinition::new("port_count", AttributeType::Number)
                .with_rule("min", json!(1))
                .with_rule("max", json!(1024)),
            AttributeDefinition::new("vendor", AttributeType::String),
            AttributeDefinition::new("firmware_version", AttributeType::String),
        ],
    }
}

fn depends_on() -> Template {
    Template {
        name: "depends_on",
        kind: SchemaKind::Relationship,
        description: "Source requires target to function",
        attributes: vec![
            AttributeDefinition::new("criticality", AttributeType::String)
                .with_rule("enum", json!(["low", "medium", "high"]))
                .with_default(json!("medium")),
            AttributeDefinition::new("description", AttributeType::String)
                .with_rule("maxLength", json!(500)),
        ],
    }
}

fn hosts() -> Template {
    Template {
        name: "hosts",
        kind: SchemaKind::Relationship,
        description: "Source provides the runtime for target",
        attributes: vec![
            AttributeDefinition::new("since", AttributeType::Date),
            AttributeDefinition::new("allocated_cpu", AttributeType::Number).with_rule("min", json!(0)),
        ],
    }
}

fn connected_to() -> Template {
    Template {
        name: "connected_to",
        kind: SchemaKind::Relationship,
        description: "Network link between two items",
        attributes: vec![
            AttributeDefinition::new("bandwidth_mbps", AttributeType::Number)
                .with_rule("min", json!(1)),
            AttributeDefinition::new("protocol", AttributeType::String)
                .with_rule("enum", json!(["tcp", "udp", "fiber", "ethernet"])),
            AttributeDefinition::new("redundant", AttributeType::Boolean).with_default(json!(false)),
        ],
    }
}

fn runs_on() -> Template {
    Template {
        name: "runs_on",
        kind: SchemaKind::Relationship,
        description: "Source executes on target",
        attributes: vec![
            AttributeDefinition::new("port", AttributeType::Number)
                .with_rule("min", json!(1))
                .with_rule("max", json!(65535)),
            AttributeDefinition::new("deployed_at", AttributeType::Date),
        ],
    }
}
