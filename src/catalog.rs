//! The JSON command catalog.
//!
//! A catalog is the shipped [`CommandRegistry`]: a document listing every resource, its commands
//! and the structured-input models they use.
//!
//! ```json
//! {
//!   "resources": {
//!     "tenant": {
//!       "commands": {
//!         "find": {
//!           "aliases": ["get"],
//!           "doc": "Find a {{ kind }} by name.",
//!           "args": [{"name": "name", "type": "string", "required": true}]
//!         }
//!       }
//!     }
//!   },
//!   "models": {}
//! }
//! ```
//!
//! The catalog is validated once, when it is loaded: aliases must not shadow another command of
//! the same resource and every model reference must resolve.

use crate::error::Error;
use crate::registry::{ArgKind, ArgSpec, CommandDescriptor, CommandRegistry, Model};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN: &str = include_str!("../catalog/duploctl.json");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    resources: BTreeMap<String, ResourceFile>,
    #[serde(default)]
    models: BTreeMap<String, Model>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceFile {
    commands: BTreeMap<String, CommandFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandFile {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    doc: String,
    #[serde(default)]
    args: Vec<ArgSpec>,
    #[serde(default)]
    model: Option<String>,
}

/// A loaded, validated command catalog.
#[derive(Debug)]
pub struct Catalog {
    descriptors: Vec<Arc<CommandDescriptor>>,
    /// `(resource, name or alias)` to an index into `descriptors`.
    index: BTreeMap<(String, String), usize>,
    models: BTreeMap<String, Model>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Catalog, Error> {
        Catalog::from_json(BUILTIN)
    }

    pub fn from_path(path: &Path) -> Result<Catalog, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        Catalog::from_json(&text)
    }

    /// Parses and validates a catalog document.
    ///
    /// ```
    /// use duplocloud_mcp::catalog::Catalog;
    /// use duplocloud_mcp::registry::CommandRegistry;
    ///
    /// let catalog = Catalog::from_json(r#"{
    ///     "resources": {"tenant": {"commands": {"list": {"aliases": ["ls"]}}}}
    /// }"#).unwrap();
    /// assert_eq!(catalog.lookup("tenant", "ls").unwrap().name(), "list");
    /// assert!(Catalog::from_json("{}").is_err());
    /// ```
    pub fn from_json(text: &str) -> Result<Catalog, Error> {
        let file: CatalogFile = serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid catalog: {e}")))?;
        let mut builder = Catalog::builder();
        for (resource, commands) in file.resources {
            for (name, command) in commands.commands {
                let mut descriptor = CommandDescriptor::new(&resource, &name).doc(&command.doc);
                for alias in &command.aliases {
                    descriptor = descriptor.alias(alias);
                }
                for arg in command.args {
                    descriptor = descriptor.arg(arg);
                }
                if let Some(model) = &command.model {
                    descriptor = descriptor.model(model);
                }
                builder = builder.command(descriptor);
            }
        }
        for (name, model) in file.models {
            builder = builder.model(&name, model);
        }
        builder.build()
    }

    /// Starts a catalog assembled in code.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Finds a command by name or alias.
    pub fn lookup_command(&self, resource: &str, command: &str) -> Option<&CommandDescriptor> {
        self.lookup(resource, command).map(Arc::as_ref)
    }

    pub fn models(&self) -> &BTreeMap<String, Model> {
        &self.models
    }
}

impl CommandRegistry for Catalog {
    fn descriptors(&self) -> &[Arc<CommandDescriptor>] {
        &self.descriptors
    }

    fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    fn lookup(&self, resource: &str, command: &str) -> Option<&Arc<CommandDescriptor>> {
        self.index
            .get(&(resource.to_string(), command.to_string()))
            .and_then(|i| self.descriptors.get(*i))
    }
}

/// Collects commands and models for a [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    commands: Vec<CommandDescriptor>,
    models: BTreeMap<String, Model>,
}

impl CatalogBuilder {
    pub fn command(mut self, descriptor: CommandDescriptor) -> Self {
        self.commands.push(descriptor);
        self
    }

    pub fn model(mut self, name: &str, model: Model) -> Self {
        self.models.insert(name.to_string(), model);
        self
    }

    /// Validates and indexes the catalog.
    pub fn build(mut self) -> Result<Catalog, Error> {
        self.commands
            .sort_by(|a, b| (a.resource(), a.name()).cmp(&(b.resource(), b.name())));
        let mut index = BTreeMap::new();
        for (i, descriptor) in self.commands.iter().enumerate() {
            let key = (descriptor.resource().to_string(), descriptor.name().to_string());
            if index.insert(key, i).is_some() {
                return Err(Error::Configuration(format!(
                    "command '{} {}' is defined twice",
                    descriptor.resource(),
                    descriptor.name()
                )));
            }
        }
        for descriptor in &self.commands {
            check_args(descriptor)?;
        }
        for (i, descriptor) in self.commands.iter().enumerate() {
            for alias in descriptor.aliases() {
                let key = (descriptor.resource().to_string(), alias.clone());
                if index.insert(key, i).is_some() {
                    return Err(Error::Configuration(format!(
                        "alias '{alias}' of '{} {}' is already taken",
                        descriptor.resource(),
                        descriptor.name()
                    )));
                }
            }
            if let Some(model) = descriptor.model_name() {
                if !self.models.contains_key(model) {
                    return Err(Error::Configuration(format!(
                        "command '{} {}' uses undefined model '{model}'",
                        descriptor.resource(),
                        descriptor.name()
                    )));
                }
            }
        }
        for (name, model) in &self.models {
            for (field_name, field) in &model.fields {
                if let Some(nested) = field.referenced_model() {
                    if !self.models.contains_key(nested) {
                        return Err(Error::Configuration(format!(
                            "field '{name}.{field_name}' uses undefined model '{nested}'"
                        )));
                    }
                }
            }
        }
        Ok(Catalog {
            descriptors: self.commands.into_iter().map(Arc::new).collect(),
            index,
            models: self.models,
        })
    }
}

/// Argument names are unique within a command, and at most one of them is the body.
fn check_args(descriptor: &CommandDescriptor) -> Result<(), Error> {
    let mut seen: Vec<&str> = Vec::new();
    for arg in descriptor.args() {
        if seen.contains(&arg.name.as_str()) {
            return Err(Error::Configuration(format!(
                "command '{} {}' declares argument '{}' twice",
                descriptor.resource(),
                descriptor.name(),
                arg.name
            )));
        }
        seen.push(&arg.name);
    }
    if descriptor.args().iter().filter(|a| a.kind == ArgKind::Body).count() > 1 {
        return Err(Error::Configuration(format!(
            "command '{} {}' declares more than one body argument",
            descriptor.resource(),
            descriptor.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::{Access, ArgKind, ArgType, Field};
    use crate::schema;

    #[test]
    fn builtin_catalog_loads_and_resolves() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.has_resource("tenant"));
        let create = catalog.lookup_command("tenant", "create").unwrap();
        assert_eq!(create.model_name(), Some("AddTenantRequest"));
        assert_eq!(catalog.lookup_command("tenant", "get").unwrap().name(), "find");
        // every command in the shipped catalog has a schema
        for descriptor in catalog.descriptors() {
            schema::input_schema(&catalog, descriptor).unwrap();
        }
    }

    #[test]
    fn descriptors_are_sorted() {
        let catalog = Catalog::builder()
            .command(CommandDescriptor::new("tenant", "list"))
            .command(CommandDescriptor::new("hosts", "list"))
            .command(CommandDescriptor::new("tenant", "create"))
            .build()
            .unwrap();
        let names: Vec<String> = catalog.descriptors().iter().map(|d| d.tool_name()).collect();
        assert_eq!(names, vec!["hosts_list", "tenant_create", "tenant_list"]);
        assert_eq!(catalog.resources(), vec!["hosts", "tenant"]);
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let err = Catalog::builder()
            .command(CommandDescriptor::new("tenant", "list").alias("ls"))
            .command(CommandDescriptor::new("tenant", "ls"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        let err = Catalog::builder()
            .command(
                CommandDescriptor::new("service", "restart")
                    .arg(ArgSpec::positional("name", ArgType::String))
                    .arg(ArgSpec::option("name", ArgType::String)),
            )
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("argument 'name' twice"));

        let mut second_body = ArgSpec::body();
        second_body.name = "spec".into();
        let err = Catalog::builder()
            .command(
                CommandDescriptor::new("tenant", "create")
                    .arg(ArgSpec::body())
                    .arg(second_body),
            )
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("more than one body"));
    }

    #[test]
    fn undefined_models_are_rejected() {
        let err = Catalog::builder()
            .command(
                CommandDescriptor::new("tenant", "create")
                    .arg(ArgSpec::body())
                    .model("Missing"),
            )
            .build()
            .unwrap_err();
        assert!(err.message().contains("Missing"));

        let err = Catalog::builder()
            .model("A", Model::new().field("b", Field::new(ArgType::Object).nested("B")))
            .build()
            .unwrap_err();
        assert!(err.message().contains("'B'"));
    }

    #[test]
    fn json_arguments_and_models() {
        let catalog = Catalog::from_json(
            r#"{
                "resources": {
                    "service": {"commands": {
                        "logs": {"args": [
                            {"name": "name", "required": true},
                            {"name": "tail", "type": "integer", "kind": "option"}
                        ]}
                    }}
                },
                "models": {"Empty": {"fields": {}}}
            }"#,
        )
        .unwrap();
        let logs = catalog.lookup_command("service", "logs").unwrap();
        assert_eq!(logs.access(), Access::Read);
        assert_eq!(logs.args()[1].kind, ArgKind::Option);
        assert!(catalog.model("Empty").is_some());
    }

    #[test]
    fn unreadable_catalog_is_a_configuration_error() {
        let err = Catalog::from_path(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("/nonexistent/catalog.json"));
    }
}
