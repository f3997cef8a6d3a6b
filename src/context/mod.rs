//! Named service contexts.
//!
//! Every operation loads the document, changes it and saves it back. After
//! any successful operation `current_context` is either empty or names an
//! existing context.

mod validator;

use serde::Serialize;
use tracing::info;

pub use validator::{ValidationError, Validator};

use crate::error::{Error, Result};
use crate::storage::{ServiceConfigMap, ServiceContext, ServiceRegistryConfig, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub name: String,
    pub current: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<ServiceRegistryConfig>,
}

/// Creates an empty context and makes it current.
pub fn create(store: &dyn Store<ServiceContext>, name: &str) -> Result<()> {
    let mut doc = store.load()?;

    let validator = Validator::new(&doc);
    validator.validate_name(name)?;
    validator.validate_name_is_available(name)?;

    doc.contexts
        .insert(name.to_string(), ServiceConfigMap::default());
    doc.current_context = name.to_string();
    store.save(&doc)?;

    info!(context = name, "context created");
    Ok(())
}

/// Deletes `name`, or the current context when `name` is `None` or empty.
/// Deleting the current context unsets it. Returns the deleted name.
pub fn delete(store: &dyn Store<ServiceContext>, name: Option<&str>) -> Result<String> {
    let mut doc = store.load()?;

    let name = match name.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None if doc.current_context.is_empty() => return Err(Error::ContextNotSet),
        None => doc.current_context.clone(),
    };

    if doc.contexts.remove(&name).is_none() {
        return Err(Error::ContextNotFound(name));
    }
    if doc.current_context == name {
        doc.current_context.clear();
        info!(context = %name, "current context unset");
    }
    store.save(&doc)?;

    Ok(name)
}

pub fn use_context(store: &dyn Store<ServiceContext>, name: &str) -> Result<()> {
    let mut doc = store.load()?;
    if !doc.contexts.contains_key(name) {
        return Err(Error::ContextNotFound(name.to_string()));
    }
    doc.current_context = name.to_string();
    store.save(&doc)
}

/// All contexts in name order.
pub fn list(store: &dyn Store<ServiceContext>) -> Result<Vec<ContextSummary>> {
    let doc = store.load()?;
    Ok(doc
        .contexts
        .iter()
        .map(|(name, services)| ContextSummary {
            name: name.clone(),
            current: *name == doc.current_context,
            registry: services.service_registry.clone(),
        })
        .collect())
}

/// Name and services of the current context.
pub fn current(store: &dyn Store<ServiceContext>) -> Result<(String, ServiceConfigMap)> {
    let doc = store.load()?;
    current_entry(&doc).map(|(name, services)| (name.to_string(), services.clone()))
}

fn current_entry(doc: &ServiceContext) -> Result<(&str, &ServiceConfigMap)> {
    let name = doc.current_context.as_str();
    if name.is_empty() {
        return Err(Error::ContextNotSet);
    }
    doc.contexts
        .get(name)
        .map(|services| (name, services))
        .ok_or_else(|| Error::ContextNotFound(name.to_string()))
}

/// Binds the current context to a registry instance.
pub fn set_registry(
    store: &dyn Store<ServiceContext>,
    registry: ServiceRegistryConfig,
) -> Result<()> {
    let mut doc = store.load()?;
    let name = current_entry(&doc)?.0.to_string();
    if let Some(services) = doc.contexts.get_mut(&name) {
        services.service_registry = Some(registry);
    }
    store.save(&doc)
}

/// Instance id of the registry bound to the current context.
pub fn current_registry_id(store: &dyn Store<ServiceContext>) -> Result<String> {
    let (_, services) = current(store)?;
    services
        .service_registry
        .map(|registry| registry.instance_id)
        .filter(|id| !id.is_empty())
        .ok_or(Error::RegistryNotSet)
}
