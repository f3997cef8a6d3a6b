use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use apicr::api::{ArtifactSearch, ContentRef};
use apicr::context;
use apicr::credentials::{self, Credentials, CredentialsFormat};
use apicr::storage::{self, ServiceRegistryConfig};
use apicr::Factory;

use crate::LoginArgs;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `--instance-id`, or the registry bound to the current context.
fn resolve_instance(factory: &Factory, instance_id: Option<&str>) -> Result<String> {
    match instance_id.filter(|id| !id.is_empty()) {
        Some(id) => Ok(id.to_string()),
        None => Ok(context::current_registry_id(factory.service_context())?),
    }
}

// -- Authentication -----------------------------------------------------------

pub fn cmd_login(factory: &mut Factory, args: &LoginArgs) -> Result<()> {
    let mut config = factory.config().load()?;
    if let Some(url) = &args.api_gateway {
        config.api_url = url.clone();
    }
    if let Some(url) = &args.auth_url {
        config.auth_url = url.clone();
    }
    if let Some(client_id) = &args.client_id {
        config.client_id = client_id.clone();
    }
    if !args.scopes.is_empty() {
        config.scopes = args.scopes.clone();
    }
    config.insecure = args.insecure;
    factory
        .config()
        .save(&config)
        .context("Failed to save login settings")?;

    let mut conn = factory.build_connection()?;
    match &args.token {
        Some(token) => conn.login_with_token(token)?,
        None => conn.login_with_browser(!args.print_url)?,
    }

    eprintln!("Logged in to {}.", conn.api_url());
    Ok(())
}

pub fn cmd_logout(factory: &mut Factory) -> Result<()> {
    if !factory.config().load()?.is_logged_in() {
        eprintln!("Not logged in.");
        return Ok(());
    }

    let mut conn = factory.build_connection()?;
    conn.logout()?;
    eprintln!("Logged out.");
    Ok(())
}

// -- Contexts -----------------------------------------------------------------

pub fn cmd_context_create(factory: &mut Factory, name: &str) -> Result<()> {
    context::create(factory.service_context(), name)?;
    eprintln!("Context '{}' created and set as current.", name);
    Ok(())
}

pub fn cmd_context_delete(factory: &mut Factory, name: Option<&str>) -> Result<()> {
    let deleted = context::delete(factory.service_context(), name)?;
    eprintln!("Context '{}' deleted.", deleted);
    Ok(())
}

pub fn cmd_context_use(factory: &mut Factory, name: &str) -> Result<()> {
    context::use_context(factory.service_context(), name)?;
    eprintln!("Current context set to '{}'.", name);
    Ok(())
}

pub fn cmd_context_list(factory: &mut Factory) -> Result<()> {
    let entries = context::list(factory.service_context())?;
    if entries.is_empty() {
        eprintln!("No contexts. Run `apicr context create --name <name>` to create one.");
        return Ok(());
    }
    print_json(&entries)
}

pub fn cmd_context_status(factory: &mut Factory) -> Result<()> {
    #[derive(Serialize)]
    struct Status {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        registry: Option<ServiceRegistryConfig>,
    }

    let (name, services) = context::current(factory.service_context())?;
    print_json(&Status {
        name,
        registry: services.service_registry,
    })
}

// -- Registries ---------------------------------------------------------------

pub fn cmd_registry_list(
    factory: &mut Factory,
    page: u32,
    size: u32,
    search: Option<&str>,
) -> Result<()> {
    let conn = factory.connection()?;
    let list = conn.api().registry_mgmt().list(page, size, search)?;
    if list.items.is_empty() {
        eprintln!("No registry instances found.");
        return Ok(());
    }
    print_json(&list)
}

pub fn cmd_registry_describe(factory: &mut Factory, id: Option<&str>) -> Result<()> {
    let id = resolve_instance(factory, id)?;
    let conn = factory.connection()?;
    let registry = conn
        .api()
        .registry_mgmt()
        .get(&id)
        .with_context(|| format!("Failed to get registry '{}'", id))?;
    print_json(&registry)
}

pub fn cmd_registry_use(factory: &mut Factory, id: &str) -> Result<()> {
    let registry = factory.connection()?.api().registry_mgmt().get(id)?;
    context::set_registry(
        factory.service_context(),
        ServiceRegistryConfig {
            instance_id: registry.id.clone(),
            name: registry.name.clone(),
        },
    )?;
    eprintln!("Using registry '{}' ({}).", registry.name, registry.id);
    Ok(())
}

// -- Service accounts ---------------------------------------------------------

pub fn cmd_service_account_create(
    factory: &mut Factory,
    name: &str,
    description: Option<&str>,
    format: CredentialsFormat,
    output_file: Option<&str>,
    overwrite: bool,
) -> Result<()> {
    let path = match output_file {
        Some(path) => path.to_string(),
        None => credentials::default_path(format).to_string_lossy().into_owned(),
    };

    let conn = factory.connection()?;
    let account = conn
        .api()
        .service_account_mgmt()
        .create(name, description)?;
    let secret = account
        .secret
        .clone()
        .context("Service account was created without a secret")?;

    let creds = Credentials {
        client_id: account.client_id.clone(),
        client_secret: secret,
        token_url: conn.token_url(),
    };
    let written = credentials::write(format, &path, &creds, overwrite).with_context(|| {
        format!(
            "Service account '{}' was created but its credentials could not be saved",
            account.id
        )
    })?;

    eprintln!(
        "Service account '{}' created. Credentials saved to {}.",
        account.name,
        written.display()
    );
    Ok(())
}

pub fn cmd_service_account_describe(factory: &mut Factory, id: &str) -> Result<()> {
    let account = factory
        .connection()?
        .api()
        .service_account_mgmt()
        .get(id)?;
    print_json(&account)
}

pub fn cmd_service_account_list(factory: &mut Factory) -> Result<()> {
    let accounts = factory.connection()?.api().service_account_mgmt().list()?;
    if accounts.is_empty() {
        eprintln!("No service accounts found.");
        return Ok(());
    }
    print_json(&accounts)
}

pub fn cmd_service_account_delete(factory: &mut Factory, id: &str) -> Result<()> {
    factory
        .connection()?
        .api()
        .service_account_mgmt()
        .delete(id)?;
    eprintln!("Service account '{}' deleted.", id);
    Ok(())
}

// -- Artifacts ----------------------------------------------------------------

pub fn content_ref(
    global_id: Option<i64>,
    content_id: Option<i64>,
    hash: Option<String>,
) -> Result<ContentRef> {
    match (global_id, content_id, hash) {
        (Some(id), None, None) => Ok(ContentRef::GlobalId(id)),
        (None, Some(id), None) => Ok(ContentRef::ContentId(id)),
        (None, None, Some(hash)) => Ok(ContentRef::Hash(hash)),
        (None, None, None) => bail!("Specify one of --global-id, --content-id or --hash"),
        _ => bail!("Only one of --global-id, --content-id or --hash can be used"),
    }
}

pub fn cmd_artifact_list(
    factory: &mut Factory,
    instance_id: Option<&str>,
    search: &ArtifactSearch,
) -> Result<()> {
    if search.page < 1 || search.limit < 1 {
        bail!("--page and --limit must both be at least 1");
    }

    let id = resolve_instance(factory, instance_id)?;
    let conn = factory.connection()?;
    let list = conn.api().registry_instance(&id)?.search(search)?;

    if list.artifacts.is_empty() {
        match &search.group {
            Some(group) => eprintln!("No artifacts in group '{}' of registry '{}'.", group, id),
            None => eprintln!("No artifacts in registry '{}'.", id),
        }
        return Ok(());
    }
    print_json(&list)
}

pub fn cmd_artifact_metadata(
    factory: &mut Factory,
    instance_id: Option<&str>,
    group: &str,
    artifact_id: &str,
) -> Result<()> {
    let id = resolve_instance(factory, instance_id)?;
    let conn = factory.connection()?;
    let metadata = conn
        .api()
        .registry_instance(&id)?
        .metadata(group, artifact_id)?;
    print_json(&metadata)
}

pub fn cmd_artifact_versions(
    factory: &mut Factory,
    instance_id: Option<&str>,
    group: &str,
    artifact_id: &str,
) -> Result<()> {
    let id = resolve_instance(factory, instance_id)?;
    let conn = factory.connection()?;
    let versions = conn
        .api()
        .registry_instance(&id)?
        .versions(group, artifact_id)?;
    print_json(&versions)
}

pub fn cmd_artifact_download(
    factory: &mut Factory,
    instance_id: Option<&str>,
    reference: &ContentRef,
    output_file: Option<&str>,
) -> Result<()> {
    let id = resolve_instance(factory, instance_id)?;
    let conn = factory.connection()?;
    let content = conn.api().registry_instance(&id)?.content(reference)?;

    match output_file {
        Some(path) => {
            storage::write_private(Path::new(path), &content, true)
                .with_context(|| format!("Failed to write {}", path))?;
            eprintln!("Saved artifact content to {}.", path);
        }
        None => println!("{}", String::from_utf8_lossy(&content)),
    }
    Ok(())
}
