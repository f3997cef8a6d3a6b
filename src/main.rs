use clap::{Args, Parser, Subcommand};

use apicr::api::ArtifactSearch;
use apicr::credentials::CredentialsFormat;
use apicr::Factory;

mod cli;

#[derive(Parser)]
#[command(
    name = "apicr",
    version,
    about = "Manage service registries, artifacts and service accounts"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser, or with an offline token
    Login(LoginArgs),

    /// Log out and forget stored tokens
    Logout,

    /// Manage named service contexts
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Manage service registry instances
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Manage service accounts
    #[command(name = "service-account")]
    ServiceAccount {
        #[command(subcommand)]
        action: ServiceAccountAction,
    },

    /// Browse artifacts in a registry instance
    Artifact {
        #[command(subcommand)]
        action: ArtifactAction,
    },
}

#[derive(Args)]
pub struct LoginArgs {
    /// API gateway URL, or one of production, staging, integration
    #[arg(long)]
    pub api_gateway: Option<String>,
    /// SSO realm URL
    #[arg(long)]
    pub auth_url: Option<String>,
    /// OAuth client id
    #[arg(long)]
    pub client_id: Option<String>,
    /// Requested scope (repeatable)
    #[arg(long = "scope")]
    pub scopes: Vec<String>,
    /// Offline token to use instead of the browser flow
    #[arg(short, long)]
    pub token: Option<String>,
    /// Print the login URL instead of opening a browser
    #[arg(long)]
    pub print_url: bool,
    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

#[derive(Subcommand)]
enum ContextAction {
    /// Create a context and make it current
    Create {
        #[arg(long)]
        name: String,
    },
    /// Delete a context (the current one if no name is given)
    Delete {
        #[arg(long)]
        name: Option<String>,
    },
    /// Switch the current context
    Use {
        #[arg(long)]
        name: String,
    },
    /// List contexts
    List,
    /// Show the current context and its registry
    Status,
}

#[derive(Subcommand)]
enum RegistryAction {
    /// List registry instances
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        /// Filter expression, e.g. "name like %dev%"
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a registry instance (the current one if no id is given)
    Describe {
        #[arg(long)]
        id: Option<String>,
    },
    /// Bind the current context to a registry instance
    Use {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum ServiceAccountAction {
    /// Create a service account and save its credentials to a file
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value = "env")]
        file_format: CredentialsFormat,
        /// Defaults to a per-format file in the working directory
        #[arg(long)]
        output_file: Option<String>,
        #[arg(long)]
        overwrite: bool,
    },
    /// Show a service account
    Describe {
        #[arg(long)]
        id: String,
    },
    /// List service accounts
    List,
    /// Delete a service account
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args)]
pub struct InstanceArgs {
    /// Registry instance id (defaults to the current context's registry)
    #[arg(long)]
    pub instance_id: Option<String>,
}

#[derive(Subcommand)]
enum ArtifactAction {
    /// List artifacts
    List {
        #[command(flatten)]
        instance: InstanceArgs,
        #[arg(short, long, default_value = apicr::constants::DEFAULT_ARTIFACT_GROUP)]
        group: String,
        /// Search every group
        #[arg(short, long)]
        all_groups: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// Match artifact names
        #[arg(long)]
        name: Option<String>,
        /// Match artifact descriptions
        #[arg(long)]
        description: Option<String>,
        /// Required label (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Required property as key:value (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,
    },
    /// Show artifact metadata
    Metadata {
        #[command(flatten)]
        instance: InstanceArgs,
        #[arg(short, long, default_value = apicr::constants::DEFAULT_ARTIFACT_GROUP)]
        group: String,
        #[arg(long)]
        artifact_id: String,
    },
    /// List versions of an artifact
    Versions {
        #[command(flatten)]
        instance: InstanceArgs,
        #[arg(short, long, default_value = apicr::constants::DEFAULT_ARTIFACT_GROUP)]
        group: String,
        #[arg(long)]
        artifact_id: String,
    },
    /// Download artifact content by global id, content id or hash
    Download {
        #[command(flatten)]
        instance: InstanceArgs,
        #[arg(long)]
        global_id: Option<i64>,
        #[arg(long)]
        content_id: Option<i64>,
        #[arg(long)]
        hash: Option<String>,
        /// Write to this file instead of stdout
        #[arg(long)]
        output_file: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    apicr::logging::init(cli.verbose);

    let result = Factory::from_env()
        .map_err(anyhow::Error::from)
        .and_then(|mut factory| run(&mut factory, cli.command));

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(factory: &mut Factory, command: Commands) -> anyhow::Result<()> {
    use cli::commands::*;

    match command {
        Commands::Login(args) => cmd_login(factory, &args),
        Commands::Logout => cmd_logout(factory),
        Commands::Context { action } => match action {
            ContextAction::Create { name } => cmd_context_create(factory, &name),
            ContextAction::Delete { name } => cmd_context_delete(factory, name.as_deref()),
            ContextAction::Use { name } => cmd_context_use(factory, &name),
            ContextAction::List => cmd_context_list(factory),
            ContextAction::Status => cmd_context_status(factory),
        },
        Commands::Registry { action } => match action {
            RegistryAction::List { page, size, search } => {
                cmd_registry_list(factory, page, size, search.as_deref())
            }
            RegistryAction::Describe { id } => cmd_registry_describe(factory, id.as_deref()),
            RegistryAction::Use { id } => cmd_registry_use(factory, &id),
        },
        Commands::ServiceAccount { action } => match action {
            ServiceAccountAction::Create {
                name,
                description,
                file_format,
                output_file,
                overwrite,
            } => cmd_service_account_create(
                factory,
                &name,
                description.as_deref(),
                file_format,
                output_file.as_deref(),
                overwrite,
            ),
            ServiceAccountAction::Describe { id } => cmd_service_account_describe(factory, &id),
            ServiceAccountAction::List => cmd_service_account_list(factory),
            ServiceAccountAction::Delete { id } => cmd_service_account_delete(factory, &id),
        },
        Commands::Artifact { action } => match action {
            ArtifactAction::List {
                instance,
                group,
                all_groups,
                page,
                limit,
                name,
                description,
                labels,
                properties,
            } => {
                let search = ArtifactSearch {
                    group: (!all_groups).then_some(group),
                    name,
                    description,
                    labels,
                    properties,
                    page,
                    limit,
                };
                cmd_artifact_list(factory, instance.instance_id.as_deref(), &search)
            }
            ArtifactAction::Metadata {
                instance,
                group,
                artifact_id,
            } => cmd_artifact_metadata(
                factory,
                instance.instance_id.as_deref(),
                &group,
                &artifact_id,
            ),
            ArtifactAction::Versions {
                instance,
                group,
                artifact_id,
            } => cmd_artifact_versions(
                factory,
                instance.instance_id.as_deref(),
                &group,
                &artifact_id,
            ),
            ArtifactAction::Download {
                instance,
                global_id,
                content_id,
                hash,
                output_file,
            } => {
                let reference = content_ref(global_id, content_id, hash)?;
                cmd_artifact_download(
                    factory,
                    instance.instance_id.as_deref(),
                    &reference,
                    output_file.as_deref(),
                )
            }
        },
    }
}
