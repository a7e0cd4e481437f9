use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use keyward::authz::loader::relation_input;
use keyward::authz::{service, QueryMode, RelationQuery, RelationQueryRequest};
use keyward::backend::{FederatedProtocol, HttpBackend, NewFederatedApp, SamlOptions};
use keyward::migration::{self, LegacyUser};
use keyward::resources::{self, FederatedAppType};
use keyward::settings::Settings;
use keyward::{KeywardError, OperationResult};

#[derive(Parser, Debug)]
#[command(
    name = "keyward",
    version,
    about = "Idempotent identity resource and ReBAC schema management"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "keyward.toml")]
    config: String,

    /// Project ID (overrides config file and environment)
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// Management key (overrides config file and environment)
    #[arg(long, global = true)]
    management_key: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
struct RelationArgs {
    /// JSON file with a non-empty `relations` array
    #[arg(short, long)]
    file: Option<PathBuf>,
    #[arg(short, long)]
    resource: Option<String>,
    #[arg(long)]
    relation: Option<String>,
    #[arg(short, long)]
    namespace: Option<String>,
    #[arg(short, long)]
    target: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an application unless one with the same name exists
    CreateApp {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Create a tenant unless one with the same name exists
    CreateTenant { name: String },
    /// Create an OIDC or SAML federated application
    CreateFederatedApp {
        name: String,
        #[arg(short = 't', long = "type", default_value = "oidc")]
        app_type: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "")]
        login_page_url: String,
        #[arg(long)]
        entity_id: Option<String>,
        #[arg(long)]
        acs_url: Option<String>,
        #[arg(long)]
        certificate: Option<String>,
    },
    /// Create a user unless the login id is taken
    CreateUser {
        login_id: String,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        tenant: Option<String>,
    },
    /// Migrate legacy users with bcrypt-hashed passwords
    MigrateUser {
        /// JSON array of users; replaces the individual fields
        #[arg(long, conflicts_with_all = ["email", "first_name", "last_name", "tenant", "roles", "bcrypt_hash"])]
        file: Option<PathBuf>,
        #[arg(short, long, required_unless_present = "file")]
        email: Option<String>,
        #[arg(short, long, required_unless_present = "file")]
        first_name: Option<String>,
        #[arg(short, long, required_unless_present = "file")]
        last_name: Option<String>,
        #[arg(short, long, required_unless_present = "file")]
        tenant: Option<String>,
        #[arg(short, long, value_delimiter = ',')]
        roles: Vec<String>,
        #[arg(short, long, required_unless_present = "file")]
        bcrypt_hash: Option<String>,
    },
    /// Create or replace the ReBAC schema from a JSON file
    CreateSchema {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
        upgrade: bool,
    },
    LoadSchema,
    DeleteSchema,
    CreateRelation(RelationArgs),
    DeleteRelation(RelationArgs),
    CheckRelation(RelationArgs),
    /// who-can-access, resource-relations or target-access
    QueryRelations {
        #[arg(short, long)]
        mode: String,
        #[arg(short, long)]
        resource: Option<String>,
        #[arg(long)]
        relation: Option<String>,
        #[arg(short, long)]
        namespace: Option<String>,
        #[arg(short, long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings =
        Settings::load(&cli.config)?.with_overrides(cli.project_id.clone(), cli.management_key.clone());
    tracing::debug!(?settings, "Loaded configuration");
    let (project_id, management_key) = settings.credentials()?;
    let backend = HttpBackend::new(&settings.backend, project_id, management_key)
        .map_err(|e| KeywardError::operation("build backend client", e))?;

    let ok = run(cli.command, &backend, cli.output).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Command,
    backend: &HttpBackend,
    output: OutputFormat,
) -> Result<bool, KeywardError> {
    match command {
        Command::CreateApp { name, description } => {
            render(&resources::create_application(backend, &name, &description).await?, output)
        }
        Command::CreateTenant { name } => {
            render(&resources::create_tenant(backend, &name).await?, output)
        }
        Command::CreateFederatedApp {
            name,
            app_type,
            description,
            login_page_url,
            entity_id,
            acs_url,
            certificate,
        } => {
            let protocol = match app_type.parse::<FederatedAppType>() {
                Ok(FederatedAppType::Oidc) => FederatedProtocol::Oidc,
                Ok(FederatedAppType::Saml) => match (entity_id, acs_url, certificate) {
                    (Some(entity_id), Some(acs_url), Some(certificate)) => {
                        FederatedProtocol::Saml(SamlOptions {
                            entity_id,
                            acs_url,
                            certificate,
                        })
                    }
                    _ => {
                        return Err(KeywardError::BadRequest(
                            "SAML applications require --entity-id, --acs-url and --certificate"
                                .into(),
                        ))
                    }
                },
                Err(msg) => return Err(KeywardError::BadRequest(msg)),
            };
            let request = NewFederatedApp {
                name,
                description,
                login_page_url,
                protocol,
            };
            render(
                &resources::create_federated_application(backend, &request).await?,
                output,
            )
        }
        Command::CreateUser {
            login_id,
            email,
            tenant,
        } => render(
            &resources::create_user(backend, &login_id, email.as_deref(), tenant.as_deref())
                .await?,
            output,
        ),
        Command::MigrateUser {
            file: Some(path),
            ..
        } => {
            let users = migration::load_user_file(&path)?;
            render(&migration::migrate_users(backend, &users).await?, output)
        }
        Command::MigrateUser {
            file: None,
            email,
            first_name,
            last_name,
            tenant,
            roles,
            bcrypt_hash,
        } => {
            let user = LegacyUser {
                email: email.unwrap_or_default(),
                first_name: first_name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
                tenant_id: tenant.unwrap_or_default(),
                roles,
                bcrypt_hash: bcrypt_hash.unwrap_or_default(),
            };
            render(&migration::migrate_legacy_user(backend, &user).await?, output)
        }
        Command::CreateSchema { file, upgrade } => {
            render(&service::create_schema(backend, &file, upgrade).await?, output)
        }
        Command::LoadSchema => render(&service::load_schema(backend).await?, output),
        Command::DeleteSchema => render(&service::delete_schema(backend).await?, output),
        Command::CreateRelation(args) => {
            let batch = relation_args(args)?;
            render(&service::create_relations(backend, batch).await?, output)
        }
        Command::DeleteRelation(args) => {
            let batch = relation_args(args)?;
            render(&service::delete_relations(backend, batch).await?, output)
        }
        Command::CheckRelation(args) => {
            let queries: Vec<RelationQuery> = relation_args(args)?
                .relations()
                .iter()
                .map(RelationQuery::from)
                .collect();
            render(&service::check_relations(backend, &queries).await?, output)
        }
        Command::QueryRelations {
            mode,
            resource,
            relation,
            namespace,
            target,
        } => {
            let request = RelationQueryRequest {
                mode: mode.parse::<QueryMode>()?,
                resource,
                relation,
                namespace,
                target,
            };
            render(&service::query_relations(backend, request).await?, output)
        }
    }
}

fn relation_args(args: RelationArgs) -> Result<keyward::authz::RelationBatch, KeywardError> {
    Ok(relation_input(
        args.file.as_deref(),
        args.resource,
        args.relation,
        args.namespace,
        args.target,
    )?)
}

/// Print the result and report whether it was a success.
fn render<T: Serialize>(
    result: &OperationResult<T>,
    output: OutputFormat,
) -> Result<bool, KeywardError> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => match result {
            OperationResult::Failure {
                error_message,
                failures,
                partial,
            } => {
                println!("[failure] {error_message}");
                for f in failures {
                    println!("  {}: {}", f.identifier, f.reason);
                }
                if let Some(partial) = partial {
                    println!("completed before the failure:");
                    println!("{}", serde_json::to_string_pretty(partial)?);
                }
            }
            OperationResult::Success { data, message }
            | OperationResult::Created { data, message }
            | OperationResult::AlreadyExists { data, message } => {
                let status = serde_json::to_value(result.status())?;
                println!("[{}] {message}", status.as_str().unwrap_or_default());
                let data = serde_json::to_value(data)?;
                if !data.is_null() {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                }
            }
        },
    }
    Ok(result.is_success())
}
