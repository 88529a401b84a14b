//! CLI commands

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand, ValueEnum};
use posadmin_core::types::{BillingCycle, CreatePlanRequest, ListQuery, TenantStatus, TicketStatus};
use posadmin_core::{
    Action, AuthEvent, AuthEvents, ClientConfig, CredentialStore, FileStorage, PermissionDenied,
};
use posadmin_http::{ClientError, ClientFactory, Notifier, Toast, ToastLevel};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session locally
    Login {
        #[arg(long, env = "POSADMIN_EMAIL")]
        email: String,

        /// Read from stdin when omitted
        #[arg(long, env = "POSADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the session and forget stored tokens
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Subscription plans
    Plans {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Roles and grantable permissions
    Roles {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Tenant accounts
    Tenants {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// Platform users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Support tickets
    Tickets {
        #[command(subcommand)]
        command: TicketCommands,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[arg(long)]
    page: Option<u32>,

    #[arg(long)]
    per_page: Option<u32>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    status: Option<String>,
}

impl From<ListArgs> for ListQuery {
    fn from(args: ListArgs) -> Self {
        ListQuery {
            page: args.page,
            per_page: args.per_page,
            search: args.search,
            status: args.status,
        }
    }
}

#[derive(Subcommand)]
pub enum PlanCommands {
    List {
        #[command(flatten)]
        query: ListArgs,

        /// Bypass the local plan cache
        #[arg(long)]
        no_cache: bool,
    },
    Get {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        price: Decimal,

        #[arg(long, value_enum, default_value = "monthly")]
        billing_cycle: CycleArg,

        #[arg(long)]
        description: Option<String>,

        /// Repeat for each feature
        #[arg(long = "feature")]
        features: Vec<String>,

        #[arg(long)]
        max_users: Option<u32>,

        #[arg(long)]
        max_locations: Option<u32>,
    },
    Delete {
        id: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CycleArg {
    Monthly,
    Yearly,
}

impl From<CycleArg> for BillingCycle {
    fn from(cycle: CycleArg) -> Self {
        match cycle {
            CycleArg::Monthly => BillingCycle::Monthly,
            CycleArg::Yearly => BillingCycle::Yearly,
        }
    }
}

#[derive(Subcommand)]
pub enum RoleCommands {
    List,
    /// List every grantable permission
    Permissions,
}

#[derive(Subcommand)]
pub enum TenantCommands {
    List {
        #[command(flatten)]
        query: ListArgs,
    },
    Get {
        id: String,
    },
    Suspend {
        id: String,
    },
    Activate {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    List {
        #[command(flatten)]
        query: ListArgs,
    },
    Get {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TicketCommands {
    List {
        #[command(flatten)]
        query: ListArgs,
    },
    Get {
        id: String,
    },
    Reply {
        id: String,
        message: String,
    },
    Close {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Output file path (defaults to <data_dir>/config.toml)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Run the command, reporting any failure as a toast on stderr
    pub async fn execute(self, config: ClientConfig) -> Result<()> {
        let notifier = StderrNotifier;

        let (factory, mut events) = match &self {
            Commands::Config { .. } => (None, None),
            _ => {
                let factory = connect(&config)?;
                let events = factory.credentials().events().subscribe();
                (Some(factory), Some(events))
            }
        };

        let result = match (self, factory) {
            (Commands::Config { command }, _) => command.execute(&config),
            (command, Some(factory)) => command.run(&factory, &notifier).await,
            (_, None) => Err(anyhow!("client was not initialised")),
        };

        if let Err(e) = &result {
            report(&notifier, e);
            if let Some(events) = events.as_mut() {
                hint_login(events);
            }
        }
        result
    }

    async fn run(self, factory: &ClientFactory, notifier: &dyn Notifier) -> Result<()> {
        match self {
            Commands::Login { email, password } => {
                let password = match password {
                    Some(password) => password,
                    None => prompt_password()?,
                };
                let response = factory.auth().login(&email, &password).await?;
                let name = response
                    .user
                    .map(|u| u.display_name())
                    .unwrap_or_else(|| email.clone());
                notifier.notify(&Toast::success(format!("Logged in as {name}")));
                Ok(())
            }
            Commands::Logout => {
                factory.auth().logout().await?;
                notifier.notify(&Toast::success("Logged out"));
                Ok(())
            }
            Commands::Whoami => {
                ensure_logged_in(factory)?;
                print_json(&factory.auth().me().await?)
            }
            Commands::Plans { command } => command.run(factory, notifier).await,
            Commands::Roles { command } => command.run(factory).await,
            Commands::Tenants { command } => command.run(factory, notifier).await,
            Commands::Users { command } => command.run(factory).await,
            Commands::Tickets { command } => command.run(factory, notifier).await,
            Commands::Config { .. } => Ok(()),
        }
    }
}

impl PlanCommands {
    async fn run(self, factory: &ClientFactory, notifier: &dyn Notifier) -> Result<()> {
        let plans = factory.plans();
        match self {
            PlanCommands::List { query, no_cache } => {
                let query = ListQuery::from(query);
                let page = if no_cache {
                    plans.list(&query).await?
                } else {
                    plans.list_cached(&query).await?
                };
                print_json(&page)
            }
            PlanCommands::Get { id } => print_json(&plans.get(&id).await?),
            PlanCommands::Create {
                name,
                price,
                billing_cycle,
                description,
                features,
                max_users,
                max_locations,
            } => {
                require(factory, "plans", Action::Create).await?;
                let plan = plans
                    .create(&CreatePlanRequest {
                        name,
                        description,
                        price,
                        billing_cycle: billing_cycle.into(),
                        features,
                        max_users,
                        max_locations,
                    })
                    .await?;
                notifier.notify(&Toast::success(format!("Plan {} created", plan.name)));
                print_json(&plan)
            }
            PlanCommands::Delete { id } => {
                require(factory, "plans", Action::Delete).await?;
                plans.delete(&id).await?;
                notifier.notify(&Toast::success(format!("Plan {id} deleted")));
                Ok(())
            }
        }
    }
}

impl RoleCommands {
    async fn run(self, factory: &ClientFactory) -> Result<()> {
        let roles = factory.roles();
        match self {
            RoleCommands::List => print_json(&roles.list().await?),
            RoleCommands::Permissions => print_json(&roles.permissions().await?),
        }
    }
}

impl TenantCommands {
    async fn run(self, factory: &ClientFactory, notifier: &dyn Notifier) -> Result<()> {
        let tenants = factory.tenants();
        let (id, status) = match self {
            TenantCommands::List { query } => {
                return print_json(&tenants.list(&query.into()).await?);
            }
            TenantCommands::Get { id } => return print_json(&tenants.get(&id).await?),
            TenantCommands::Suspend { id } => (id, TenantStatus::Suspended),
            TenantCommands::Activate { id } => (id, TenantStatus::Active),
        };

        require(factory, "tenants", Action::Update).await?;
        let tenant = tenants.set_status(&id, status).await?;
        notifier.notify(&Toast::success(format!(
            "Tenant {} is now {}",
            tenant.name,
            tenant.status.as_str()
        )));
        print_json(&tenant)
    }
}

impl UserCommands {
    async fn run(self, factory: &ClientFactory) -> Result<()> {
        let users = factory.users();
        match self {
            UserCommands::List { query } => print_json(&users.list(&query.into()).await?),
            UserCommands::Get { id } => print_json(&users.get(&id).await?),
        }
    }
}

impl TicketCommands {
    async fn run(self, factory: &ClientFactory, notifier: &dyn Notifier) -> Result<()> {
        let tickets = factory.tickets();
        match self {
            TicketCommands::List { query } => print_json(&tickets.list(&query.into()).await?),
            TicketCommands::Get { id } => print_json(&tickets.get(&id).await?),
            TicketCommands::Reply { id, message } => {
                require(factory, "tickets", Action::Update).await?;
                let reply = tickets.reply(&id, &message).await?;
                notifier.notify(&Toast::success(format!("Replied to ticket {id}")));
                print_json(&reply)
            }
            TicketCommands::Close { id } => {
                require(factory, "tickets", Action::Update).await?;
                let ticket = tickets.update_status(&id, TicketStatus::Closed).await?;
                notifier.notify(&Toast::success(format!("Ticket {id} closed")));
                print_json(&ticket)
            }
        }
    }
}

impl ConfigCommands {
    fn execute(self, settings: &ClientConfig) -> Result<()> {
        match self {
            ConfigCommands::Init { output, force } => {
                let path = output.unwrap_or_else(|| settings.data_dir.join(config::CONFIG_FILE));
                if path.exists() && !force {
                    bail!(
                        "{} already exists, pass --force to overwrite it",
                        path.display()
                    );
                }
                config::generate_default_config(&path)?;
                info!("Configuration written to {}", path.display());
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}

/// Build a client factory over file-backed credentials in the data directory
fn connect(config: &ClientConfig) -> Result<ClientFactory> {
    let storage = FileStorage::open(config.storage_path())
        .with_context(|| format!("Failed to open {}", config.storage_path().display()))?;
    let credentials = CredentialStore::new(Arc::new(storage), AuthEvents::new());
    Ok(ClientFactory::from_config(config, credentials)?)
}

fn ensure_logged_in(factory: &ClientFactory) -> Result<()> {
    if !factory.auth().is_logged_in() {
        return Err(PermissionDenied::NotAuthenticated.into());
    }
    Ok(())
}

/// Check the logged-in user's permissions before a mutating call.
/// The server still enforces its own rules.
async fn require(factory: &ClientFactory, resource: &str, action: Action) -> Result<()> {
    ensure_logged_in(factory)?;
    let permissions = factory.auth().permissions().await?;
    permissions.check(resource, action)?;
    Ok(())
}

fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("no password given");
    }
    Ok(password)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(notifier: &dyn Notifier, err: &anyhow::Error) {
    if let Some(client) = err.downcast_ref::<ClientError>() {
        notifier.notify_error(client);
        return;
    }
    let toast = match err.downcast_ref::<PermissionDenied>() {
        Some(denied) => Toast {
            level: ToastLevel::Warning,
            title: "Permission denied".into(),
            message: denied.to_string(),
        },
        None => Toast {
            level: ToastLevel::Error,
            title: "Error".into(),
            message: format!("{err:#}"),
        },
    };
    notifier.notify(&toast);
}

fn hint_login(events: &mut broadcast::Receiver<AuthEvent>) {
    while let Ok(event) = events.try_recv() {
        if event == AuthEvent::LoginRequired {
            eprintln!("Run `posadmin login` to start a new session.");
            return;
        }
    }
}

/// Prints toasts for the operator on stderr, keeping stdout for JSON output
#[derive(Debug, Clone, Copy)]
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, toast: &Toast) {
        let tag = match toast.level {
            ToastLevel::Info => "info",
            ToastLevel::Success => "ok",
            ToastLevel::Warning => "warning",
            ToastLevel::Error => "error",
        };
        eprintln!("[{tag}] {}: {}", toast.title, toast.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_list_args_become_query() {
        let cli = TestCli::parse_from([
            "posadmin", "tenants", "list", "--page", "3", "--search", "bakery",
        ]);
        let Commands::Tenants {
            command: TenantCommands::List { query },
        } = cli.command
        else {
            panic!("unexpected command");
        };
        let query = ListQuery::from(query);
        assert_eq!(query.page, Some(3));
        assert_eq!(query.search.as_deref(), Some("bakery"));
        assert!(query.per_page.is_none());
    }

    #[test]
    fn test_plan_create_parses_price_and_features() {
        let cli = TestCli::parse_from([
            "posadmin",
            "plans",
            "create",
            "--name",
            "Pro",
            "--price",
            "49.90",
            "--billing-cycle",
            "yearly",
            "--feature",
            "inventory",
            "--feature",
            "loyalty",
        ]);
        let Commands::Plans {
            command:
                PlanCommands::Create {
                    price,
                    billing_cycle,
                    features,
                    ..
                },
        } = cli.command
        else {
            panic!("unexpected command");
        };
        assert_eq!(price.to_string(), "49.90");
        assert_eq!(BillingCycle::from(billing_cycle), BillingCycle::Yearly);
        assert_eq!(features, vec!["inventory", "loyalty"]);
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = ClientConfig {
            data_dir: dir.path().to_path_buf(),
            ..ClientConfig::default()
        };

        ConfigCommands::Init {
            output: None,
            force: false,
        }
        .execute(&settings)
        .unwrap();
        assert!(dir.path().join(config::CONFIG_FILE).is_file());

        let again = ConfigCommands::Init {
            output: None,
            force: false,
        }
        .execute(&settings);
        assert!(again.is_err());

        ConfigCommands::Init {
            output: None,
            force: true,
        }
        .execute(&settings)
        .unwrap();
    }

    #[test]
    fn test_login_required_hint_consumes_events() {
        let events = AuthEvents::new();
        let mut rx = events.subscribe();
        events.emit(AuthEvent::StateChanged { logged_in: false });
        events.emit(AuthEvent::LoginRequired);
        hint_login(&mut rx);
        assert!(rx.try_recv().is_err());
    }
}
