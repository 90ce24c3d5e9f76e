//! Campus operator CLI.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use campus_core::config::NotificationConfig;
use campus_core::lifecycle::BootcampStatus;
use campus_core::otp::RandomCodeSource;
use campus_core::tracing_init::init_tracing;
use campus_core::{Actor, Role, SystemClock};

use campus_server::notifications::{ChannelRouter, NotificationDispatcher, TracingDispatcher};
use campus_server::service::{Collaborators, NewAccount, Services, SimulatedGateway};
use campus_server::storage::{CampusDatabase, Gender};

#[derive(Parser, Debug)]
#[command(name = "campus")]
#[command(version, about = "Campus - bootcamp platform operator tool")]
struct Args {
    /// Path to SQLite database file.
    #[arg(long, global = true, env = "CAMPUS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Path to a JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema.
    Migrate,
    /// Create an account with an explicit role.
    CreateUser {
        #[arg(long)]
        phone: String,
        #[arg(long, env = "CAMPUS_USER_PASSWORD")]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        national_id: String,
        /// `male` or `female`.
        #[arg(long)]
        gender: Gender,
        /// `normal`, `support` or `admin`.
        #[arg(long, default_value = "normal")]
        role: Role,
    },
    /// Send a login code to a phone number.
    IssueOtp {
        #[arg(long)]
        phone: String,
    },
    /// Check a login code and print the issued tokens.
    VerifyOtp {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
    /// Move a bootcamp to another status, acting as an admin account.
    SetBootcampStatus {
        /// Phone number of the admin performing the change.
        #[arg(long)]
        admin_phone: String,
        #[arg(long)]
        bootcamp_id: i64,
        /// `registration`, `ongoing`, `completed` or `canceled`.
        #[arg(long)]
        status: BootcampStatus,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = campus_core::config::load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }
    init_tracing(&config.server.log_level, args.log_json);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting campus");

    let db_path = match &config.server.database_path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening campus database");
    let db = CampusDatabase::open(&db_path).await?;

    if matches!(args.command, Command::Migrate) {
        return print_json(&serde_json::json!({ "database": db_path, "migrated": true }));
    }

    let clock = Arc::new(SystemClock);
    let services = Services::new(
        &db,
        &config,
        Collaborators {
            clock: clock.clone(),
            codes: Arc::new(RandomCodeSource),
            dispatcher: Arc::new(ChannelRouter::new(
                sms_dispatcher(&config.notifications)?,
                Arc::new(TracingDispatcher),
            )),
            gateway: Arc::new(SimulatedGateway::new(
                config.billing.gateway_name.clone(),
                clock,
            )),
        },
    );

    match args.command {
        Command::Migrate => Ok(()),
        Command::CreateUser {
            phone,
            password,
            first_name,
            last_name,
            national_id,
            gender,
            role,
        } => {
            let user = services
                .accounts
                .create_user_with_role(
                    &NewAccount {
                        phone: &phone,
                        password: &password,
                        first_name: &first_name,
                        last_name: &last_name,
                        national_id: &national_id,
                        gender,
                    },
                    role,
                )
                .await?;
            print_json(&user)
        }
        Command::IssueOtp { phone } => print_json(&services.otp.issue(&phone).await?),
        Command::VerifyOtp { phone, code } => {
            let session = services.otp.verify(&phone, &code).await?;
            print_json(&session.tokens)
        }
        Command::SetBootcampStatus {
            admin_phone,
            bootcamp_id,
            status,
        } => {
            let admin = db.get_user_by_phone(&admin_phone).await?;
            let actor = Actor::new(admin.id, admin.role);
            let bootcamp = services
                .catalog
                .set_bootcamp_status(&actor, bootcamp_id, status)
                .await?;
            print_json(&bootcamp)
        }
    }
}

/// SMS goes through the gateway when a key is configured, otherwise to the log.
fn sms_dispatcher(config: &NotificationConfig) -> anyhow::Result<Arc<dyn NotificationDispatcher>> {
    #[cfg(feature = "sms-gateway")]
    if let Some(api_key) = &config.sms_api_key {
        let client = campus_server::notifications::KavenegarClient::new(api_key, &config.sms_template)?;
        return Ok(Arc::new(client));
    }
    #[cfg(not(feature = "sms-gateway"))]
    if config.sms_api_key.is_some() {
        tracing::warn!("sms_api_key is set but this build lacks the sms-gateway feature; SMS will only be logged");
    }
    Ok(Arc::new(TracingDispatcher))
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".campus").join("campus.db"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
