//! Provisioning Binary
//!
//! Administrative surface for identities: there are no HTTP endpoints for
//! creating or removing users, operators run this against the auth database.
//!
//! Usage:
//!   provision_user create teacher --username mrs.smith --name Jane --surname Smith
//!   provision_user list
//!   provision_user revoke-sessions --username mrs.smith
//!
//! Environment:
//!   AUTH_DB_PATH - SQLite file shared with the server
//!   BCRYPT_COST - bcrypt work factor (default: 12)
//!   PROVISION_PASSWORD - Password for `create` when --password is omitted

use anyhow::{bail, Context, Result};
use campus_gate::auth::models::{
    AdminProfile, ParentProfile, Profile, StudentProfile, TeacherProfile,
};
use campus_gate::auth::password::MIN_PRODUCTION_COST;
use campus_gate::auth::{SessionStore, UserStore};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "provision_user")]
#[command(about = "Create, list and remove dashboard identities")]
struct Cli {
    /// SQLite file holding identities and sessions
    #[arg(long, env = "AUTH_DB_PATH", default_value = "campus_gate_auth.db")]
    db_path: String,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value = "12")]
    bcrypt_cost: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an identity with its role-specific profile
    Create {
        #[command(subcommand)]
        kind: ProfileKind,
    },
    /// List every identity
    List,
    /// Delete an identity and its profile, revoking its sessions first
    Delete {
        #[arg(long)]
        username: String,
    },
    /// Invalidate every session of an identity (forces sign-in everywhere)
    RevokeSessions {
        #[arg(long)]
        username: String,
    },
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    username: String,

    /// Falls back to PROVISION_PASSWORD
    #[arg(long, env = "PROVISION_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    name: String,
}

#[derive(Subcommand, Debug)]
enum ProfileKind {
    Admin {
        #[command(flatten)]
        credentials: Credentials,
    },
    Teacher {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Student {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        grade: Option<u8>,
        #[arg(long)]
        class_name: Option<String>,
    },
    Parent {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        phone: Option<String>,
    },
}

impl ProfileKind {
    fn into_parts(self) -> (Credentials, Profile) {
        match self {
            ProfileKind::Admin { credentials } => {
                let profile = Profile::Admin(AdminProfile {
                    name: credentials.name.clone(),
                });
                (credentials, profile)
            }
            ProfileKind::Teacher {
                credentials,
                surname,
                email,
                phone,
            } => {
                let profile = Profile::Teacher(TeacherProfile {
                    name: credentials.name.clone(),
                    surname,
                    email,
                    phone,
                });
                (credentials, profile)
            }
            ProfileKind::Student {
                credentials,
                surname,
                grade,
                class_name,
            } => {
                let profile = Profile::Student(StudentProfile {
                    name: credentials.name.clone(),
                    surname,
                    grade,
                    class_name,
                });
                (credentials, profile)
            }
            ProfileKind::Parent {
                credentials,
                surname,
                phone,
            } => {
                let profile = Profile::Parent(ParentProfile {
                    name: credentials.name.clone(),
                    surname,
                    phone,
                });
                (credentials, profile)
            }
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if cli.bcrypt_cost < MIN_PRODUCTION_COST {
        bail!("BCRYPT_COST must be at least {MIN_PRODUCTION_COST}");
    }
    let users = UserStore::new(&cli.db_path)?.with_bcrypt_cost(cli.bcrypt_cost);
    let sessions = SessionStore::new(&cli.db_path)?;

    match cli.command {
        Command::Create { kind } => {
            let (credentials, profile) = kind.into_parts();
            if credentials.password.trim().is_empty() {
                bail!("Password must not be empty");
            }
            let user = users.create_user(&credentials.username, &credentials.password, profile)?;
            println!("{}\t{}\t{}", user.id, user.username, user.role);
        }
        Command::List => {
            for user in users.list_users()? {
                let name = users
                    .get_profile(&user)?
                    .map(|p| p.display_name().to_string())
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    user.id, user.username, user.role, name, user.created_at
                );
            }
        }
        Command::Delete { username } => {
            let user = users
                .get_user_by_username(&username)?
                .with_context(|| format!("No such user: {username}"))?;
            let revoked = sessions.invalidate_all_for_user(&user.id)?;
            users.delete_user(&user.id)?;
            info!("Revoked {} session(s)", revoked);
            info!("Deleted {} ({})", user.username, user.role);
        }
        Command::RevokeSessions { username } => {
            let user = users
                .get_user_by_username(&username)?
                .with_context(|| format!("No such user: {username}"))?;
            let revoked = sessions.invalidate_all_for_user(&user.id)?;
            info!("Revoked {} session(s) for {}", revoked, user.username);
        }
    }

    Ok(())
}
