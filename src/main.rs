//! Chatroom CLI entry point

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use anyhow::Result;
use chatroom::auth::AuthSession;
use chatroom::config::Config;
use chatroom::rooms::{ChatRoomDraft, RoomsClient};
use chatroom::ui::{self, ConsoleNavigator};

#[derive(Parser)]
#[command(name = "chatroom")]
#[command(about = "Chat-room client with auto-refreshing sign-in")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Store a credential pair issued by the server
    SignIn {
        /// Access credential
        #[arg(long)]
        access: String,

        /// Refresh credential
        #[arg(long)]
        refresh: String,

        /// Keep the credentials for this process only
        #[arg(long)]
        no_remember: bool,
    },

    /// Remove stored credentials
    SignOut,

    /// Show who is signed in
    Status,

    /// Chat-room operations
    Rooms {
        #[command(subcommand)]
        command: RoomsCommand,
    },

    /// Hash a password the way the server stores it
    HashPassword {
        password: String,

        /// Salt to use; a random one is generated when omitted
        #[arg(long)]
        salt: Option<String>,
    },
}

#[derive(Subcommand)]
enum RoomsCommand {
    /// List rooms
    List,

    /// Create a room
    Create {
        name: String,

        /// Maximum number of members
        #[arg(short, long, default_value_t = 2)]
        max_users: u32,

        /// Password; makes the room encrypted
        #[arg(short, long)]
        password: Option<String>,

        /// Keep the room after everyone leaves
        #[arg(long)]
        permanent: bool,

        /// Hide the room from the listing
        #[arg(long)]
        hidden: bool,
    },

    /// Ask the server whether a room name is available
    CheckName { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = Config::default();
            chatroom::config::save(&config)?;
            ui::print_success(&format!(
                "Configuration written to {:?}",
                chatroom::config::config_path()
            ));
        }

        Commands::HashPassword { password, salt } => {
            let salt = salt.unwrap_or_else(chatroom::password::generate_salt);
            println!("salt: {}", salt);
            println!("hash: {}", chatroom::password::generate_password_hash(&password, &salt));
        }

        Commands::SignIn { access, refresh, no_remember } => {
            let (_, session) = open_session()?;
            let claims = session.sign_in(&access, &refresh, !no_remember)?;
            ui::print_success(&format!("Signed in as {}", claims.display_name));
        }

        Commands::SignOut => {
            let (_, session) = open_session()?;
            session.sign_out();
            ui::print_success("Signed out");
        }

        Commands::Status => {
            let (config, session) = open_session()?;
            println!("Server: {}", config.server_url);
            match session.current_user()? {
                Some(claims) => {
                    println!("User: {}", claims.display_name);
                    println!("Role: {}", claims.role);
                    if let Some(expires) = claims.expires_at_utc() {
                        println!("Access expires: {}", expires.to_rfc3339());
                    }
                    println!(
                        "Remembered: {}",
                        if session.remember_login_state() { "yes" } else { "no" }
                    );
                    if !claims.is_logged_in() {
                        ui::print_warning("Guest credential, sign in for full access");
                    }
                }
                None => println!("Not signed in (run 'chatroom sign-in')"),
            }
        }

        Commands::Rooms { command } => {
            let (config, session) = open_session()?;
            let rooms = RoomsClient::new(&config, session.invoker())?;
            run_rooms(&rooms, command).await?;
        }
    }

    Ok(())
}

fn open_session() -> Result<(Config, AuthSession)> {
    let config = chatroom::config::load()?;
    let session = AuthSession::from_config(&config, Arc::new(ConsoleNavigator::new()))?;
    Ok((config, session))
}

async fn run_rooms(rooms: &RoomsClient, command: RoomsCommand) -> Result<()> {
    match command {
        RoomsCommand::List => {
            let listed = rooms.list_rooms().await?;
            if listed.is_empty() {
                ui::print_step("No rooms yet");
            }
            for room in listed {
                let lock = if room.is_encrypted { " 🔒" } else { "" };
                println!(
                    "{:<20} {:>4}/{:<4} {}{}",
                    room.name, room.current_users, room.max_users, room.owner_name, lock
                );
            }
        }

        RoomsCommand::Create { name, max_users, password, permanent, hidden } => {
            let draft = ChatRoomDraft {
                name,
                max_users,
                is_encrypted: password.is_some(),
                password,
                is_permanent: permanent,
                is_hidden: hidden,
            };

            draft.validate()?;

            if let Some(objection) = rooms.validate_room_name(&draft.name).await? {
                ui::print_error(&objection);
                return Ok(());
            }

            rooms.create_room(&draft).await?;
            ui::print_success(&format!("Room {} created", draft.name));
        }

        RoomsCommand::CheckName { name } => match rooms.validate_room_name(&name).await? {
            Some(objection) => ui::print_error(&objection),
            None => ui::print_success(&format!("{} is available", name)),
        },
    }

    Ok(())
}
