//! CFAC CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cfac-cli migrate
//!
//! # Create a staff account (password prompted when omitted)
//! cfac-cli add-employee -e tech@example.com -u jsmith -n "Jo Smith" -r tech
//!
//! # Load the service catalogue
//! cfac-cli seed-services --file services.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cfac-cli")]
#[command(author, version, about = "CFAC CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create an admin, technician, or sales account
    AddEmployee {
        /// Employee email address
        #[arg(short, long)]
        email: String,

        /// Login username
        #[arg(short, long)]
        username: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`admin`, `tech`, `sales`)
        #[arg(short, long)]
        role: String,

        /// Password; prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Insert or update the service catalogue
    SeedServices {
        /// YAML file with the services; the built-in catalogue when omitted
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::AddEmployee {
            email,
            username,
            name,
            role,
            password,
        } => {
            let request = commands::employee::EmployeeRequest {
                email,
                username,
                name,
                role,
                password,
            };
            commands::employee::add(request).await?;
        }
        Commands::SeedServices { file } => commands::seed::services(file.as_deref()).await?,
    }
    Ok(())
}
