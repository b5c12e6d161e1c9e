use clap::Parser;

/// Veterinary clinic notification service CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "vet-notifier",
    version,
    about = "Scheduled reminders and notification delivery for a veterinary clinic"
)]
pub struct Cli {
    /// Database connection URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// HTTP port for the health and metrics endpoints
    #[arg(long)]
    pub port: Option<u16>,

    /// Reminder scan interval in seconds
    #[arg(long)]
    pub scan_interval: Option<u64>,

    /// Push service endpoint
    #[arg(long)]
    pub push_url: Option<String>,

    /// Email relay endpoint
    #[arg(long)]
    pub email_url: Option<String>,
}
