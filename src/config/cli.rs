use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "roster")]
#[command(about = "Daily volunteer routine and shift-swap marketplace")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "roster.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log in with your roll number
    Login { roll_number: String },
    /// Forget the saved session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Show the routine for a date (defaults to today)
    Routine {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Check in to one of your shifts
    CheckIn { instance_id: i64 },
    /// Record a no-show on a shift
    MarkAbsent { instance_id: i64 },
    /// Drop one of your shifts into the marketplace
    Drop { instance_id: i64 },
    /// Cancel a scheduled shift
    Cancel { instance_id: i64 },
    /// List open swaps
    Swaps,
    /// Cover an open swap
    Claim { swap_id: i64, instance_id: i64 },
    /// Print the SQL the hosted database needs
    Migrations,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_claim() {
        let cli = CliConfig::try_parse_from(["roster", "-v", "claim", "4", "12"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, "roster.toml");
        assert!(matches!(
            cli.command,
            Command::Claim {
                swap_id: 4,
                instance_id: 12
            }
        ));
    }

    #[test]
    fn test_parse_routine_date() {
        let cli =
            CliConfig::try_parse_from(["roster", "routine", "--date", "2024-05-01"]).unwrap();
        match cli.command {
            Command::Routine { date } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(CliConfig::try_parse_from(["roster", "routine", "--date", "tomorrow"]).is_err());
    }
}
