use clap::Parser;
use volunteer_roster::adapters::{storage::LocalStorage, supabase::SupabaseStore};
use volunteer_roster::config::cli::{CliConfig, Command};
use volunteer_roster::core::{Scheduler, SessionManager};
use volunteer_roster::domain::model::{InstanceId, ShiftStatus, SwapId};
use volunteer_roster::utils::error::{ErrorSeverity, Result};
use volunteer_roster::utils::{logger, validation::Validate};
use volunteer_roster::RosterConfig;

type SupabaseScheduler = Scheduler<SupabaseStore, SupabaseStore, SupabaseStore>;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    if let Command::Migrations = cli.command {
        for statement in SupabaseStore::migrations() {
            println!("{}", statement.trim());
            println!();
        }
        return Ok(());
    }

    let config = match RosterConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file is valid TOML or unset it to use SUPABASE_* variables");
            std::process::exit(1);
        }
    };

    logger::init_cli_logger(cli.verbose, &config.logging());
    tracing::debug!("CLI args: {:?}", cli);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let store = SupabaseStore::new(config.supabase_url(), config.anon_key(), config.timeout())?
        .with_utc_offset(config.utc_offset_minutes());
    let scheduler = Scheduler::new(store.clone(), store.clone(), store);
    let sessions = SessionManager::new(
        LocalStorage::new(config.session_directory().to_string()),
        config.session_file(),
    );

    if let Err(e) = run(cli.command, &scheduler, &sessions).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2, // refresh and retry
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(
    command: Command,
    scheduler: &SupabaseScheduler,
    sessions: &SessionManager<LocalStorage>,
) -> Result<()> {
    match command {
        Command::Login { roll_number } => {
            let session = sessions.login(scheduler.registry(), &roll_number).await?;
            println!("👋 Welcome, {} ({})", session.name, session.position);
        }
        Command::Logout => {
            sessions.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => {
            let session = sessions.current().await?;
            println!("{} ({}) [{}]", session.name, session.position, session.volunteer_id);
        }
        Command::Routine { date } => {
            let routine = scheduler.daily_routine(date).await?;
            if routine.is_empty() {
                println!("No shifts scheduled.");
            }
            for entry in routine {
                let shift = &entry.instance;
                let who = entry
                    .assignee
                    .as_ref()
                    .map(|a| format!("{} ({})", a.name, a.position))
                    .unwrap_or_else(|| shift.assigned_volunteer_id.to_string());
                let note = if shift.status == ShiftStatus::SwapRequested {
                    "  [looking for a replacement]"
                } else {
                    ""
                };
                println!(
                    "#{:<5} {} {:<20} {:<30} {:<8}{}",
                    shift.id, shift.date, shift.location, who, shift.attendance_status, note
                );
            }
        }
        Command::CheckIn { instance_id } => {
            let session = sessions.current().await?;
            let outcome = scheduler
                .for_session(&session)
                .check_in(InstanceId(instance_id))
                .await?;
            println!(
                "✅ Checked in at {}. Total attendance: {}",
                outcome.instance.location, outcome.total_attendance
            );
        }
        Command::MarkAbsent { instance_id } => {
            let shift = scheduler.mark_absent(InstanceId(instance_id)).await?;
            println!("Marked shift #{} at {} absent.", shift.id, shift.location);
        }
        Command::Drop { instance_id } => {
            let session = sessions.current().await?;
            let swap = scheduler
                .for_session(&session)
                .drop_shift(InstanceId(instance_id))
                .await?;
            println!("Swap #{} opened. Your shift is now in the marketplace.", swap.id);
        }
        Command::Cancel { instance_id } => {
            let shift = scheduler.cancel_shift(InstanceId(instance_id)).await?;
            println!("Shift #{} at {} cancelled.", shift.id, shift.location);
        }
        Command::Swaps => {
            let session = sessions.current().await.ok();
            let swaps = scheduler.list_open_swaps().await?;
            if swaps.is_empty() {
                println!("🙌 All shifts are covered right now!");
            }
            for swap in swaps {
                let own = session
                    .as_ref()
                    .is_some_and(|s| s.volunteer_id == swap.requester.id);
                println!(
                    "swap #{:<5} shift #{:<5} {} {:<20} covering for {} ({}){}",
                    swap.swap_id,
                    swap.instance.id,
                    swap.instance.date,
                    swap.instance.location,
                    swap.requester.name,
                    swap.requester.position,
                    if own { "  [your dropped shift]" } else { "" }
                );
            }
        }
        Command::Claim {
            swap_id,
            instance_id,
        } => {
            let session = sessions.current().await?;
            let outcome = scheduler
                .for_session(&session)
                .claim(SwapId(swap_id), InstanceId(instance_id))
                .await?;
            println!(
                "🎉 Shift at {} on {} is yours. Thank you for stepping up!",
                outcome.instance.location, outcome.instance.date
            );
        }
        Command::Migrations => {}
    }
    Ok(())
}
