//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdin, stdout, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gym_coach_lib::{
    catalog, AppService, ChatRole, Completion, DailyPlan, ExerciseDefinition, LogEntry,
    ProfileUpdate, TrackerError, CATALOG, CORRECTION_DRILLS,
};

const PROGRESS_BAR_WIDTH: usize = 20;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    // --- Check for completion generation request FIRST ---
    let cli_args = cli::parse_args();
    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    // Last line of defence: anything that escapes a command is logged and the
    // user is pointed at the reset instead of being left with a stack trace.
    if let Err(e) = run(cli_args).await {
        error!(error = ?e, "Command failed");
        eprintln!("Error: {e:#}");
        eprintln!(
            "If your stored data is corrupted, `gym-coach reset-all` clears it and starts fresh."
        );
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli_args: cli::Cli) -> Result<()> {
    let export_csv = cli_args.export_csv;

    // Initialize the application service (loads config, connects to DB)
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    service.check_rollover(Local::now().date_naive());
    let header_color = service.config.theme.header();

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Plan => {
            let plan = service.daily_plan();
            if export_csv {
                print_plan_csv(&plan)?;
            } else {
                println!("{}", service.profile().summary());
                println!("{}\n", service.narrative());
                print_plan_table(&plan, service.completed_today(), header_color);
                print_progress(service.progress_percentage());
            }
        }
        cli::Commands::Done { exercise, weight } => {
            match service.mark_complete(&exercise, weight.as_deref(), Utc::now()) {
                Ok(Completion::Recorded(entry)) => {
                    println!(
                        "Logged '{}' ({}) at {}. ID: {}",
                        entry.exercise_name,
                        format_weight(&entry),
                        entry.display_time(),
                        entry.timestamp
                    );
                    print_progress(service.progress_percentage());
                }
                Ok(Completion::AlreadyDone) => {
                    println!("'{}' is already done for today.", exercise.trim());
                }
                Err(TrackerError::NotRecommended(name)) => {
                    let plan = service.daily_plan();
                    let names: Vec<&str> = plan.names().collect();
                    bail!(
                        "'{}' is not on today's plan. Today's exercises: {}",
                        name,
                        names.join(", ")
                    );
                }
                Err(e) => bail!("Error logging exercise: {}", e),
            }
        }
        cli::Commands::ResetToday => {
            let removed = service.reset_today();
            let noun = if removed == 1 { "entry" } else { "entries" };
            println!("Today's progress was reset ({removed} log {noun} removed).");
        }
        cli::Commands::Delete { timestamp } => match service.delete_log(&timestamp) {
            Ok(entry) => println!(
                "Deleted '{}' logged at {}.",
                entry.exercise_name,
                entry.display_time()
            ),
            Err(e) => bail!("Error deleting log entry: {}", e),
        },
        cli::Commands::History { exercise, limit } => {
            let entries: Vec<&LogEntry> = match exercise.as_deref() {
                Some(ident) => {
                    let name = catalog::find_exercise(ident)
                        .map(|e| e.name.to_string())
                        .unwrap_or_else(|| ident.trim().to_string());
                    service.logs().for_exercise(&name)
                }
                None => service.logs().entries().iter().rev().collect(),
            };
            let entries: Vec<&LogEntry> = entries.into_iter().take(limit).collect();
            if export_csv {
                print_history_csv(&entries)?;
            } else if entries.is_empty() {
                println!("No log entries found.");
            } else {
                print_history_table(&entries, header_color);
            }
        }
        cli::Commands::Catalog { group } => {
            let exercises: Vec<&ExerciseDefinition> = match group {
                Some(group) => catalog::exercises_in(group.into()).collect(),
                None => CATALOG.iter().collect(),
            };
            if export_csv {
                print_catalog_csv(&service, &exercises)?;
            } else {
                print_catalog_table(&service, &exercises, header_color);
            }
        }
        cli::Commands::Drills => {
            let mut table = new_table();
            table.set_header(vec![
                Cell::new("Drill").fg(header_color),
                Cell::new("How").fg(header_color),
                Cell::new("Tutorial").fg(header_color),
            ]);
            for drill in CORRECTION_DRILLS {
                table.add_row(vec![
                    Cell::new(drill.name),
                    Cell::new(drill.description),
                    Cell::new(drill.tutorial_url()),
                ]);
            }
            println!("{table}");
        }
        cli::Commands::Profile {
            height,
            weight,
            age,
            occupation,
        } => {
            let update = ProfileUpdate {
                height_cm: height,
                weight_kg: weight,
                age_years: age,
                occupation,
            };
            if !update.is_empty() {
                service.update_profile(update);
                println!("Profile updated.");
            }
            let profile = service.profile();
            let mut table = new_table();
            table.set_header(vec![
                Cell::new("Height (cm)").fg(header_color),
                Cell::new("Weight (kg)").fg(header_color),
                Cell::new("Age").fg(header_color),
                Cell::new("Occupation").fg(header_color),
                Cell::new("BMI").fg(header_color),
            ]);
            table.add_row(vec![
                Cell::new(profile.height_cm),
                Cell::new(profile.weight_kg),
                Cell::new(profile.age_years),
                Cell::new(&profile.occupation),
                Cell::new(profile.bmi_display()),
            ]);
            println!("{table}");
        }
        cli::Commands::Coach => {
            println!("Asking the coach...");
            match service.generate_coach_feedback().await {
                Some(note) => println!("\n{note}"),
                None => println!("A review is already being generated."),
            }
        }
        cli::Commands::Chat => run_chat(&mut service).await?,
        cli::Commands::ResetAll { yes } => {
            if !yes
                && !confirm(
                    "This erases your profile, all logs and today's progress. Continue? [y/N]: ",
                )?
            {
                println!("Nothing was changed.");
                return Ok(());
            }
            service.reset_all_data()?;
            println!("All data cleared.");
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::SetHeaderColor { color } => {
            service.set_header_color(&color)?;
            println!("Header color set to {}.", service.config.theme.header_color);
        }
    }

    Ok(())
}

/// Interactive chat. Each turn re-checks the date, since the session may sit
/// idle across midnight.
async fn run_chat(service: &mut AppService) -> Result<()> {
    for message in service.chat_transcript() {
        print_chat_message(message.role, &message.text);
    }
    if !service.assistant().is_configured() {
        println!("(No API key configured; the coach can't answer yet.)");
    }

    let stdin = stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("you> ");
        stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read from stdin")?;
        let input = line.trim();

        service.check_rollover(Local::now().date_naive());
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/plan" => {
                let plan = service.daily_plan();
                print_plan_table(&plan, service.completed_today(), service.config.theme.header());
                print_progress(service.progress_percentage());
            }
            "/coach" => {
                if let Some(note) = service.generate_coach_feedback().await {
                    print_chat_message(ChatRole::Model, &note);
                }
            }
            _ => {
                info!("Sending chat message");
                match service.send_chat_message(input).await {
                    Some(reply) => print_chat_message(ChatRole::Model, &reply),
                    None => println!("(The coach is still answering your last message.)"),
                }
            }
        }
    }
    Ok(())
}

fn print_chat_message(role: ChatRole, text: &str) {
    match role {
        ChatRole::User => println!("you> {text}"),
        ChatRole::Model => println!("coach> {text}\n"),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn format_weight(entry: &LogEntry) -> String {
    if entry.has_weight() {
        format!("{} kg", entry.weight)
    } else {
        entry.weight.clone()
    }
}

fn print_progress(percentage: u8) {
    let filled = usize::from(percentage) * PROGRESS_BAR_WIDTH / 100;
    println!(
        "Progress: [{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        percentage
    );
}

fn print_plan_table(plan: &DailyPlan, completed: &[String], header_color: Color) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("#").fg(header_color),
        Cell::new("Exercise").fg(header_color),
        Cell::new("Group").fg(header_color),
        Cell::new("Sets").fg(header_color),
        Cell::new("Min").fg(header_color),
        Cell::new("Focus").fg(header_color),
        Cell::new("Done").fg(header_color),
    ]);
    let total = plan.recommended.len();
    for (idx, ex) in plan.recommended.iter().enumerate() {
        let done = completed.iter().any(|c| c == ex.name);
        table.add_row(vec![
            Cell::new(format!("{} / {}", idx + 1, total)),
            Cell::new(ex.name),
            Cell::new(ex.target_group),
            Cell::new(ex.sets_scheme),
            Cell::new(ex.estimated_minutes),
            Cell::new(ex.focus_note),
            if done {
                Cell::new("✓").fg(Color::Green)
            } else {
                Cell::new("")
            },
        ]);
    }
    println!("{table}");
    println!("Estimated time: {} min", plan.total_minutes());
}

fn print_plan_csv(plan: &DailyPlan) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Exercise", "Group", "Sets", "Minutes", "Focus"])?;
    for ex in &plan.recommended {
        writer.write_record([
            ex.name,
            ex.target_group.to_string().as_str(),
            ex.sets_scheme,
            ex.estimated_minutes.to_string().as_str(),
            ex.focus_note,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_history_table(entries: &[&LogEntry], header_color: Color) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("When (Local)").fg(header_color),
        Cell::new("Exercise").fg(header_color),
        Cell::new("Weight").fg(header_color),
        Cell::new("ID").fg(header_color),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.display_time()),
            Cell::new(&entry.exercise_name),
            Cell::new(format_weight(entry)),
            Cell::new(&entry.timestamp),
        ]);
    }
    println!("{table}");
}

fn print_history_csv(entries: &[&LogEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Timestamp", "Exercise", "Weight_kg"])?;
    for entry in entries {
        writer.write_record([
            entry.timestamp.as_str(),
            entry.exercise_name.as_str(),
            entry.weight.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_catalog_table(
    service: &AppService,
    exercises: &[&ExerciseDefinition],
    header_color: Color,
) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Exercise").fg(header_color),
        Cell::new("Group").fg(header_color),
        Cell::new("Sets").fg(header_color),
        Cell::new("Min").fg(header_color),
        Cell::new("Focus").fg(header_color),
        Cell::new("Logged").fg(header_color),
        Cell::new("Last").fg(header_color),
    ]);
    for ex in exercises {
        let history = service.logs().for_exercise(ex.name);
        let last = history
            .first()
            .map(|e| format!("{} ({})", e.display_time(), format_weight(e)))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(ex.name),
            Cell::new(ex.target_group),
            Cell::new(ex.sets_scheme),
            Cell::new(ex.estimated_minutes),
            Cell::new(ex.focus_note),
            Cell::new(history.len()),
            Cell::new(last),
        ]);
    }
    println!("{table}");
}

fn print_catalog_csv(
    service: &AppService,
    exercises: &[&ExerciseDefinition],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Exercise", "Group", "Sets", "Minutes", "Focus", "Logged", "Media", "Tutorial",
    ])?;
    for ex in exercises {
        writer.write_record([
            ex.name,
            ex.target_group.to_string().as_str(),
            ex.sets_scheme,
            ex.estimated_minutes.to_string().as_str(),
            ex.focus_note,
            service.logs().for_exercise(ex.name).len().to_string().as_str(),
            ex.media_ref,
            ex.tutorial_url().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
