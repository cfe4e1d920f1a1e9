// src/cli.rs
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use gym_coach_lib::TargetGroup;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plans a daily gym session and tracks what you finished", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print tabular output as CSV instead of a table
    #[arg(long, global = true)]
    pub export_csv: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetGroupCli {
    Back,
    Shoulder,
    Chest,
    Abs,
    Cardio,
}

impl From<TargetGroupCli> for TargetGroup {
    fn from(value: TargetGroupCli) -> Self {
        match value {
            TargetGroupCli::Back => TargetGroup::Back,
            TargetGroupCli::Shoulder => TargetGroup::Shoulder,
            TargetGroupCli::Chest => TargetGroup::Chest,
            TargetGroupCli::Abs => TargetGroup::Abs,
            TargetGroupCli::Cardio => TargetGroup::Cardio,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's recommended exercises and progress
    Plan,
    /// Mark an exercise from today's plan as done
    Done {
        /// Exercise name (e.g., "Lat Pulldown")
        exercise: String,
        /// Weight used in kg; left blank it is recorded as N/A
        #[arg(short, long)]
        weight: Option<String>,
    },
    /// Undo today's logged plan exercises and start the day over
    ResetToday,
    /// Delete one log entry by its timestamp (see `history`)
    Delete {
        timestamp: String,
    },
    /// Show logged exercises, newest first
    History {
        /// Only entries for this exercise
        #[arg(short, long)]
        exercise: Option<String>,
        /// Show only the last N entries
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Browse the exercise catalog
    Catalog {
        /// Filter by target group
        #[arg(short, long, value_enum)]
        group: Option<TargetGroupCli>,
    },
    /// Posture correction drills to do at home
    Drills,
    /// Show or edit your profile
    Profile {
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Age in years
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        occupation: Option<String>,
    },
    /// Ask the AI coach for a review of your recent training
    Coach,
    /// Chat with the AI coach (type /quit to leave)
    Chat,
    /// Erase all stored data and start fresh
    ResetAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the path to the database file
    DbPath,
    /// Set the table header color (e.g., Green, Cyan)
    SetHeaderColor {
        color: String,
    },
    /// Generate shell completion script
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
