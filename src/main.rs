use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use todo_list::config::Config;
use todo_list::menu::Menu;
use todo_list::{report, LoadOutcome, Priority, TaskFilter, TaskStore};

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Todo List Manager - prioritised tasks saved to a JSON file")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(long, global = true)]
    debug: bool,
    /// Task file to use (default: ./todos.json)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,
    /// Use the per-user task file in the data directory
    #[arg(long, global = true)]
    global: bool,
}

#[derive(Subcommand)]
enum Commands {
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
    },
    List {
        #[arg(long, conflicts_with = "completed")]
        pending: bool,
        #[arg(long)]
        completed: bool,
        #[arg(short, long)]
        priority: Option<Priority>,
    },
    Show { id: u32 },
    Done { id: u32 },
    Undo { id: u32 },
    Remove {
        id: u32,
        #[arg(short, long)]
        yes: bool,
    },
    Stats,
    /// Interactive menu (default)
    Menu,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let work_dir = env::current_dir()?;
    let config = Config::resolve(cli.file, cli.global, &work_dir)?;
    log::debug!("using task file {}", config.file.display());

    let mut store = TaskStore::open(&config.file);
    if let LoadOutcome::Recovered { backup, reason } = store.load_outcome() {
        eprintln!("⚠️  Could not load tasks ({}). Starting with an empty list.", reason);
        if let Some(backup) = backup {
            eprintln!("   The old file was copied to {}", backup.display());
        }
    }

    let mut stdout = io::stdout().lock();
    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Add { title, description, priority } => {
            let task = store.add(&title, &description, priority)?;
            println!("✅ Added task #{}: {}", task.id(), task);
            store.save()?;
        }
        Commands::List { pending, completed, priority } => {
            let (heading, mut filter) = if pending {
                ("Pending Tasks", TaskFilter::pending())
            } else if completed {
                ("Completed Tasks", TaskFilter::completed())
            } else {
                ("All Tasks", TaskFilter::all())
            };
            filter.priority = priority;
            report::write_tasks(&mut stdout, heading, &store.list(&filter))?;
        }
        Commands::Show { id } => {
            report::write_task_detail(&mut stdout, store.get(id)?)?;
        }
        Commands::Done { id } => {
            let task = store.mark_complete(id)?;
            println!("✓ Marked complete: {}", task.title());
            store.save()?;
        }
        Commands::Undo { id } => {
            let task = store.mark_incomplete(id)?;
            println!("○ Marked incomplete: {}", task.title());
            store.save()?;
        }
        Commands::Remove { id, yes } => {
            let title = store.get(id)?.title().to_string();
            if !yes && !confirm(&format!("Remove task {} '{}'? (y/N): ", id, title))? {
                println!("Task removal cancelled.");
                return Ok(());
            }
            store.remove(id)?;
            store.save()?;
            println!("🗑️  Removed task: {}", title);
        }
        Commands::Stats => {
            report::write_stats(&mut stdout, &store.stats())?;
        }
        Commands::Menu => {
            let stdin = io::stdin().lock();
            Menu::new(&mut store, stdin, &mut stdout).run()?;
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
