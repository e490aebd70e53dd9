use crate::store::TaskStats;
use crate::task::{Priority, Task};
use std::io::{self, Write};

pub fn write_tasks<W: Write>(out: &mut W, heading: &str, tasks: &[&Task]) -> io::Result<()> {
    writeln!(out, "\n{}", heading)?;
    writeln!(out, "{}", "-".repeat(heading.chars().count()))?;
    if tasks.is_empty() {
        writeln!(out, "No tasks found.")?;
        return Ok(());
    }
    for task in tasks {
        writeln!(out, "{:2}. {} (Created: {})", task.id(), task, task.created_at().format("%Y-%m-%d"))?;
        if !task.description().is_empty() {
            writeln!(out, "    Description: {}", task.description())?;
        }
    }
    Ok(())
}

pub fn write_task_detail<W: Write>(out: &mut W, task: &Task) -> io::Result<()> {
    writeln!(out, "TASK #{}: {}", task.id(), task.title())?;
    writeln!(out, "Priority:    {}", task.priority())?;
    writeln!(out, "Status:      {}", if task.is_completed() { "completed" } else { "pending" })?;
    writeln!(out, "Created:     {}", task.created_at().format("%Y-%m-%d %H:%M:%S"))?;
    if let Some(done) = task.completed_at() {
        writeln!(out, "Completed:   {}", done.format("%Y-%m-%d %H:%M:%S"))?;
    }
    if !task.description().is_empty() {
        writeln!(out, "\n{}", task.description())?;
    }
    Ok(())
}

pub fn write_stats<W: Write>(out: &mut W, stats: &TaskStats) -> io::Result<()> {
    writeln!(out, "\n{}", "=".repeat(30))?;
    writeln!(out, "        TASK STATISTICS")?;
    writeln!(out, "{}", "=".repeat(30))?;
    writeln!(out, "Total Tasks:      {}", stats.total)?;
    writeln!(out, "Completed:        {}", stats.completed)?;
    writeln!(out, "Pending:          {}", stats.pending)?;
    writeln!(out, "\nBy Priority:")?;
    for priority in Priority::ALL {
        let label = format!("{} ({}):", priority.label(), priority.symbol());
        writeln!(out, "  {:<16}{}", label, stats.count(priority))?;
    }
    if let Some(rate) = stats.completion_rate() {
        writeln!(out, "\nCompletion Rate:  {:.1}%", rate)?;
    }
    Ok(())
}
