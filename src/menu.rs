use crate::report;
use crate::store::{TaskFilter, TaskStore};
use crate::task::Priority;
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    EndOfInput,
}

/// The numbered interactive menu. Reads commands from `input` until `0` or end
/// of input, saving the store on the way out.
pub struct Menu<'a, R, W> {
    store: &'a mut TaskStore,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(store: &'a mut TaskStore, input: R, out: W) -> Self {
        Self { store, input, out }
    }

    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.out, "Welcome to Todo List Manager!")?;
        writeln!(self.out, "Tasks are stored in {}", self.store.path().display())?;

        loop {
            self.print_menu()?;
            let Some(choice) = self.prompt("\nEnter your choice (0-9): ")? else {
                return self.exit_on_end_of_input();
            };
            let step = match choice.as_str() {
                "0" => {
                    self.save()?;
                    writeln!(self.out, "Goodbye!")?;
                    return Ok(());
                }
                "1" => self.add_task()?,
                "2" => self.show("All Tasks", TaskFilter::all())?,
                "3" => self.show("Pending Tasks", TaskFilter::pending())?,
                "4" => self.show("Completed Tasks", TaskFilter::completed())?,
                "5" => self.set_completed(true)?,
                "6" => self.set_completed(false)?,
                "7" => self.remove_task()?,
                "8" => {
                    report::write_stats(&mut self.out, &self.store.stats())?;
                    Step::Continue
                }
                "9" => {
                    self.save()?;
                    Step::Continue
                }
                _ => {
                    writeln!(self.out, "Invalid choice. Please try again.")?;
                    Step::Continue
                }
            };
            if step == Step::EndOfInput {
                return self.exit_on_end_of_input();
            }
        }
    }

    /// Input ran out, possibly in the middle of a prompt: keep what was done.
    fn exit_on_end_of_input(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n\nSaving tasks and exiting...")?;
        self.save()
    }

    fn print_menu(&mut self) -> io::Result<()> {
        let rule = "=".repeat(50);
        writeln!(self.out, "\n{}", rule)?;
        writeln!(self.out, "                TODO LIST MANAGER")?;
        writeln!(self.out, "{}", rule)?;
        for line in [
            "1. Add Task",
            "2. View All Tasks",
            "3. View Pending Tasks",
            "4. View Completed Tasks",
            "5. Mark Task Complete",
            "6. Mark Task Incomplete",
            "7. Remove Task",
            "8. Task Statistics",
            "9. Save Tasks",
            "0. Exit",
        ] {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "{}", rule)
    }

    /// Prints `message` and reads one trimmed line; `None` at end of input.
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.out, "{}", message)?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn save(&mut self) -> io::Result<()> {
        match self.store.save() {
            Ok(()) => writeln!(self.out, "✓ Tasks saved successfully!"),
            Err(e) => writeln!(self.out, "✗ Failed to save tasks: {}", e),
        }
    }

    fn show(&mut self, heading: &str, filter: TaskFilter) -> io::Result<Step> {
        let tasks = self.store.list(&filter);
        report::write_tasks(&mut self.out, heading, &tasks)?;
        Ok(Step::Continue)
    }

    fn add_task(&mut self) -> io::Result<Step> {
        let Some(title) = self.prompt("Enter task title: ")? else { return Ok(Step::EndOfInput) };
        if title.is_empty() {
            writeln!(self.out, "Task title cannot be empty.")?;
            return Ok(Step::Continue);
        }
        let Some(description) = self.prompt("Enter description (optional): ")? else { return Ok(Step::EndOfInput) };
        let Some(priority) = self.read_priority()? else { return Ok(Step::EndOfInput) };

        match self.store.add(&title, &description, priority) {
            Ok(task) => writeln!(self.out, "✓ Added task: {}", task)?,
            Err(e) => writeln!(self.out, "✗ {}", e)?,
        }
        Ok(Step::Continue)
    }

    fn read_priority(&mut self) -> io::Result<Option<Priority>> {
        writeln!(self.out, "\nPriority levels:")?;
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            writeln!(self.out, "{}. {}", u8::from(priority), priority)?;
        }
        loop {
            let Some(raw) = self.prompt("Enter priority (1-3): ")? else { return Ok(None) };
            match raw.parse::<Priority>() {
                Ok(priority) => return Ok(Some(priority)),
                Err(_) => writeln!(self.out, "Please enter 1, 2, or 3.")?,
            }
        }
    }

    /// Asks until the user names an existing task id.
    fn read_task_id(&mut self, message: &str) -> io::Result<Option<u32>> {
        loop {
            let Some(raw) = self.prompt(message)? else { return Ok(None) };
            match raw.parse::<u32>() {
                Ok(id) if self.store.get(id).is_ok() => return Ok(Some(id)),
                Ok(_) => writeln!(self.out, "Task ID not found. Please try again.")?,
                Err(_) => writeln!(self.out, "Please enter a valid number.")?,
            }
        }
    }

    fn set_completed(&mut self, completed: bool) -> io::Result<Step> {
        let (heading, filter, verb, nothing_to_do) = if completed {
            ("Pending Tasks", TaskFilter::pending(), "complete", "No pending tasks to complete.")
        } else {
            (
                "Completed Tasks",
                TaskFilter::completed(),
                "incomplete",
                "No completed tasks to mark incomplete.",
            )
        };
        if self.store.list(&filter).is_empty() {
            writeln!(self.out, "{}", nothing_to_do)?;
            return Ok(Step::Continue);
        }
        self.show(heading, filter)?;
        let Some(id) = self.read_task_id(&format!("Enter task ID to mark {}: ", verb))? else {
            return Ok(Step::EndOfInput);
        };
        let result = if completed { self.store.mark_complete(id) } else { self.store.mark_incomplete(id) };
        match result {
            Ok(task) => {
                let mark = if completed { "✓" } else { "○" };
                writeln!(self.out, "{} Marked {}: {}", mark, verb, task.title())?
            }
            Err(e) => writeln!(self.out, "✗ {}", e)?,
        }
        Ok(Step::Continue)
    }

    fn remove_task(&mut self) -> io::Result<Step> {
        if self.store.is_empty() {
            writeln!(self.out, "No tasks to remove.")?;
            return Ok(Step::Continue);
        }
        self.show("All Tasks", TaskFilter::all())?;
        let Some(id) = self.read_task_id("Enter task ID to remove: ")? else { return Ok(Step::EndOfInput) };
        let Some(confirm) = self.prompt(&format!("Are you sure you want to remove task {}? (y/N): ", id))? else {
            return Ok(Step::EndOfInput);
        };
        if !confirm.eq_ignore_ascii_case("y") {
            writeln!(self.out, "Task removal cancelled.")?;
            return Ok(Step::Continue);
        }
        match self.store.remove(id) {
            Ok(task) => writeln!(self.out, "✓ Removed task: {}", task.title())?,
            Err(e) => writeln!(self.out, "✗ {}", e)?,
        }
        Ok(Step::Continue)
    }
}
