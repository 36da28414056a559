use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use todo_sharer_core::views::due_status;
use todo_sharer_core::{DueStatus, SortBy, Todo, TodoCounts};

use super::{confirm, OutputFormat};
use crate::session::{Session, SessionError};

#[derive(Args)]
pub struct TodoCommand {
    /// List ID or name (defaults to the first list)
    #[arg(long, short, global = true)]
    pub list: Option<String>,

    /// Only to-dos whose text contains this
    #[arg(long, short, global = true)]
    pub search: Option<String>,

    /// Hide completed to-dos
    #[arg(long, global = true, conflicts_with = "show_completed")]
    pub hide_completed: bool,

    /// Show completed to-dos even if the config hides them
    #[arg(long, global = true)]
    pub show_completed: bool,

    /// Sort by: order, dueDate or createdAt
    #[arg(long, global = true)]
    pub sort: Option<SortBy>,

    #[command(subcommand)]
    pub command: TodoSubcommand,
}

/// Positions are 1-based and count the to-dos `todo ls` shows with the
/// same filters.
#[derive(Subcommand)]
pub enum TodoSubcommand {
    /// Show the to-dos of a list
    Ls {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a to-do
    Add {
        /// What needs doing
        text: String,
    },

    /// Mark a to-do as completed
    Done {
        /// Position in the list
        position: usize,
    },

    /// Mark a to-do as not completed
    Undone {
        /// Position in the list
        position: usize,
    },

    /// Change the text of a to-do
    Edit {
        /// Position in the list
        position: usize,

        /// New text
        text: String,
    },

    /// Set or clear a due date
    Due {
        /// Position in the list
        position: usize,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(required_unless_present = "clear")]
        date: Option<String>,

        /// Remove the due date
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },

    /// Delete a to-do
    Rm {
        /// Position in the list
        position: usize,
    },

    /// Delete all completed to-dos
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Delete every to-do in the list
    ClearAll {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Move a to-do to another position
    Move {
        /// Current position
        from: usize,

        /// New position
        to: usize,
    },
}

#[derive(Serialize)]
struct TodoListing<'a> {
    list: &'a str,
    counts: TodoCounts,
    todos: Vec<Todo>,
}

impl TodoCommand {
    pub async fn run(&self, session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
        self.apply_view(session);
        let list = session.select_list(self.list.as_deref()).await?;

        match &self.command {
            TodoSubcommand::Ls { format } => {
                let store = session.store();
                let todos = store.todos();
                let counts = store.todo_counts();

                match format {
                    OutputFormat::Json => {
                        let listing = TodoListing {
                            list: &list.name,
                            counts,
                            todos,
                        };
                        println!("{}", serde_json::to_string_pretty(&listing)?);
                    }
                    OutputFormat::Text => {
                        let filtered = if store.is_filtered() { ", filtered" } else { "" };
                        println!(
                            "{} ({} active / {} total{})",
                            list.name, counts.active, counts.total, filtered
                        );
                        if todos.is_empty() {
                            println!("  No to-dos.");
                        }
                        let now = store.today();
                        for (index, todo) in todos.iter().enumerate() {
                            let flag = match due_status(todo, now) {
                                DueStatus::Overdue => "  overdue",
                                DueStatus::DueSoon => "  due soon",
                                DueStatus::None => "",
                            };
                            println!("{:>3}. {}{}", index + 1, todo, flag);
                        }
                    }
                }
                Ok(())
            }

            TodoSubcommand::Add { text } => {
                if text.trim().is_empty() {
                    return Err("To-do text cannot be empty".into());
                }
                let store = session.store();
                store.set_new_todo_text(text.as_str());
                store.add_todo().await;
                session.finish()?;
                println!("Added to {}: {}", list.name, text.trim());
                Ok(())
            }

            TodoSubcommand::Done { position } | TodoSubcommand::Undone { position } => {
                let completed = matches!(self.command, TodoSubcommand::Done { .. });
                let (_, todo) = session.visible_todo(*position)?;
                session
                    .store()
                    .toggle_todo_completion(&todo.id, completed)
                    .await;
                session.finish()?;
                let verb = if completed { "Completed" } else { "Reopened" };
                println!("{}: {}", verb, todo.text);
                Ok(())
            }

            TodoSubcommand::Edit { position, text } => {
                if text.trim().is_empty() {
                    return Err("To-do text cannot be empty".into());
                }
                let (_, todo) = session.visible_todo(*position)?;
                if todo.text == text.trim() {
                    println!("No changes.");
                    return Ok(());
                }

                let store = session.store();
                store.start_editing_todo(todo.id.as_str(), todo.text.as_str());
                store.set_editing_todo_text(text.as_str());
                store.save_edited_todo_text().await;
                session.finish().map_err(Into::into)
            }

            TodoSubcommand::Due {
                position,
                date,
                clear,
            } => {
                let due_date = match date {
                    Some(date) if !clear => Some(parse_due_date(date)?),
                    _ => None,
                };
                let (_, todo) = session.visible_todo(*position)?;
                session.store().update_due_date(&todo.id, due_date).await;
                session.finish().map_err(Into::into)
            }

            TodoSubcommand::Rm { position } => {
                let (_, todo) = session.visible_todo(*position)?;
                let store = session.store();
                store.start_delete_todo(todo.id.as_str());
                store.confirm_delete_todo().await;
                session.finish().map_err(Into::into)
            }

            TodoSubcommand::Clear { force } => {
                let store = session.store();
                store.start_clear_completed();
                if !store.snapshot().confirming_clear_completed {
                    return session.finish().map_err(Into::into);
                }

                if !force && !confirm(&format!("Delete completed to-dos in '{}'?", list.name))? {
                    store.cancel_clear_completed();
                    println!("Deletion cancelled.");
                    return Ok(());
                }
                store.confirm_clear_completed().await;
                session.finish().map_err(Into::into)
            }

            TodoSubcommand::ClearAll { force } => {
                let total = session.store().todo_counts().total;
                if total == 0 {
                    println!("No to-dos to delete.");
                    return Ok(());
                }
                if !force
                    && !confirm(&format!("Delete all {} to-dos in '{}'?", total, list.name))?
                {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
                session.store().delete_all_todos().await;
                session.finish().map_err(Into::into)
            }

            TodoSubcommand::Move { from, to } => {
                let (from_index, todo) = session.visible_todo(*from)?;
                let (to_index, _) = session.visible_todo(*to)?;
                if from_index == to_index {
                    println!("Nothing to move.");
                    return Ok(());
                }

                session.store().drop_todo(from_index, to_index).await;
                session.finish()?;
                println!("Moved '{}' to position {}", todo.text, to);
                Ok(())
            }
        }
    }

    /// Applies the view flags before the list is selected, so the settled
    /// items already reflect the requested sort.
    fn apply_view(&self, session: &Session) {
        let store = session.store();
        if let Some(sort) = self.sort {
            store.set_sort_by(sort);
        }
        if self.hide_completed {
            store.set_hide_completed(true);
        } else if self.show_completed {
            store.set_hide_completed(false);
        }
        if let Some(term) = &self.search {
            store.set_search_term(term.as_str());
        }
    }
}

/// Parses a due date given as a calendar day (midnight UTC) or RFC 3339.
fn parse_due_date(value: &str) -> Result<DateTime<Utc>, SessionError> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SessionError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_due_date() {
        assert_eq!(
            parse_due_date("2025-03-09").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_due_date("2025-03-09T15:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 9, 13, 30, 0).unwrap()
        );
        assert_eq!(
            parse_due_date("next week").unwrap_err().to_string(),
            "Invalid date: next week (expected YYYY-MM-DD)"
        );
    }
}
