use clap::{Args, Subcommand};

use todo_sharer_core::List;

use super::{confirm, OutputFormat};
use crate::session::Session;

#[derive(Args)]
pub struct ListCommand {
    #[command(subcommand)]
    pub command: ListSubcommand,
}

#[derive(Subcommand)]
pub enum ListSubcommand {
    /// Show the lists you own or that are shared with you
    Ls {
        /// Only lists whose name contains this text
        #[arg(long, short)]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a new list
    Create {
        /// Name of the list
        name: String,
    },

    /// Rename a list
    Rename {
        /// List ID or name
        list: String,

        /// New name
        name: String,
    },

    /// Delete a list and all of its to-dos
    Delete {
        /// List ID or name
        list: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Share a list with another user
    Share {
        /// List ID or name
        list: String,

        /// Email address of the user to share with
        email: String,
    },

    /// Stop sharing a list with a collaborator
    Unshare {
        /// List ID or name
        list: String,

        /// Collaborator email or uid
        who: String,
    },
}

impl ListCommand {
    pub async fn run(&self, session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ListSubcommand::Ls { search, format } => {
                session.settle().await?;
                let user = session.require_user()?;
                let store = session.store();
                if let Some(term) = search {
                    store.set_list_search_term(term.as_str());
                }

                let lists = store.filtered_lists();
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&lists)?);
                    }
                    OutputFormat::Text => {
                        if lists.is_empty() {
                            println!("No lists found.");
                            return Ok(());
                        }
                        let selected = store.selected_list_id();
                        for list in &lists {
                            let marker = if selected.as_deref() == Some(list.id.as_str()) {
                                "*"
                            } else {
                                " "
                            };
                            println!("{} {}", marker, describe(list, &user.uid));
                            println!("    id: {}", list.id);
                            if let Some(collaborators) = &list.collaborators {
                                for collaborator in collaborators {
                                    println!("    shared with {}", collaborator);
                                }
                            }
                        }
                    }
                }
                Ok(())
            }

            ListSubcommand::Create { name } => {
                if name.trim().is_empty() {
                    return Err("List name cannot be empty".into());
                }
                session.settle().await?;
                session.require_user()?;

                let store = session.store();
                store.set_new_list_text(name.as_str());
                store.add_list().await;
                session.finish()?;
                println!("Created list: {}", name.trim());
                Ok(())
            }

            ListSubcommand::Rename { list, name } => {
                if name.trim().is_empty() {
                    return Err("List name cannot be empty".into());
                }
                let target = session.select_list(Some(list.as_str())).await?;

                let store = session.store();
                store.start_edit_list();
                store.set_editing_list_text(name.as_str());
                store.save_edit_list().await;
                session.finish()?;
                println!("Renamed list '{}' to '{}'", target.name, name.trim());
                Ok(())
            }

            ListSubcommand::Delete { list, force } => {
                let target = session.select_list(Some(list.as_str())).await?;

                if !force && !confirm(&format!("Delete list '{}' and all of its to-dos?", target.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let store = session.store();
                store.start_delete_list();
                store.confirm_delete_list().await;
                session.finish()?;
                Ok(())
            }

            ListSubcommand::Share { list, email } => {
                session.select_list(Some(list.as_str())).await?;

                let store = session.store();
                store.start_sharing();
                store.set_share_email(email.as_str());
                store.share_list().await;
                session.finish()?;
                Ok(())
            }

            ListSubcommand::Unshare { list, who } => {
                session.select_list(Some(list.as_str())).await?;
                session.store().unshare_list(who).await;
                session.finish()?;
                Ok(())
            }
        }
    }
}

/// One-line summary of a list from `uid`'s point of view.
fn describe(list: &List, uid: &str) -> String {
    let collaborators = list.collaborator_uids().count();
    if list.is_owned_by(uid) {
        match collaborators {
            0 => list.name.clone(),
            n => format!("{} (shared with {})", list.name, n),
        }
    } else {
        format!("{} (owned by {})", list.name, list.owner_email)
    }
}
