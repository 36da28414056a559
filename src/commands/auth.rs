use clap::Args;

use todo_sharer_core::Credentials;

use crate::session::{Session, SessionError};

#[derive(Args)]
pub struct LoginArgs {
    /// Email address to sign in with
    pub email: String,

    /// Display name shown to collaborators
    #[arg(long)]
    pub name: Option<String>,

    /// Avatar URL
    #[arg(long)]
    pub photo: Option<String>,
}

impl LoginArgs {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("Invalid email address: {}", self.email).into());
        }

        let user = session
            .identity()
            .sign_in(Credentials {
                email: email.to_string(),
                display_name: self.name.clone(),
                photo_url: self.photo.clone(),
            })
            .await?;
        println!("Signed in as {}", user);
        Ok(())
    }
}

pub async fn logout(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let signed_in = session.identity().current_user().borrow().clone();
    match signed_in {
        Some(user) => {
            session.identity().sign_out().await?;
            println!("Signed out {}", user.email);
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

pub fn whoami(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let signed_in = session.identity().current_user().borrow().clone();
    let user = signed_in.ok_or(SessionError::NotSignedIn)?;
    println!("{}", user);
    println!("  uid: {}", user.uid);
    if let Some(photo) = &user.photo_url {
        println!("  photo: {}", photo);
    }
    Ok(())
}
