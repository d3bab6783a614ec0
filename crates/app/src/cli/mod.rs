use std::error::Error;

use clap::{Parser, Subcommand};
use trolley_app::{config::AppConfig, context::AppContext, observability};

mod cart;
mod output;
mod session;
mod watch;

#[derive(Debug, Parser)]
#[command(name = "trolley", about = "Storefront cart client", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the cart
    Show,

    /// Add units of a variant
    Add(cart::AddArgs),

    /// Set a variant's quantity; zero removes it
    Set(cart::SetArgs),

    /// Remove a variant's line
    Remove(cart::RemoveArgs),

    /// Sign in with a customer access token and reconcile carts
    Login(session::LoginArgs),

    /// Sign out, keeping the cart
    Logout,

    /// Print the checkout URL once pending edits are confirmed
    Checkout,

    /// Keep the cart in sync until interrupted
    Watch,
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init(&self.config.logging).map_err(|error| report(&error))?;

        let context = AppContext::from_config(&self.config).map_err(|error| report(&error))?;

        context.store.mount().await;

        match self.command {
            Commands::Show => {
                output::cart(&context.store.view());

                Ok(())
            }
            Commands::Add(args) => cart::add(&context, args).await,
            Commands::Set(args) => cart::set(&context, args).await,
            Commands::Remove(args) => cart::remove(&context, args).await,
            Commands::Login(args) => session::login(&context, args).await,
            Commands::Logout => {
                session::logout(&context);

                Ok(())
            }
            Commands::Checkout => cart::checkout(&context).await,
            Commands::Watch => watch::run(&context).await,
        }
    }
}

/// An error and its chain of sources, on one line.
fn report(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
