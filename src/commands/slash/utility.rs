//! # Utility Commands
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use serenity::builder::CreateApplicationCommand;

pub fn create_commands() -> Vec<CreateApplicationCommand> {
    let mut help = CreateApplicationCommand::default();
    help.name("help")
        .description("How to use the deadline bot");
    vec![help]
}
