//! # Deadline Commands
//!
//! Create, list and remove deadlines; pick the broadcast channel.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;

const FILTER_CHOICES: &[(&str, &str)] = &[
    ("Active", "active"),
    ("Expired", "expired"),
    ("All", "all"),
];

pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![
        create_add_deadline_command(),
        create_list_deadlines_command(),
        create_remove_deadline_command(),
        create_set_group_command(),
    ]
}

fn create_add_deadline_command() -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name("add_deadline")
        .description("Add a personal or shared deadline")
        .create_option(|option| {
            option
                .name("private")
                .description("Personal deadline visible only to you")
                .kind(CommandOptionType::Boolean)
                .required(true)
        })
        .create_option(|option| {
            option
                .name("subject")
                .description("Course or subject")
                .kind(CommandOptionType::String)
                .required(true)
                .min_length(1)
                .max_length(200)
        })
        .create_option(|option| {
            option
                .name("title")
                .description("Task title")
                .kind(CommandOptionType::String)
                .required(true)
                .min_length(1)
                .max_length(200)
        })
        .create_option(|option| {
            option
                .name("due")
                .description("Due date: YYYY-MM-DD HH:MM, or YYYY-MM-DD for end of day")
                .kind(CommandOptionType::String)
                .required(true)
        })
        .create_option(|option| {
            option
                .name("description")
                .description("Optional details")
                .kind(CommandOptionType::String)
                .required(false)
                .max_length(1000)
        });
    command
}

fn create_list_deadlines_command() -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name("list_deadlines")
        .description("List the deadlines you can see")
        .create_option(|option| {
            option
                .name("filter")
                .description("Which deadlines to show (default: active)")
                .kind(CommandOptionType::String)
                .required(false);
            for (name, value) in FILTER_CHOICES {
                option.add_string_choice(name, value);
            }
            option
        });
    command
}

fn create_remove_deadline_command() -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name("remove_deadline")
        .description("Remove a deadline and its reminders")
        .create_option(|option| {
            option
                .name("id")
                .description("Deadline ID from /list_deadlines")
                .kind(CommandOptionType::Integer)
                .required(true)
                .min_int_value(1)
        });
    command
}

fn create_set_group_command() -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name("set_group")
        .description("Send shared reminders to this channel")
        .dm_permission(false);
    command
}
