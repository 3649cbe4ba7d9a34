//! Slash command routing table
//!
//! Maps each of the bot's slash command names (`/help`, `/add_deadline`,
//! `/list_deadlines`, `/remove_deadline`, `/set_group`) to the handler that
//! serves it. `DeadlineHandler` owns four names, so it appears four times.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Sorted command name listing for startup logs
//! - 1.0.0: Initial implementation for handler dispatch

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::SlashCommandHandler;

/// Command name -> handler
///
/// ```ignore
/// let mut registry = CommandRegistry::new();
/// for handler in create_all_handlers() {
///     registry.register(handler);
/// }
/// if let Some(handler) = registry.get("add_deadline") {
///     handler.handle(ctx, serenity_ctx, command).await?;
/// }
/// ```
#[derive(Clone, Default)]
pub struct CommandRegistry {
    routes: HashMap<&'static str, Arc<dyn SlashCommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every name the handler declares to it; a later handler wins on
    /// a shared name
    pub fn register(&mut self, handler: Arc<dyn SlashCommandHandler>) {
        for name in handler.command_names() {
            self.routes.insert(name, Arc::clone(&handler));
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SlashCommandHandler>> {
        self.routes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Routed command names, not distinct handlers
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routed command names in alphabetical order
    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.routes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
