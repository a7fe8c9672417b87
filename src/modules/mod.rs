use crate::commands::{self, Command};
use crate::database::DatabaseHandle;
use crate::error::{module_error, BotResult, Error};
use crate::router::PLAY_COMMAND;
use crate::shortcut::{ShortcutCommand, ShortcutRegistry};
use crate::translator::Translator;
use crate::voicelink::Voicelink;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Module trait that all feature modules must implement
pub trait Module: Send + Sync {
    /// Get the name of the module
    fn name(&self) -> &'static str;

    /// Add the module's commands and shortcuts to the app
    fn register(&self, app: &mut App) -> BotResult<()>;
}

/// Everything modules register into, plus the services they may capture
pub struct App {
    commands: Vec<Command>,
    shortcuts: ShortcutRegistry,
    voicelink: Arc<dyn Voicelink>,
    database: DatabaseHandle,
    translator: Option<Arc<Translator>>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("command_count", &self.commands.len())
            .field("shortcuts", &self.shortcuts)
            .field("has_translator", &self.translator.is_some())
            .finish()
    }
}

impl App {
    pub fn new(voicelink: Arc<dyn Voicelink>, database: DatabaseHandle) -> Self {
        Self {
            commands: Vec::new(),
            shortcuts: ShortcutRegistry::new(),
            voicelink,
            database,
            translator: None,
        }
    }

    /// Attach the translator used for command localizations
    pub fn set_translator(&mut self, translator: Arc<Translator>) {
        info!("Loaded Translator");
        self.translator = Some(translator);
    }

    pub fn translator(&self) -> Option<&Arc<Translator>> {
        self.translator.as_ref()
    }

    pub fn voicelink(&self) -> Arc<dyn Voicelink> {
        Arc::clone(&self.voicelink)
    }

    pub fn database(&self) -> DatabaseHandle {
        self.database.clone()
    }

    pub fn add_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn add_shortcut(&mut self, name: &str, command: Arc<dyn ShortcutCommand>) {
        self.shortcuts.insert(name, command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut Vec<Command> {
        &mut self.commands
    }

    pub fn shortcuts(&self) -> &ShortcutRegistry {
        &self.shortcuts
    }

    /// Split into the command list and the shortcut registry
    pub fn into_parts(self) -> (Vec<Command>, ShortcutRegistry) {
        (self.commands, self.shortcuts)
    }

    // Empty app sharing this app's services; modules register into one of
    // these so a failing module leaves nothing behind.
    fn staging(&self) -> App {
        App {
            commands: Vec::new(),
            shortcuts: ShortcutRegistry::new(),
            voicelink: Arc::clone(&self.voicelink),
            database: self.database.clone(),
            translator: self.translator.clone(),
        }
    }

    fn absorb(&mut self, staged: App) -> BotResult<()> {
        let existing: HashSet<&str> = self.commands.iter().map(|c| c.name.as_str()).collect();
        if let Some(duplicate) = staged
            .commands
            .iter()
            .find(|c| existing.contains(c.name.as_str()))
        {
            return Err(module_error(&format!(
                "Command '{}' is already registered",
                duplicate.name
            )));
        }
        if let Some(duplicate) = staged.shortcuts.names().find(|n| self.shortcuts.contains(n)) {
            return Err(module_error(&format!(
                "Shortcut '{}' is already registered",
                duplicate
            )));
        }

        let (commands, shortcuts) = staged.into_parts();
        self.commands.extend(commands);
        for name in shortcuts.names() {
            if let Some(command) = shortcuts.get(name) {
                self.shortcuts.insert(name, command);
            }
        }
        Ok(())
    }
}

/// Outcome of loading the registry
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<&'static str>,
    pub failed: Vec<(&'static str, Error)>,
}

/// Registry of all feature modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.modules.iter().map(|m| m.name()).collect();
        f.debug_struct("ModuleRegistry")
            .field("modules", &names)
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The modules shipped with the bot
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(GeneralModule);
        registry.register(MusicModule);
        registry.register(SettingsModule);
        registry
    }

    /// Register a module
    pub fn register<T: Module + 'static>(&mut self, module: T) {
        self.modules.push(Box::new(module));
    }

    /// Load every module into `app`.
    ///
    /// A module that fails is logged and skipped; the rest still load.
    pub fn load_all(&self, app: &mut App) -> LoadReport {
        let mut report = LoadReport::default();

        for module in &self.modules {
            let mut staged = app.staging();
            let result = module
                .register(&mut staged)
                .and_then(|()| app.absorb(staged));

            match result {
                Ok(()) => {
                    info!("Loaded {}", module.name());
                    report.loaded.push(module.name());
                }
                Err(e) => {
                    // Log error but continue with other modules
                    error!("Error loading {} module: {:?}", module.name(), e);
                    report.failed.push((module.name(), e));
                }
            }
        }

        report
    }
}

/// Ping and help
pub struct GeneralModule;

impl Module for GeneralModule {
    fn name(&self) -> &'static str {
        "general"
    }

    fn register(&self, app: &mut App) -> BotResult<()> {
        app.add_command(commands::general::ping());
        app.add_command(commands::general::help());
        Ok(())
    }
}

/// Play requests, the queue view and request history
pub struct MusicModule;

impl Module for MusicModule {
    fn name(&self) -> &'static str {
        "music"
    }

    fn register(&self, app: &mut App) -> BotResult<()> {
        app.add_command(commands::music::play());
        app.add_command(commands::music::queue());
        app.add_command(commands::music::history());

        let shortcut = commands::music::PlayShortcut::new(app.voicelink(), app.database());
        app.add_shortcut(PLAY_COMMAND, Arc::new(shortcut));
        Ok(())
    }
}

/// Guild prefix and request channel management
pub struct SettingsModule;

impl Module for SettingsModule {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn register(&self, app: &mut App) -> BotResult<()> {
        app.add_command(commands::settings::prefix());
        app.add_command(commands::settings::request_channel());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voicelink::RequestQueue;

    fn app() -> App {
        App::new(Arc::new(RequestQueue::default()), DatabaseHandle::empty())
    }

    struct FailingModule;

    impl Module for FailingModule {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn register(&self, app: &mut App) -> BotResult<()> {
            // Registers something before failing; none of it may survive
            app.add_command(commands::general::ping());
            Err(module_error("missing dependency"))
        }
    }

    struct DuplicateModule;

    impl Module for DuplicateModule {
        fn name(&self) -> &'static str {
            "duplicate"
        }

        fn register(&self, app: &mut App) -> BotResult<()> {
            app.add_command(commands::music::play());
            Ok(())
        }
    }

    fn command_names(app: &App) -> Vec<String> {
        app.commands().iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn test_builtin_modules_register_commands_and_shortcut() {
        let mut app = app();
        let report = ModuleRegistry::builtin().load_all(&mut app);

        assert_eq!(report.loaded, vec!["general", "music", "settings"]);
        assert!(report.failed.is_empty());
        assert_eq!(
            command_names(&app),
            vec!["ping", "help", "play", "queue", "history", "prefix", "request_channel"]
        );
        assert!(app.shortcuts().contains(PLAY_COMMAND));
    }

    #[test]
    fn test_failing_module_is_isolated() {
        let mut registry = ModuleRegistry::new();
        registry.register(FailingModule);
        registry.register(MusicModule);

        let mut app = app();
        let report = registry.load_all(&mut app);

        assert_eq!(report.loaded, vec!["music"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert!(!command_names(&app).contains(&"ping".to_string()));
        assert!(app.shortcuts().contains(PLAY_COMMAND));
    }

    #[test]
    fn test_duplicate_command_fails_second_module() {
        let mut registry = ModuleRegistry::new();
        registry.register(MusicModule);
        registry.register(DuplicateModule);

        let mut app = app();
        let report = registry.load_all(&mut app);

        assert_eq!(report.loaded, vec!["music"]);
        assert_eq!(report.failed[0].0, "duplicate");
        assert_eq!(
            command_names(&app)
                .iter()
                .filter(|name| name.as_str() == "play")
                .count(),
            1
        );
    }
}
