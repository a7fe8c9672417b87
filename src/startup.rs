use crate::commands::{create_error_embed, CommandContext};
use crate::config::{Settings, SettingsFile, SharedSettings, SETTINGS_PATH};
use crate::database::{Database, DatabaseHandle, SettingsStore};
use crate::error::Error;
use crate::framework::{RoutingFramework, RoutingServices};
use crate::ipc::IpcClient;
use crate::logging::init_logging;
use crate::modules::{App, ModuleRegistry};
use crate::prefix::stripped_prefix;
use crate::shutdown;
use crate::translator::{apply_translations, Translator, LOCAL_LANGS_DIR};
use crate::voicelink::{RequestQueue, Voicelink};
use crate::web;
use poise::serenity_prelude as serenity;
use rust_i18n::t;
use serde_json::{Map, Value};
use serenity::model::user::OnlineStatus;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info};

/// Version the command tree is synced for
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Presence shown until the bot is ready
const STARTING_ACTIVITY: &str = "Starting...";

/// Whether the application commands have to be re-registered
pub fn needs_sync(stored: Option<&str>, current: &str) -> bool {
    stored != Some(current)
}

/// Gateway intents for the configured features
pub fn gateway_intents(settings: &Settings) -> serenity::GatewayIntents {
    let mut intents = serenity::GatewayIntents::non_privileged();
    if !settings.prefix.is_empty() {
        intents |= serenity::GatewayIntents::MESSAGE_CONTENT;
    }
    if settings.ipc_client.enable {
        intents |= serenity::GatewayIntents::GUILD_MEMBERS;
    }
    intents
}

fn version_update(version: &str) -> Map<String, Value> {
    let mut update = Map::new();
    update.insert("version".to_string(), Value::String(version.to_string()));
    update
}

/// Connect to the database, exiting the process when it is unreachable
async fn connect_database(settings: &Settings) -> miette::Result<DatabaseHandle> {
    let (name, url) = settings.database_credentials()?;

    match Database::connect(name, url).await {
        Ok(handle) => Ok(handle),
        Err(e) => {
            error!("Unable to connect to the database! {:?}", e);
            std::process::exit(1);
        }
    }
}

/// Bring the bot up and run it until it stops or a shutdown signal arrives
pub async fn run() -> miette::Result<()> {
    let settings_file = SettingsFile::new(SETTINGS_PATH);
    let settings = settings_file.load()?;

    init_logging(&settings.logging)?;
    info!("Starting Vocard {}", VERSION);

    let translator = Arc::new(Translator::new());
    if let Err(e) = translator.load(LOCAL_LANGS_DIR).await {
        error!("Failed to load command translations: {:?}", e);
        return Err(e.into());
    }

    let database = connect_database(&settings).await?;

    let voicelink: Arc<dyn Voicelink> = Arc::new(RequestQueue::default());
    let mut app = App::new(Arc::clone(&voicelink), database.clone());
    app.set_translator(Arc::clone(&translator));
    ModuleRegistry::builtin().load_all(&mut app);
    apply_translations(app.commands_mut(), &translator).await;
    let (commands, shortcuts) = app.into_parts();

    let ipc = Arc::new(IpcClient::new(settings.ipc_client.clone())?);
    if ipc.is_enabled() {
        if let Err(e) = ipc.connect().await {
            error!("Cannot connect to IPC dashboard! - Reason: {}", e);
        }
    }

    let token = settings.token.clone();
    let intents = gateway_intents(&settings);
    let activity = settings.activity.clone();
    let stored_version = settings.version.clone();
    let shared: SharedSettings = Arc::new(RwLock::new(settings));
    let store: Arc<dyn SettingsStore> = Arc::new(database.clone());

    let options = poise::FrameworkOptions {
        commands,
        on_error: |error| Box::pin(on_error(error)),
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: None,
            stripped_dynamic_prefix: Some(stripped_prefix),
            mention_as_prefix: false,
            case_insensitive_commands: true,
            ignore_bots: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let setup_settings = Arc::clone(&shared);
    let setup_store = Arc::clone(&store);
    let setup_database = database.clone();
    let setup_translator = Arc::clone(&translator);
    let poise_framework = poise::Framework::new(options, move |ctx, _ready, framework| {
        Box::pin(async move {
            if let Some(activity) = &activity {
                ctx.set_presence(
                    Some(serenity::ActivityData::listening(activity)),
                    OnlineStatus::Online,
                );
                info!("Setting activity to {}", activity);
            }

            if needs_sync(stored_version.as_deref(), VERSION) {
                match poise::builtins::register_globally(ctx, &framework.options().commands).await
                {
                    Ok(()) => {
                        info!("Slash commands registered for version {}", VERSION);
                        if let Err(e) = settings_file.update(version_update(VERSION)) {
                            error!("Failed to store version in settings file: {:?}", e);
                        }
                        setup_settings.write().await.version = Some(VERSION.to_string());
                        setup_translator.flush_missing().await;
                    }
                    Err(e) => error!("Failed to register slash commands: {:?}", e),
                }
            }

            Ok(CommandContext {
                settings: setup_settings,
                store: setup_store,
                database: setup_database,
                translator: setup_translator,
                voicelink,
                owners: framework.options().owners.clone(),
            })
        })
    });

    let framework = RoutingFramework::new(
        poise_framework,
        RoutingServices {
            settings: Arc::clone(&shared),
            store,
            shortcuts,
            translator,
        },
    );

    let _web = web::start(web::port_from_env()).await?;

    let (shutdown_send, shutdown_recv) = oneshot::channel();
    let shutdown_database = database.clone();
    let shutdown_ipc = Arc::clone(&ipc);
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_database, shutdown_ipc).await;
    });

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .activity(serenity::ActivityData::listening(STARTING_ACTIVITY))
        .await
        .map_err(Error::from)?;

    run_until_shutdown(client, shutdown_recv).await
}

/// Drive the gateway connection until it closes or the signal handler fires
async fn run_until_shutdown(
    mut client: serenity::Client,
    shutdown: oneshot::Receiver<()>,
) -> miette::Result<()> {
    info!("Connecting to the gateway");
    let gateway = tokio::spawn(async move { client.start().await.map_err(Error::from) });

    tokio::select! {
        joined = gateway => {
            info!("Gateway connection closed");
            match joined {
                Ok(result) => result.map_err(Into::into),
                Err(e) => {
                    error!("Gateway task failed: {:?}", e);
                    Err(Error::Other(format!("Gateway task failed: {}", e)).into())
                }
            }
        }
        _ = shutdown => {
            info!("Shutdown requested, leaving the gateway");
            Ok(())
        }
    }
}

/// Handle errors from commands
async fn on_error(error: poise::FrameworkError<'_, CommandContext, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Error during setup: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            if !matches!(error, Error::Command(_)) {
                error!("Error in command '{}': {:?}", ctx.command().name, error);
            }
            if let Err(e) = ctx
                .send(
                    poise::CreateReply::default()
                        .embed(create_error_embed(
                            &t!("error_title", context = "command"),
                            &error.to_string(),
                        ))
                        .ephemeral(true),
                )
                .await
            {
                error!("Error while sending error message: {:?}", e);
            }
        }
        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            if let Some(error) = error {
                error!("Command check failed: {:?}", error);
                if let Err(e) = ctx
                    .send(
                        poise::CreateReply::default()
                            .embed(create_error_embed(
                                &t!("error_title", context = "check"),
                                &error.to_string(),
                            ))
                            .ephemeral(true),
                    )
                    .await
                {
                    error!("Error while sending error message: {:?}", e);
                }
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {:?}", e);
            }
        }
    }
}
