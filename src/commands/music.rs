use crate::commands::{create_success_embed, CommandResult, Context};
use crate::database::DatabaseHandle;
use crate::error::{command_error, BotResult};
use crate::shortcut::{ShortcutCommand, ShortcutContext};
use crate::utils::messages::{send_transient, NOTICE_TTL};
use crate::voicelink::{TrackRequest, Voicelink};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use rust_i18n::t;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of recent requests kept in a user record
pub const MAX_HISTORY: usize = 25;

/// Validate a request and hand it to the audio engine.
///
/// Returns the queue position. The request is also added to the
/// requester's history; failing to store the history does not fail the
/// request.
pub async fn enqueue(
    voicelink: &dyn Voicelink,
    database: &DatabaseHandle,
    mut request: TrackRequest,
) -> BotResult<usize> {
    request.query = request.query.trim().to_string();
    if request.query.is_empty() {
        return Err(command_error(&t!("play_empty_query")));
    }

    let requester_id = request.requester_id;
    let query = request.query.clone();
    let position = voicelink.enqueue(request).await?;
    debug!("Queued \"{}\" at position {}", query, position);

    if let Err(e) = record_history(database, requester_id, &query).await {
        warn!("Failed to store history of user {}: {}", requester_id, e);
    }

    Ok(position)
}

async fn record_history(database: &DatabaseHandle, user_id: u64, query: &str) -> BotResult<()> {
    let mut record = database.get_user(user_id).await?.unwrap_or_else(|| json!({}));
    push_history(&mut record, query);
    database.update_user(user_id, record).await
}

/// Put `query` at the front of the record's history, newest first
pub fn push_history(record: &mut Value, query: &str) {
    if !record.is_object() {
        *record = json!({});
    }
    let history = record
        .as_object_mut()
        .map(|object| object.entry("history").or_insert_with(|| json!([])));

    if let Some(history) = history {
        if !history.is_array() {
            *history = json!([]);
        }
        if let Some(entries) = history.as_array_mut() {
            entries.retain(|entry| entry.as_str() != Some(query));
            entries.insert(0, Value::String(query.to_string()));
            entries.truncate(MAX_HISTORY);
        }
    }
}

/// Recent requests stored in a user record
pub fn history_of(record: &Value) -> Vec<String> {
    record
        .get("history")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Loads your input and added it to the queue.
#[poise::command(slash_command, prefix_command, guild_only, aliases("p"))]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Input a query or a searchable link."]
    #[rest]
    query: String,
) -> CommandResult {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| command_error(&t!("guild_only")))?;

    let request = TrackRequest {
        guild_id: guild_id.get(),
        channel_id: ctx.channel_id().get(),
        requester_id: ctx.author().id.get(),
        query,
    };
    let shown = request.query.trim().to_string();

    let data = ctx.data();
    let position = enqueue(data.voicelink.as_ref(), &data.database, request).await?;

    ctx.say(t!("track_queued", query = shown, position = position))
        .await?;
    Ok(())
}

/// Display the players queue songs in your queue.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| command_error(&t!("guild_only")))?;

    let pending = ctx.data().voicelink.pending(guild_id.get()).await;
    let description = if pending.is_empty() {
        t!("queue_empty").to_string()
    } else {
        pending
            .iter()
            .enumerate()
            .map(|(index, request)| {
                format!("`{}.` {} <@{}>", index + 1, request.query, request.requester_id)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    ctx.send(poise::CreateReply::default().embed(create_success_embed(
        &t!("queue_title"),
        &description,
    )))
    .await?;
    Ok(())
}

/// Show your recently requested tracks.
#[poise::command(slash_command, prefix_command)]
pub async fn history(ctx: Context<'_>) -> CommandResult {
    let record = ctx.data().database.get_user(ctx.author().id.get()).await?;
    let entries = record.as_ref().map(history_of).unwrap_or_default();

    let description = if entries.is_empty() {
        t!("history_empty").to_string()
    } else {
        entries
            .iter()
            .enumerate()
            .map(|(index, query)| format!("`{}.` {}", index + 1, query))
            .collect::<Vec<_>>()
            .join("\n")
    };

    ctx.send(
        poise::CreateReply::default()
            .embed(create_success_embed(&t!("history_title"), &description))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// `play` as invoked from a music request channel
pub struct PlayShortcut {
    voicelink: Arc<dyn Voicelink>,
    database: DatabaseHandle,
}

impl PlayShortcut {
    pub fn new(voicelink: Arc<dyn Voicelink>, database: DatabaseHandle) -> Self {
        Self {
            voicelink,
            database,
        }
    }
}

#[async_trait]
impl ShortcutCommand for PlayShortcut {
    async fn invoke(&self, ctx: ShortcutContext<'_>, query: &str) -> BotResult<()> {
        let guild_id = ctx
            .message
            .guild_id
            .ok_or_else(|| command_error(&t!("guild_only")))?;

        let request = TrackRequest {
            guild_id,
            channel_id: ctx.message.channel_id,
            requester_id: ctx.message.author_id,
            query: query.to_string(),
        };
        let position = enqueue(self.voicelink.as_ref(), &self.database, request).await?;

        send_transient(
            ctx.http,
            serenity::ChannelId::new(ctx.message.channel_id),
            &t!("track_queued", query = query.trim(), position = position),
            NOTICE_TTL,
        )
        .await
    }
}
