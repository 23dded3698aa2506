//! Prompt assembly: system prompt, recent history, and the rendered batch.

use keepsake_core::batch::CompiledBatch;
use keepsake_core::context::{BatchMetadata, CallerIdentity};
use keepsake_core::message::{Message, Role, Transcript};
use keepsake_core::store::HistoryEntry;

const IDENTITY: &str = "You are Keepsake, an assistant that helps people keep the memories of \
shared events: trips, parties, graduations, anything worth remembering. People tell you what \
happened and send photos and videos; you file them into events they belong to and help them \
find, share, and relive them later.";

const RULES: &str = "<rules>
- Act through tools. Never claim to have saved, created, or shared something unless a tool \
call succeeded.
- Tool results are JSON. When `success` is false, read `error.kind`: `invalid_arguments` means \
fix the arguments or ask the user, `capability_denied` means the user is not a member, \
`downstream_failure` means try again later.
- Media in the user's message is numbered `[media #n: kind]`. Pass that number as \
`media_position` to add_memory, or use add_batch_memories to save every item at once.
- If the target event is unclear, list the user's events and ask which one. Do not guess.
- Reply briefly and in the user's language.
</rules>";

fn caller_context(caller: &CallerIdentity) -> String {
    format!(
        "<user_context>\nName: {}\nUser id: {}\n</user_context>",
        caller.display_name.as_deref().unwrap_or("unknown"),
        caller.user_id
    )
}

fn recent_context(history: &[HistoryEntry]) -> Option<String> {
    let recent_media: usize = history
        .iter()
        .filter(|h| h.role == Role::User)
        .map(|h| h.media_count)
        .sum();
    if recent_media == 0 {
        return None;
    }
    Some(format!(
        "<recent_context>\nThe user sent {recent_media} media item(s) in recent messages.\n</recent_context>"
    ))
}

fn batch_state(batch: &BatchMetadata) -> Option<String> {
    let media = batch.media.len();
    let note = if batch.is_batch && media > 0 {
        format!(
            "The user sent {} messages in quick succession containing {media} media item(s). \
             Save all of the media first, then ask at most one question.",
            batch.segments.len()
        )
    } else if batch.is_batch {
        format!(
            "The user sent {} messages in quick succession. Treat them as one request.",
            batch.segments.len()
        )
    } else if media > 0 {
        "The user sent one media item with this message. Handle it now.".to_string()
    } else {
        return None;
    };
    Some(format!("<current_state>\n{note}\n</current_state>"))
}

/// Build the system prompt for one turn.
pub fn system_prompt(caller: &CallerIdentity, history: &[HistoryEntry], batch: &BatchMetadata) -> String {
    let mut sections = vec![IDENTITY.to_string(), RULES.to_string(), caller_context(caller)];
    sections.extend(recent_context(history));
    sections.extend(batch_state(batch));
    sections.join("\n\n")
}

/// Render a compiled batch as the user message the model sees.
///
/// One line per fragment in arrival order; each media item is shown as
/// `[media #n: kind]` ahead of the text it arrived with.
pub fn render_batch(batch: &CompiledBatch) -> String {
    let mut lines = Vec::with_capacity(batch.segments.len());
    let mut media = batch.media.iter().enumerate().peekable();

    for (index, segment) in batch.segments.iter().enumerate() {
        let mut line = String::new();
        while let Some((position, item)) = media.next_if(|(_, m)| m.fragment_index == index) {
            line.push_str(&format!("[media #{}: {}] ", position + 1, item.media.kind.label()));
        }
        line.push_str(segment);
        let line = line.trim_end();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}

/// History entries as transcript messages.
///
/// The transcript must open with a user message, so leading assistant
/// entries are skipped.
pub fn history_messages(history: &[HistoryEntry]) -> Vec<Message> {
    history
        .iter()
        .skip_while(|h| h.role != Role::User)
        .filter_map(|h| match h.role {
            Role::User if h.media_count > 0 => Some(Message::user(
                format!("{} [sent {} media]", h.content, h.media_count).trim_start(),
            )),
            Role::User => Some(Message::user(h.content.clone())),
            Role::Assistant => Some(Message::assistant(h.content.clone())),
            Role::System | Role::Tool => None,
        })
        .filter(|m| !m.content.trim().is_empty())
        .collect()
}

/// The opening transcript of a turn.
pub fn initial_transcript(
    caller: &CallerIdentity,
    history: &[HistoryEntry],
    batch: &CompiledBatch,
) -> Transcript {
    let meta = BatchMetadata::from_batch(batch);
    let mut transcript = Transcript::new();
    transcript.push(Message::system(system_prompt(caller, history, &meta)));
    for message in history_messages(history) {
        transcript.push(message);
    }
    let rendered = render_batch(batch);
    if rendered.is_empty() {
        transcript.push(Message::user("(empty message)"));
    } else {
        transcript.push(Message::user(rendered));
    }
    transcript
}
