use crate::level::LevelValue;
use crate::metadata::LinkingMetadata;
use crate::record::LogRecord;
use chrono::Utc;

/// Maximum length, in characters, of forwarded stack text.
pub const MAX_STACK_LENGTH: usize = 1024;

const TRUNCATION_MARKER: &str = "...";

/// Build the forwarded form of `record`.
///
/// The host record is left untouched; the returned copy carries entity and
/// trace fields, a `timestamp` in unix seconds in place of the host's
/// millisecond `time`, the canonical string level, and flattened
/// `error.class` / `error.message` / `error.stack` fields instead of the raw
/// error value.
pub fn annotate(record: &LogRecord, metadata: &LinkingMetadata) -> LogRecord {
    let mut annotated = record.clone();

    let timestamp = annotated.time.take().unwrap_or_else(Utc::now).timestamp();
    annotated.level = LevelValue::Label(record.level.canonical_label());

    let fields = &mut annotated.fields;
    fields.insert("entity.name".into(), metadata.entity_name.clone().into());
    fields.insert("entity.guid".into(), metadata.entity_guid.clone().into());
    fields.insert("entity.type".into(), metadata.entity_type.clone().into());
    fields.insert("hostname".into(), metadata.hostname.clone().into());
    fields.insert("timestamp".into(), timestamp.into());
    if !metadata.trace_id.is_empty() {
        fields.insert("trace.id".into(), metadata.trace_id.clone().into());
    }
    if !metadata.span_id.is_empty() {
        fields.insert("span.id".into(), metadata.span_id.clone().into());
    }

    if let Some(error) = annotated.error.take() {
        if let Some(class) = error.class {
            fields.insert("error.class".into(), class.into());
        }
        if let Some(message) = error.message {
            fields.insert("error.message".into(), message.into());
        }
        if let Some(stack) = error.stack {
            fields.insert("error.stack".into(), truncate(&stack).into());
        }
    }

    annotated
}

/// Cut `text` to [`MAX_STACK_LENGTH`] characters, ending in `...` when
/// anything was removed.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_STACK_LENGTH {
        return text.to_string();
    }
    let keep = MAX_STACK_LENGTH - TRUNCATION_MARKER.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
