use crate::metadata::LinkingMetadata;
use crate::record::LogRecord;

/// Marker token that introduces the linking block in decorated text.
pub const LINKING_MARKER: &str = "NR-LINKING";

/// Append the linking block to the record's message. No structured fields
/// are added; log scrapers parse the marker out of the text instead.
pub fn decorate(record: &mut LogRecord, metadata: &LinkingMetadata) {
    record.message.push_str(&linking_suffix(metadata));
}

/// ` NR-LINKING|<guid>|<hostname>|<trace.id>|<span.id>|<entity.name>|`,
/// with the entity name URL-encoded.
pub fn linking_suffix(metadata: &LinkingMetadata) -> String {
    format!(
        " {}|{}|{}|{}|{}|{}|",
        LINKING_MARKER,
        metadata.entity_guid,
        metadata.hostname,
        metadata.trace_id,
        metadata.span_id,
        urlencoding::encode(&metadata.entity_name),
    )
}

/// Recover linking metadata from decorated text, if it carries a block.
pub fn parse_linking_suffix(text: &str) -> Option<LinkingMetadata> {
    let start = text.rfind(LINKING_MARKER)?;
    let block = &text[start + LINKING_MARKER.len()..];
    let mut parts = block.strip_prefix('|')?.split('|');

    let entity_guid = parts.next()?.to_string();
    let hostname = parts.next()?.to_string();
    let trace_id = parts.next()?.to_string();
    let span_id = parts.next()?.to_string();
    let entity_name = urlencoding::decode(parts.next()?).ok()?.into_owned();

    Some(LinkingMetadata {
        entity_name,
        entity_type: crate::transaction::ENTITY_TYPE.to_string(),
        entity_guid,
        trace_id,
        span_id,
        hostname,
    })
}
