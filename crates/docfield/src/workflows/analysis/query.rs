use super::domain::TagSet;

/// Serialize a tag set into the service's `queryFields` parameter: one token per tag
/// with whitespace runs collapsed to a single underscore, joined by commas, fixed tags
/// before custom ones. Deterministic for a given tag set so a failed submission can be
/// reproduced verbatim. Characters beyond whitespace pass through untouched; the URL
/// layer percent-encodes them.
pub fn encode_query_fields(tags: &TagSet) -> String {
    tags.iter()
        .map(wire_token)
        .collect::<Vec<_>>()
        .join(",")
}

fn wire_token(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}
