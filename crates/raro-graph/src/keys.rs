//! KV key encodings for the primary entities and their derived indexes.
//! Encodings are plain `:`-joined UTF-8 so byte order matches id order.

pub fn vertex_key(id: &str) -> Vec<u8> {
    format!("v:{id}").into_bytes()
}

pub fn edge_key(id: &str) -> Vec<u8> {
    format!("e:{id}").into_bytes()
}

pub fn idx_vertex_type(vtype: &str, id: &str) -> Vec<u8> {
    format!("idx:vertex_type:{vtype}:{id}").into_bytes()
}

pub fn idx_vertex_type_prefix(vtype: &str) -> Vec<u8> {
    format!("idx:vertex_type:{vtype}:").into_bytes()
}

pub fn idx_edge_type(etype: &str, id: &str) -> Vec<u8> {
    format!("idx:edge_type:{etype}:{id}").into_bytes()
}

pub fn idx_edge_type_prefix(etype: &str) -> Vec<u8> {
    format!("idx:edge_type:{etype}:").into_bytes()
}

pub fn idx_out(from_id: &str, edge_id: &str) -> Vec<u8> {
    format!("idx:out:{from_id}:{edge_id}").into_bytes()
}

pub fn idx_out_prefix(from_id: &str) -> Vec<u8> {
    format!("idx:out:{from_id}:").into_bytes()
}

pub fn idx_in(to_id: &str, edge_id: &str) -> Vec<u8> {
    format!("idx:in:{to_id}:{edge_id}").into_bytes()
}

pub fn idx_in_prefix(to_id: &str) -> Vec<u8> {
    format!("idx:in:{to_id}:").into_bytes()
}

pub fn idx_prop(name: &str, value_str: &str, entity_id: &str) -> Vec<u8> {
    format!("idx:prop:{name}:{value_str}:{entity_id}").into_bytes()
}

pub fn idx_prop_prefix(name: &str, value_str: &str) -> Vec<u8> {
    format!("idx:prop:{name}:{value_str}:").into_bytes()
}

pub const ALL_VERTICES_PREFIX: &[u8] = b"v:";
pub const ALL_EDGES_PREFIX: &[u8] = b"e:";

/// Recovers the trailing id from an index key built with one of the
/// `idx_*` helpers above, given the key's known prefix.
pub fn strip_prefix(key: &[u8], prefix: &[u8]) -> Option<String> {
    key.strip_prefix(prefix)
        .and_then(|rest| std::str::from_utf8(rest).ok())
        .map(|s| s.to_string())
}
