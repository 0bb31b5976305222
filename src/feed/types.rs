use serde::Deserialize;

/// Round ids arrive as numbers on some gids and as strings on others. Any id
/// that is not a non-negative integer maps to `None` for that item only, so one
/// odd entry cannot sink the rest of the batch.
pub fn string_or_number_to_u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    })
}

/// Top-level notify payload: `{"status": "OK", "data": [...]}`.
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<FeedItem>,
}

impl FeedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// One command entry in the notify payload. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    pub cmd: i64,
    #[serde(default, deserialize_with = "string_or_number_to_u64_opt")]
    pub sid: Option<u64>,
    #[serde(default)]
    pub d1: Option<u8>,
    #[serde(default)]
    pub d2: Option<u8>,
    #[serde(default)]
    pub d3: Option<u8>,
}

impl FeedItem {
    pub fn dice(&self) -> Option<(u8, u8, u8)> {
        Some((self.d1?, self.d2?, self.d3?))
    }
}
