use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One stock delta as delivered on the push stream.
///
/// `timestamp` is carried when the backend sends it but is not used for
/// ordering: updates are applied last-write-wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub product_id: String,
    pub stock: u32,
    #[serde(default)]
    pub variant_stocks: HashMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}
