use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PaymentsConfigResponse {
    pub publishable_key: String,
    pub script_url: String,
    pub price_id: String,
}
