use garde::Validate;
use serde::{Deserialize, Serialize};

/// Query string LinkedIn appends when redirecting back to us.
#[derive(Debug, Deserialize, Validate)]
pub struct LinkedInCallbackQuery {
    #[garde(length(min = 1, max = 128))]
    pub state: String,
    #[garde(length(min = 1))]
    pub code: Option<String>,
    #[garde(skip)]
    pub error: Option<String>,
    #[garde(skip)]
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkedInCallbackResponse {
    pub ok: bool,
}
