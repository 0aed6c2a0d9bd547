use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RequestHintRequest {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub question_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestHintResponse {
    pub hint: String,
    pub hints_used: u32,
    pub hints_remaining: u32,
}
