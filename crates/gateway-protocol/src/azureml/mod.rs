//! Azure-ML score request/response shapes.
//!
//! `POST /chat/score/{model}`, `POST /prompt/score/{model}`,
//! `POST /embedding/score/{model}`; the surface converts these to the
//! generic OpenAI shape for the pipeline and converts the response back.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatScoreInputData {
    pub input_string: Vec<ChatScoreMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatScoreMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatScoreRequest {
    pub input_data: ChatScoreInputData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptScoreRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingScoreRequest {
    pub documents: Vec<String>,
}

/// Both chat/score and prompt/score respond `{"output": "<text>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreTextOutput {
    pub output: String,
}

/// embedding/score responds with the raw vector list.
pub type EmbeddingScoreOutput = Vec<Vec<f32>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_score_round_trips() {
        let req = ChatScoreRequest {
            input_data: ChatScoreInputData {
                input_string: vec![ChatScoreMessage { role: "user".to_string(), content: "hi".to_string() }],
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: ChatScoreRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.input_data.input_string[0].content, "hi");
    }
}
