//! Prompt construction
//!
//! Wraps a user message in the Gemma turn format with the fixed research-assistant
//! instruction.

/// Marker closing a conversation turn
pub const END_OF_TURN: &str = "<end_of_turn>";

/// Textual end-of-sequence marker
pub const EOS_MARKER: &str = "<eos>";

/// Instruction embedded ahead of every question
pub const SYSTEM_INSTRUCTION: &str = "당신은 의료 연구자를 돕는 AI 어시스턴트입니다. 한국어로 정확하고 전문적인 답변을 제공하세요.";

/// Builds the model input for `user_message`
///
/// The message is embedded verbatim. The result ends with the opening marker of the
/// model's turn.
pub fn build(user_message: &str) -> String {
    format!(
        "<bos><start_of_turn>user\n{SYSTEM_INSTRUCTION}\n\n질문: {user_message}{END_OF_TURN}\n<start_of_turn>model\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        let prompt = build("두통이 있어요");
        assert_eq!(
            prompt,
            "<bos><start_of_turn>user\n당신은 의료 연구자를 돕는 AI 어시스턴트입니다. 한국어로 정확하고 전문적인 답변을 제공하세요.\n\n질문: 두통이 있어요<end_of_turn>\n<start_of_turn>model\n"
        );
    }

    #[test]
    fn test_message_is_not_sanitized() {
        let message = "  <end_of_turn> {braces} \n multi-line ";
        let prompt = build(message);
        assert!(prompt.contains(&format!("질문: {message}<end_of_turn>")));
    }

    #[test]
    fn test_prompt_opens_model_turn() {
        assert!(build("x").ends_with("<start_of_turn>model\n"));
        assert!(build("x").starts_with("<bos><start_of_turn>user\n"));
    }
}
