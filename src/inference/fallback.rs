//! Placeholder responses for degraded mode

use rand::seq::SliceRandom;

/// Responses served while the model is unavailable
pub const FALLBACK_RESPONSES: [&str; 3] = [
    "죄송합니다. 현재 AI 모델이 로드되지 않았습니다. 잠시 후 다시 시도해주세요.",
    "모델 초기화 중입니다. 잠시만 기다려주세요.",
    "현재 서비스가 준비 중입니다. 곧 정상적인 응답이 가능합니다.",
];

/// Uniformly picks one of [`FALLBACK_RESPONSES`]
pub fn choose() -> &'static str {
    FALLBACK_RESPONSES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_RESPONSES[0])
}

/// True if `text` is one of the placeholder responses
pub fn is_fallback(text: &str) -> bool {
    FALLBACK_RESPONSES.contains(&text)
}
