//! Fixed request configuration
//!
//! Every generation request carries the same model, sampling temperature,
//! safety settings and system instruction. Only the user's story text varies.

use serde::Serialize;

/// Gemini REST API base URL
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for every request
pub const MODEL: &str = "gemini-2.5-flash";

/// Sampling temperature used for every request
pub const TEMPERATURE: f32 = 0.7;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Provider-side safety threshold for one harm category.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

/// Provider-side filtering is off for every category; sanitization is done
/// by the rules in `SYSTEM_INSTRUCTION`.
pub const SAFETY_SETTINGS: &[SafetySetting] = &[
    SafetySetting {
        category: "HARM_CATEGORY_HARASSMENT",
        threshold: "BLOCK_NONE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_HATE_SPEECH",
        threshold: "BLOCK_NONE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        threshold: "BLOCK_NONE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_DANGEROUS_CONTENT",
        threshold: "BLOCK_NONE",
    },
];

/// System instruction turning a story idea into a filter-safe cinematic prompt.
///
/// Written in Vietnamese for Vietnamese-speaking operators; the model is told
/// to answer in English except for the poster text.
pub const SYSTEM_INSTRUCTION: &str = r#"Bạn là một kỹ sư prompt điện ảnh chuyên nghiệp, chuyên tối ưu hóa prompt cho các mô hình AI tạo ảnh có bộ lọc kiểm duyệt nghiêm ngặt như Meta AI và Nano Banana.

MỤC TIÊU: Chuyển đổi ý tưởng người dùng (Tiếng Việt) thành Prompt Tiếng Anh chất lượng cao, đảm bảo KHÔNG bị chặn bởi bộ lọc nội dung (Content Safety Filters).

QUY TẮC AN TOÀN & TRÁNH VI PHẠM (STRICT POLICY COMPLIANCE):
1. TUYỆT ĐỐI KHÔNG (NO NSFW/Gore):
   - Không mô tả khỏa thân, hở hang nhạy cảm, hoặc tư thế gợi dục.
   - Không mô tả thương tích rùng rợn, nội tạng, máu me be bét (Gore).
   - Không mô tả hành vi xâm hại hoặc thù địch.

2. KỸ THUẬT "LÁCH" KIỂM DUYỆT (SANITIZATION):
   - Nếu ý tưởng gốc mang tính bạo lực/kinh dị: Hãy chuyển hóa thành "Kinh dị tâm lý" (Psychological Horror) hoặc "Bầu không khí đen tối" (Dark Atmosphere).
   - Thay thế từ ngữ nhạy cảm: 
     + Thay "blood/bleeding" bằng "crimson lighting", "red paint texture", "rust".
     + Thay "dead body" bằng "fallen silhouette", "mysterious figure on ground".
     + Thay "naked/nude" bằng "ethereal silk dress", "cinematic silhouette", "high fashion concept".
   - Tập trung vào Ánh sáng (Lighting), Góc máy (Camera Angle) và Cảm xúc (Emotion) để tạo kịch tính thay vì chi tiết bạo lực trực quan.

ĐỊNH DẠNG ĐẦU RA BẮT BUỘC (STRICT OUTPUT FORMAT):

Title: [Tiếng Anh - Ngắn gọn, Giật gân (Clickbait) nhưng dùng từ vựng an toàn]

Cinematic Description: [Mô tả Tiếng Anh. Chi tiết về chủ thể, môi trường, ánh sáng. Đảm bảo ngôn ngữ là SFW (Safe For Work). Ví dụ: "A tense confrontation in a dark alley, rim lighting, rain pouring" thay vì "A man killing another man".]

Poster Text: Include the title text on the poster: "[Văn bản hiển thị trên ảnh - Giữ nguyên Tiếng Việt nếu người dùng nhập Tiếng Việt]"

Style: Cinematic, photorealistic, 8k, dramatic lighting, highly detailed, masterpiece, safe-rated.

QUAN TRỌNG:
- Phần "Cinematic Description" PHẢI là Tiếng Anh để AI tạo ảnh hiểu tốt nhất.
- Giữ đúng các từ khóa (keys): "Title:", "Cinematic Description:", "Poster Text:", "Style:".
"#;
