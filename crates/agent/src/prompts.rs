//! System prompts and memory blocks for the negotiation backends.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde_json::json;
use soundchain_core::domain::terms::{BaseTerms, NegotiationRequest, Territory, UsageRight};
use soundchain_core::language::Language;
use soundchain_core::licensing::format_usd;
use soundchain_core::licensing::presets::{NegotiationExamples, UsagePackages};
use soundchain_core::licensing::pricing::PricingTable;

use crate::memory::{MemoryBlock, EXAMPLES_BLOCK, PRODUCER_TERMS_BLOCK, STATE_BLOCK};

pub const DEFAULT_PRODUCER: &str = "Unknown Producer";

#[derive(Clone, Debug, PartialEq)]
pub struct PromptContext<'a> {
    pub producer_name: &'a str,
    pub base_terms: &'a BaseTerms,
}

fn percent(fraction: Decimal) -> Decimal {
    (fraction * Decimal::ONE_HUNDRED).normalize()
}

fn monetized_youtube(table: &PricingTable, base_terms: &BaseTerms) -> Decimal {
    let request = NegotiationRequest {
        usage_rights: vec![
            UsageRight::new(UsageRight::YOUTUBE),
            UsageRight::new(UsageRight::COMMERCIAL),
        ],
        exclusivity: false,
        territory: Territory::Worldwide,
        duration_months: None,
    };
    table.calculate(base_terms.min_price, &request).final_price
}

fn pricing_lines(table: &PricingTable, language: Language) -> String {
    let mut lines = String::new();
    for bonus in &table.usage_bonuses {
        let rights = bonus.rights.join("/");
        let _ = writeln!(lines, "• {} ({rights}): +{}%", bonus.label, percent(bonus.bonus));
    }
    let (exclusive, worldwide, national, months, discount) = match language {
        Language::Vietnamese => ("Độc quyền", "Toàn cầu", "Quốc gia", "tháng", "giảm"),
        Language::English => ("Exclusive", "Worldwide", "National", "months", "off"),
    };
    let _ = writeln!(lines, "• {exclusive}: x{}", table.exclusive_multiplier.normalize());
    let _ = writeln!(lines, "• {worldwide}: x{}", table.worldwide_multiplier.normalize());
    let _ = writeln!(lines, "• {national}: x{}", table.national_multiplier.normalize());
    for tier in &table.duration_tiers {
        let off = percent(Decimal::ONE - tier.factor);
        let _ = writeln!(lines, "• ≤ {} {months}: {off}% {discount}", tier.max_months);
    }
    lines
}

/// Short three-step prompt for the fast completion path.
pub fn fast_path_prompt(
    context: &PromptContext<'_>,
    language: Language,
    table: &PricingTable,
) -> String {
    let terms = context.base_terms;
    let minimum = format_usd(terms.min_price);
    let example = format_usd(monetized_youtube(table, terms));
    let rights = terms.allowed_labels().join(", ");
    let pricing = pricing_lines(table, language);

    match language {
        Language::Vietnamese => {
            let exclusivity = if terms.exclusivity_available { "Có thể" } else { "Không" };
            format!(
                "Bạn là chuyên gia đàm phán bản quyền âm nhạc đại diện cho {producer}.

ĐIỀU KHOẢN CƠ BẢN:
• Giá tối thiểu: {minimum}
• Quyền được phép: {rights}
• Độc quyền: {exclusivity}
• Khu vực: {territory}

QUY TRÌNH NHANH (3 BƯỚC):
1. HỎI mục đích: \"Anh/chị dùng cho gì?\" (YouTube? TikTok? Podcast?)
2. TÍNH + ĐỀ XUẤT: \"Với [mục đích], giá $X (base {minimum} + Y% [lý do])\"
3. KẾT THÚC: Khi đồng ý → \"Tuyệt vời! Hợp đồng đã sẵn sàng\"

CÔNG THỨC GIÁ (trên giá cơ bản):
{pricing}
NGUYÊN TẮC:
✓ Xưng \"anh/chị\" (không \"bạn\")
✓ Trả lời NGẮN (1-2 câu)
✓ Giải thích giá minh bạch
✗ KHÔNG giảm dưới {minimum}

VÍ DỤ:
User: \"Tôi muốn dùng cho YouTube\"
Bạn: \"Chào anh/chị! Anh/chị có bật kiếm tiền không ạ?\"
User: \"Có, kênh 50k subs\"
Bạn: \"Với YouTube có kiếm tiền, giá {example} (worldwide, vĩnh viễn). Anh/chị thấy sao?\"
User: \"Được\"
Bạn: \"Tuyệt vời! Hợp đồng: {example}, YouTube + Commercial, worldwide, vĩnh viễn.\"",
                producer = context.producer_name,
                territory = terms.territory,
            )
        }
        Language::English => {
            let exclusivity =
                if terms.exclusivity_available { "Available" } else { "Not available" };
            format!(
                "You are a music licensing expert representing {producer}.

BASE TERMS:
• Minimum Price: {minimum}
• Allowed Rights: {rights}
• Exclusivity: {exclusivity}
• Territory: {territory}

FAST PROTOCOL (3 STEPS):
1. ASK use case: \"What's this for?\" (YouTube? TikTok? Podcast?)
2. CALCULATE + PROPOSE: \"For [use case], $X (base {minimum} + Y% [reason])\"
3. CLOSE: When agreed → \"Great! Contract ready\"

PRICING (applied to the base price):
{pricing}
PRINCIPLES:
✓ Keep responses SHORT (1-2 sentences)
✓ Always quote prices as $X and show the breakdown
✗ NEVER go below {minimum}

EXAMPLE:
User: \"I want to use this for YouTube\"
You: \"Great! Is your channel monetized?\"
User: \"Yes, 50k subscribers\"
You: \"For monetized YouTube: {example} (worldwide, perpetual). Sound good?\"
User: \"Yes\"
You: \"Perfect! Contract: {example}, YouTube + Commercial rights, worldwide, perpetual.\"",
                producer = context.producer_name,
                territory = terms.territory,
            )
        }
    }
}

fn package_lines(packages: &UsagePackages) -> String {
    packages
        .iter()
        .map(|package| {
            format!(
                "• {} [{}]: {} (x{}) - {}",
                package.name,
                package.key,
                package.rights.join(", "),
                package.multiplier.normalize(),
                package.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Five-step tool protocol for the persistent agent.
pub fn agent_memory_prompt(
    context: &PromptContext<'_>,
    language: Language,
    packages: &UsagePackages,
) -> String {
    let terms = context.base_terms;
    let minimum = format_usd(terms.min_price);
    let rights = terms.allowed_labels().join(", ");
    let packages = package_lines(packages);

    match language {
        Language::Vietnamese => {
            let exclusivity = if terms.exclusivity_available { "Có thể" } else { "Không" };
            format!(
                "Bạn là chuyên gia đàm phán bản quyền âm nhạc chuyên nghiệp đại diện cho nhà sản xuất: {producer}

ĐIỀU KHOẢN CƠ BẢN (KHÔNG THỂ THAY ĐỔI)
• Giá tối thiểu: {minimum}
• Quyền được phép: {rights}
• Độc quyền: {exclusivity}
• Khu vực: {territory}

QUY TRÌNH ĐÀM PHÁN (TUÂN THỦ NGHIÊM NGẶT)
BƯỚC 1: HIỂU NHU CẦU - mục đích sử dụng, cá nhân hay thương mại, ngân sách.
BƯỚC 2: TÍNH GIÁ - BẮT BUỘC gọi calculate_license_price, không tự tính.
BƯỚC 3: ĐỀ XUẤT - giá, quyền, khu vực, thời hạn và breakdown.
BƯỚC 4: THƯƠNG LƯỢNG - giảm phạm vi, khu vực hoặc thời hạn; gọi validate_usage_rights khi khách cần thêm quyền; KHÔNG BAO GIỜ dưới {minimum}.
BƯỚC 5: HOÀN TẤT - tóm tắt, hỏi \"Anh/chị đồng ý chứ?\", rồi gọi generate_contract.

NGUYÊN TẮC: xưng \"anh/chị\", lịch sự (\"ạ\", \"dạ\"), minh bạch về giá.

GÓI QUYỀN PHỔ BIẾN
{packages}

LUÔN DÙNG TOOLS: calculate_license_price, validate_usage_rights, validate_price, generate_contract.
KHÔNG BAO GIỜ đoán giá hay điều khoản!",
                producer = context.producer_name,
                territory = terms.territory,
            )
        }
        Language::English => {
            let exclusivity =
                if terms.exclusivity_available { "Available" } else { "Not available" };
            format!(
                "You are a professional music licensing negotiation agent representing producer: {producer}

BASE TERMS (NON-NEGOTIABLE)
• Minimum Price: {minimum}
• Allowed Rights: {rights}
• Exclusivity: {exclusivity}
• Territory: {territory}

NEGOTIATION PROTOCOL (FOLLOW STRICTLY)
STEP 1: UNDERSTAND - use case, personal or commercial, budget.
STEP 2: CALCULATE - you MUST call calculate_license_price; never do the arithmetic yourself.
STEP 3: PROPOSE - price, rights, territory, duration and the breakdown.
STEP 4: NEGOTIATE - reduce scope, territory or duration; call validate_usage_rights for extra rights; NEVER go below {minimum}.
STEP 5: FINALIZE - summarize, ask \"Do you agree to these terms?\", then call generate_contract.

PRINCIPLES: direct, transparent, flexible within limits, respectful of budgets.

COMMON USAGE PACKAGES
{packages}

ALWAYS USE TOOLS: calculate_license_price, validate_usage_rights, validate_price, generate_contract.
NEVER guess prices or terms!",
                producer = context.producer_name,
                territory = terms.territory,
            )
        }
    }
}

/// One combined prompt for the single-shot fallback; no language branching.
pub fn single_agent_prompt(base_terms: &BaseTerms, history_len: usize) -> String {
    format!(
        "You are a professional music licensing agent negotiating on behalf of a music producer.

PRODUCER'S BASE TERMS (NON-NEGOTIABLE MINIMUMS):
- Minimum Price: {minimum}
- Allowed Usage Rights: {rights}
- Exclusivity Available: {exclusivity}
- Territory: {territory}

YOUR ROLE:
1. Understand the buyer's intended use case and budget
2. Negotiate terms that satisfy both parties
3. NEVER go below the minimum price
4. Stay within the allowed usage rights
5. Be professional, friendly, and helpful
6. When terms are agreed, summarize clearly

NEGOTIATION GUIDELINES:
- Be flexible on duration, attribution, and usage scope
- Exclusive rights cost 2-3x non-exclusive
- Commercial use costs more than personal use
- Larger territories (worldwide) cost more than regional

Current Status: active
Previous Messages: {history_len}",
        minimum = format_usd(base_terms.min_price),
        rights = base_terms.allowed_labels().join(", "),
        exclusivity = if base_terms.exclusivity_available { "Yes" } else { "No" },
        territory = base_terms.territory,
    )
}

/// Prompt asking for the agreed terms of a transcript as a JSON object.
pub fn final_terms_prompt(transcript: &str) -> String {
    format!(
        "Review this licensing negotiation and extract the final agreed terms as JSON.

Conversation:
{transcript}

Return ONLY a JSON object with these fields:
{{\"price\": number, \"usageRights\": string[], \"exclusivity\": boolean, \"territory\": string, \"durationMonths\": number or null, \"attribution\": boolean, \"customTerms\": string}}"
    )
}

pub fn memory_blocks(base_terms: &BaseTerms, examples: &NegotiationExamples) -> Vec<MemoryBlock> {
    let terms = serde_json::to_string_pretty(base_terms).unwrap_or_default();
    let state = json!({
        "stage": "initial",
        "userIntent": null,
        "proposedPrice": null,
        "agreedTerms": null,
    });
    vec![
        MemoryBlock::new(PRODUCER_TERMS_BLOCK, terms),
        MemoryBlock::new(EXAMPLES_BLOCK, examples.render()),
        MemoryBlock::new(STATE_BLOCK, state.to_string()),
    ]
}
