// src/llm/prompts.rs
//! Chat prompts for the summary and scoring passes.
//!
//! The scoring prompt pins the evaluator to the exact output layout that
//! `extractors::score` parses; keep the two in step.

use crate::extractors::score::{DIMENSIONS, MAX_DIMENSION_SCORE, MAX_TOTAL_SCORE};
use crate::llm::models::ChatMessage;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const SCORING_SYSTEM_PROMPT: &str = "你是一个经验丰富且一丝不苟的再担保业务评审专家。你的任务是严格按照提供的评分标准，\
对照原始报告和总结内容，进行客观、详细的打分，并给出充分的评分理由。请确保输出完全符合要求的格式。";

/// Per-dimension level descriptions, 5 down to 1, in `DIMENSIONS` order.
const RUBRIC: [[&str; 5]; 5] = [
    [
        "总结内容完全准确，无遗漏，所有关键数据均包含，表达清晰。",
        "总结基本准确，但有轻微遗漏或数据轻微偏差。",
        "大部分准确，但有一定程度的信息缺失或错误。",
        "存在较多错误，核心内容表达有偏差。",
        "严重偏离原文信息，存在大量错误或遗漏。",
    ],
    [
        "总结逻辑清晰，层次分明，符合再担保业务的评审逻辑。",
        "逻辑基本清晰，但部分信息组织不够合理。",
        "存在逻辑跳跃，部分信息前后矛盾。",
        "逻辑混乱，难以理解总结内容。",
        "完全没有逻辑，内容组织凌乱。",
    ],
    [
        "清晰指出企业的信用风险、市场风险、财务风险等，分析到位。",
        "识别出主要风险，但部分细节分析不够深入。",
        "有一定风险分析，但较为片面。",
        "风险分析不充分，仅提到个别风险点。",
        "未进行有效的风险分析。",
    ],
    [
        "总结精准，内容简练，突出核心信息，无冗余。",
        "较为简练，但部分内容仍可精简。",
        "有一定冗余，部分内容过长或不必要。",
        "总结过于冗长，信息提炼不到位。",
        "完全没有抓住重点，信息杂乱无章。",
    ],
    [
        "总结清晰阐述再担保机构决策所需的核心信息，提供有价值的判断依据。",
        "对决策有所帮助，但仍可优化。",
        "有一定帮助，但缺少关键信息。",
        "对决策帮助有限，信息过于浅显。",
        "无决策参考价值。",
    ],
];

/// Rubric text plus the required response layout.
pub fn scoring_criteria() -> String {
    let mut out = format!(
        "请对以下总结内容进行评分，每个维度 {MAX_DIMENSION_SCORE} 分，总分 {MAX_TOTAL_SCORE} 分：\n\n"
    );
    for (i, (name, levels)) in DIMENSIONS.iter().zip(RUBRIC.iter()).enumerate() {
        out.push_str(&format!("{}. **{}（{}分）**\n", i + 1, name, MAX_DIMENSION_SCORE));
        for (level, description) in (1..=MAX_DIMENSION_SCORE).rev().zip(levels.iter()) {
            out.push_str(&format!("- {level} 分：{description}\n"));
        }
        out.push('\n');
    }

    out.push_str("请严格按照以下格式返回评分：\n```\n");
    for (i, name) in DIMENSIONS.iter().enumerate() {
        out.push_str(&format!(
            "**{}. {}（评分：X/{}）** 评分理由：……\n\n",
            i + 1,
            name,
            MAX_DIMENSION_SCORE
        ));
    }
    out.push_str(&format!("**总评分：X/{MAX_TOTAL_SCORE}**\n```\n"));
    out
}

/// Messages asking the evaluator to score `summary` against `original`.
pub fn scoring_messages(original: &str, summary: &str) -> Vec<ChatMessage> {
    let user = format!(
        "你是一位资深的再担保业务评审员。你的任务是对提供的总结内容进行评分，并给出评分理由。\n\n\
         ### 原始报告内容\n{original}\n\n\
         ### 总结内容\n{summary}\n\n\
         ### 评分标准\n{criteria}\n\n\
         请仔细阅读并理解上述每一项评分标准及其细则。对于每一个评分维度，您都需要：\n\
         1. 严格依据“原始报告内容”和“总结内容”进行对比分析。\n\
         2. 严格对照该维度的评分细则来决定分数。\n\
         3. 在“评分理由”中，清晰、具体地解释给出该分数的原因，引用“总结内容”中的相关表述，并结合“原始报告内容”进行对比佐证。\n\n\
         请提供详细评分，并严格按照上述格式输出（确保每个维度的评分都以 'X/{dim_max}' 的形式给出，总评分行也请填写）。",
        criteria = scoring_criteria(),
        dim_max = MAX_DIMENSION_SCORE,
    );
    vec![ChatMessage::system(SCORING_SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Messages asking for a summary of one section; the template is used as a prefix.
pub fn summary_messages(template: &str, title: &str, content: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
        ChatMessage::user(format!("{template}{title}\n{content}")),
    ]
}
