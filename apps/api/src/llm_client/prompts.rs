// Shared prompt fragments. Each service that needs LLM calls defines its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to every prompt that rewrites candidate material.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Do NOT invent experience, employers, dates, degrees or skills. \
    Only highlight what the master profile states or directly implies. \
    If the profile does not support a claim, leave it out.";

/// Instruction for any output that will be fed to the LaTeX compiler.
pub const LATEX_OUTPUT_INSTRUCTION: &str = "\
    Return ONLY the complete LaTeX document, starting at \\documentclass and ending at \
    \\end{document}. Keep the template's preamble, macros and structure valid. \
    Escape LaTeX special characters (& % $ # _ { } ~ ^) in any text you add. \
    Do NOT wrap the output in markdown code fences.";
