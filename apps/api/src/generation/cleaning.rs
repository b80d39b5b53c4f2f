//! Text cleaning for model output.
//!
//! Models like to wrap answers in markdown even when told not to. Each
//! `CleanStep` removes one kind of decoration; callers pick the steps that are
//! safe for the format they expect.

/// Info strings accepted after an opening fence.
const FENCE_LANGUAGES: &[&str] = &["latex", "json", "text", "tex", "md"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanStep {
    /// Removes an opening ```` ```lang ```` fence and a closing ```` ``` ````.
    StripFences,
    /// Removes `**` bold markers.
    StripBold,
    /// Drops markdown heading lines (`# `, `## `, ... up to six hashes).
    DropHeadings,
}

/// Steps for LaTeX sources. `**` is left alone.
pub const LATEX_STEPS: &[CleanStep] = &[CleanStep::StripFences, CleanStep::DropHeadings];

/// Steps for plain-text output such as the recruiter message.
pub const PLAIN_TEXT_STEPS: &[CleanStep] = &[
    CleanStep::StripFences,
    CleanStep::StripBold,
    CleanStep::DropHeadings,
];

/// Steps for JSON answers.
pub const JSON_STEPS: &[CleanStep] = &[CleanStep::StripFences];

impl CleanStep {
    pub fn apply(self, text: &str) -> String {
        match self {
            CleanStep::StripFences => strip_fences(text).to_string(),
            CleanStep::StripBold => text.replace("**", ""),
            CleanStep::DropHeadings => drop_headings(text),
        }
    }
}

/// Runs `steps` in order and trims the result.
pub fn clean(text: &str, steps: &[CleanStep]) -> String {
    let cleaned = steps
        .iter()
        .fold(text.trim().to_string(), |acc, step| step.apply(&acc));
    cleaned.trim().to_string()
}

/// Strips ```` ```latex ... ``` ```` or ```` ``` ... ``` ```` code fences.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(mut inner) = text.strip_prefix("```") else {
        return text;
    };

    for lang in FENCE_LANGUAGES {
        if let Some(rest) = strip_prefix_ignore_case(inner, lang) {
            inner = rest;
            break;
        }
    }

    let inner = inner.trim_start();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &text[prefix.len()..];
    // ```texture is not a fence language, it is content
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

fn drop_headings(text: &str) -> String {
    text.lines()
        .filter(|line| !is_heading(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ')
}
