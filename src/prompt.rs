//! Prompt resolution.
//!
//! Requests may omit the prompt; the default describes a fashion product
//! shot, which is what the image routes are used for.

pub const DEFAULT_PROMPT: &str = "Professional fashion photography of a model wearing the garment, \
studio lighting, clean neutral background, high detail, 4k";

/// Trimmed caller prompt, or [`DEFAULT_PROMPT`] when absent or blank.
pub fn resolve_prompt(prompt: Option<&str>) -> String {
    prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_default_for_missing_or_blank() {
        assert_eq!(resolve_prompt(None), DEFAULT_PROMPT);
        assert_eq!(resolve_prompt(Some("   ")), DEFAULT_PROMPT);
        assert_eq!(resolve_prompt(Some(" red sneaker ")), "red sneaker");
    }
}
