use regex::Regex;
use std::sync::OnceLock;

/// Assistant text with its embedded search-output blocks pulled out.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedContent {
    pub display_text: String,
    pub search_outputs: Vec<String>,
}

fn search_output_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<search_output>([\s\S]*?)</search_output>").ok())
        .as_ref()
}

/// Splits `<search_output>...</search_output>` segments out of an assistant
/// message. Blocks are returned trimmed, in order of appearance.
pub fn extract_search_outputs(text: &str) -> ExtractedContent {
    let Some(re) = search_output_regex() else {
        return ExtractedContent {
            display_text: text.trim().to_string(),
            search_outputs: Vec::new(),
        };
    };

    let search_outputs = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect();

    let display_text = re.replace_all(text, "").trim().to_string();

    ExtractedContent {
        display_text,
        search_outputs,
    }
}

/// `clarity_and_conciseness` -> `Clarity And Conciseness`
pub fn identifier_label(identifier: &str) -> String {
    identifier
        .split(|c| c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text for a "Show X" / "Hide X" toggle.
pub fn toggle_label(expanded: bool, title: &str) -> String {
    if expanded {
        format!("Hide {}", title)
    } else {
        format!("Show {}", title)
    }
}
