use crate::utils::{format_score, CriticResult, EVALUATION_UNAVAILABLE};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Fixed identity of a collapsible panel under an assistant message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKey {
    NerResult,
    SearchCall,
    SearchResult,
    Thinking,
    CriticResult,
    RegeneratedContent,
    RegeneratedCritic,
}

impl SectionKey {
    pub fn id(self) -> &'static str {
        match self {
            SectionKey::NerResult => "ner-result",
            SectionKey::SearchCall => "search-call",
            SectionKey::SearchResult => "search-result",
            SectionKey::Thinking => "thinking",
            SectionKey::CriticResult => "critic-result",
            SectionKey::RegeneratedContent => "regenerated-content",
            SectionKey::RegeneratedCritic => "regenerated-critic",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionKey::NerResult => "Extracted Preferences",
            SectionKey::SearchCall => "Search Call",
            SectionKey::SearchResult => "Search Results",
            SectionKey::Thinking => "Assistant Reasoning",
            SectionKey::CriticResult => "Critic Evaluation",
            SectionKey::RegeneratedContent => "Regenerated Response",
            SectionKey::RegeneratedCritic => "Regenerated Critic Evaluation",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SectionBody {
    Text(String),
    Critic(CriticView),
}

/// Critic evaluation formatted for display, or the fallback placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum CriticView {
    Scored {
        total: String,
        summary: Option<String>,
        categories: Vec<(String, String)>,
    },
    Unavailable,
}

impl CriticView {
    pub fn from_payload(value: &Value) -> Self {
        match CriticResult::parse(value) {
            Ok(critic) => Self::from_result(&critic),
            Err(e) => {
                warn!(error = %e, "critic payload could not be formatted");
                CriticView::Unavailable
            }
        }
    }

    pub fn from_result(critic: &CriticResult) -> Self {
        CriticView::Scored {
            total: format_score(critic.total_score),
            summary: critic.summary.clone(),
            categories: critic
                .ordered_categories()
                .into_iter()
                .map(|(label, score)| (label, format_score(score)))
                .collect(),
        }
    }

    pub fn placeholder_text() -> &'static str {
        EVALUATION_UNAVAILABLE
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub key: SectionKey,
    pub body: SectionBody,
    pub expanded: bool,
}

impl Section {
    pub fn title(&self) -> &'static str {
        self.key.title()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SearchRecord {
    #[serde(default)]
    pub results: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub num_matches: Option<i64>,
}

/// Optional extras attached to an assistant message. Every field is
/// independently present or absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtraData {
    pub ner_result: Option<Value>,
    pub search_call_result: Option<Value>,
    pub search_result: Option<SearchRecord>,
    pub thinking: Option<String>,
    pub critic_result: Option<Value>,
    pub regenerated_content: Option<String>,
    pub regenerated_critic: Option<Value>,
}

impl ExtraData {
    pub fn is_empty(&self) -> bool {
        self.section_bodies().is_empty()
    }

    /// Bodies for every populated field, in section order.
    pub fn section_bodies(&self) -> Vec<(SectionKey, SectionBody)> {
        let mut bodies = Vec::new();

        if let Some(ner) = present(&self.ner_result) {
            bodies.push((SectionKey::NerResult, SectionBody::Text(format_mapping(ner))));
        }
        if let Some(call) = present(&self.search_call_result) {
            bodies.push((SectionKey::SearchCall, SectionBody::Text(format_value(call))));
        }
        if let Some(results) = self
            .search_result
            .as_ref()
            .and_then(|record| record.results.as_deref())
            .filter(|results| !results.trim().is_empty())
        {
            bodies.push((SectionKey::SearchResult, SectionBody::Text(results.to_string())));
        }
        if let Some(thinking) = self.thinking.as_deref().filter(|t| !t.trim().is_empty()) {
            bodies.push((SectionKey::Thinking, SectionBody::Text(thinking.trim().to_string())));
        }
        if let Some(critic) = present(&self.critic_result) {
            bodies.push((
                SectionKey::CriticResult,
                SectionBody::Critic(CriticView::from_payload(critic)),
            ));
        }
        if let Some(content) = self
            .regenerated_content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        {
            bodies.push((SectionKey::RegeneratedContent, SectionBody::Text(content.to_string())));
        }
        if let Some(critic) = present(&self.regenerated_critic) {
            bodies.push((
                SectionKey::RegeneratedCritic,
                SectionBody::Critic(CriticView::from_payload(critic)),
            ));
        }

        bodies
    }
}

fn present(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| !v.is_null())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Objects render as `key: value` lines, anything else as pretty JSON.
fn format_mapping(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, val)| format!("{}: {}", key, format_value(val)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => format_value(other),
    }
}

/// Ensures exactly one section per populated field. Existing sections keep
/// their expansion state and have only their content replaced; new sections
/// start collapsed.
pub fn apply_sections(sections: &mut Vec<Section>, extra: &ExtraData) {
    for (key, body) in extra.section_bodies() {
        match sections.iter_mut().find(|s| s.key == key) {
            Some(existing) => {
                if existing.body != body {
                    existing.body = body;
                }
            }
            None => sections.push(Section {
                key,
                body,
                expanded: false,
            }),
        }
    }
    sections.sort_by_key(|s| s.key);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonSide {
    Original,
    Improved,
}

/// Side-by-side view of the original reply and the regenerated one.
#[derive(Clone, Debug, PartialEq)]
pub struct RegenerationComparison {
    pub original: String,
    pub improved: String,
    pub original_critic: Option<CriticView>,
    pub improved_critic: Option<CriticView>,
    pub selected: ComparisonSide,
}

impl RegenerationComparison {
    /// Score tables are attached only when both critiques are available.
    pub fn build(
        original: String,
        improved: String,
        original_critic: Option<&Value>,
        improved_critic: Option<&Value>,
    ) -> Self {
        let (original_critic, improved_critic) = match (
            original_critic.filter(|v| !v.is_null()),
            improved_critic.filter(|v| !v.is_null()),
        ) {
            (Some(a), Some(b)) => (
                Some(CriticView::from_payload(a)),
                Some(CriticView::from_payload(b)),
            ),
            _ => (None, None),
        };

        Self {
            original,
            improved,
            original_critic,
            improved_critic,
            selected: ComparisonSide::Improved,
        }
    }

    pub fn text_for(&self, side: ComparisonSide) -> &str {
        match side {
            ComparisonSide::Original => &self.original,
            ComparisonSide::Improved => &self.improved,
        }
    }
}
