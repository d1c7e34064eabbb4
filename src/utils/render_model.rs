use crate::utils::{
    apply_sections, identifier_label, AssistantMessageDump, ChatReply, ChatTranscript,
    ComparisonSide, ExtraData, OutputNumber, RegenerationComparison, Role, ScoreBadge,
    ScoreEntry, Section, SectionKey,
};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

pub const ERROR_MESSAGE_ID: &str = "error";
pub const REFRESH_MESSAGE_ID: &str = "system-refresh";
pub const TYPING_PLACEHOLDER: &str = "Assistant is typing...";

/// Non-destructive progress display laid over a bubble while the server works.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessingOverlay {
    pub step: Option<String>,
    pub progress: Option<f64>,
}

impl ProcessingOverlay {
    pub fn label(&self) -> String {
        let step = self
            .step
            .as_deref()
            .map(identifier_label)
            .unwrap_or_else(|| "Processing".to_string());
        match self.progress {
            Some(progress) => format!("{} ({}%)", step, progress.clamp(0.0, 100.0).round() as i64),
            None => step,
        }
    }

    pub fn percent(&self) -> f64 {
        self.progress.unwrap_or(0.0).clamp(0.0, 100.0)
    }
}

/// Render-model record for one bubble.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageView {
    pub id: String,
    pub parent_id: Option<String>,
    pub output: Option<OutputNumber>,
    pub role: Role,
    pub text: String,
    pub score: Option<ScoreBadge>,
    pub is_dummy: bool,
    pub hidden: bool,
    pub sections: Vec<Section>,
    pub comparison: Option<RegenerationComparison>,
    pub overlay: Option<ProcessingOverlay>,
    /// Text shown before background processing started replacing it.
    pub original_draft: Option<String>,
    /// Rendered while second-assistant mode was on.
    pub preferable: bool,
}

impl MessageView {
    /// Whether the bubble can carry a "prefer this output" control.
    pub fn is_preferable(&self) -> bool {
        self.preferable
            && self.role == Role::Assistant
            && self.output.is_some()
            && self.parent_id.is_some()
            && !self.is_dummy
    }

    pub fn toggle_section(&mut self, key: SectionKey) {
        if let Some(section) = self.sections.iter_mut().find(|s| s.key == key) {
            section.expanded = !section.expanded;
        }
    }
}

/// Arguments for [`MessageStore::render_message`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    pub id: String,
    pub text: String,
    pub role: Role,
    pub score: Option<f64>,
    pub is_dummy: bool,
    pub parent_id: Option<String>,
    pub output: Option<OutputNumber>,
    pub extra: Option<ExtraData>,
}

impl RenderRequest {
    pub fn new(id: impl Into<String>, text: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            role,
            score: None,
            is_dummy: false,
            parent_id: None,
            output: None,
            extra: None,
        }
    }

    pub fn score(mut self, score: Option<f64>) -> Self {
        self.score = score;
        self
    }

    pub fn dummy(mut self) -> Self {
        self.is_dummy = true;
        self
    }

    pub fn linked(mut self, parent_id: impl Into<String>, output: OutputNumber) -> Self {
        self.parent_id = Some(parent_id.into());
        self.output = Some(output);
        self
    }

    pub fn extra(mut self, extra: ExtraData) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Ordered map of rendered messages. The view is a projection of this store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageStore {
    order: Vec<String>,
    messages: HashMap<String, MessageView>,
    second_assistant: bool,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assistant bubbles created while this is on offer a prefer control.
    pub fn set_second_assistant(&mut self, enabled: bool) {
        self.second_assistant = enabled;
    }

    pub fn get(&self, id: &str) -> Option<&MessageView> {
        self.messages.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MessageView> {
        self.messages.get_mut(id)
    }

    /// Messages in insertion order, including hidden ones.
    pub fn iter(&self) -> impl Iterator<Item = &MessageView> {
        self.order.iter().filter_map(|id| self.messages.get(id))
    }

    pub fn visible(&self) -> Vec<MessageView> {
        self.iter().filter(|m| !m.hidden).cloned().collect()
    }

    /// Upserts a message. Returns `true` when a new bubble was appended.
    pub fn render_message(&mut self, request: RenderRequest) -> bool {
        if let Some(existing) = self.messages.get_mut(&request.id) {
            if existing.text != request.text {
                existing.text = request.text;
            }
            if let Some(score) = request.score {
                let regenerated = existing
                    .score
                    .as_ref()
                    .is_some_and(ScoreBadge::is_regenerated);
                existing.score = Some(ScoreBadge::new(score, regenerated));
            }
            if let Some(extra) = request.extra.as_ref() {
                apply_sections(&mut existing.sections, extra);
            }
            return false;
        }

        let mut sections = Vec::new();
        if let Some(extra) = request.extra.as_ref() {
            apply_sections(&mut sections, extra);
        }

        let view = MessageView {
            id: request.id.clone(),
            parent_id: request.parent_id,
            output: request.output,
            role: request.role,
            text: request.text,
            score: request.score.map(|s| ScoreBadge::new(s, false)),
            is_dummy: request.is_dummy,
            hidden: false,
            sections,
            comparison: None,
            overlay: None,
            original_draft: None,
            preferable: false,
        };
        self.order.push(request.id.clone());
        self.messages.insert(request.id, view);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if self.messages.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }

    /// Appends the optimistic user bubble and the "typing" assistant bubble.
    pub fn push_dummies(&mut self, user_text: &str) -> (String, String) {
        let user_id = format!("dummy-user-{}", Uuid::new_v4());
        let assistant_id = format!("dummy-assistant-{}", Uuid::new_v4());
        self.render_message(RenderRequest::new(&user_id, user_text, Role::User).dummy());
        self.render_message(
            RenderRequest::new(&assistant_id, TYPING_PLACEHOLDER, Role::Assistant).dummy(),
        );
        (user_id, assistant_id)
    }

    pub fn remove_dummies(&mut self) -> usize {
        let dummies: Vec<String> = self
            .iter()
            .filter(|m| m.is_dummy)
            .map(|m| m.id.clone())
            .collect();
        for id in &dummies {
            self.remove(id);
        }
        dummies.len()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.messages.clear();
        self.second_assistant = false;
    }

    /// Upserts the single error bubble.
    pub fn render_error(&mut self, text: impl Into<String>) {
        self.render_message(RenderRequest::new(ERROR_MESSAGE_ID, text, Role::System));
    }

    /// Hides the sibling of the preferred output and makes sure the preferred
    /// one is visible. Returns the id of the hidden sibling, if any.
    pub fn prefer(&mut self, parent_id: &str, output: OutputNumber) -> Option<String> {
        let sibling = output.sibling();
        let mut hidden = None;
        for view in self.messages.values_mut() {
            if view.parent_id.as_deref() != Some(parent_id) {
                continue;
            }
            if view.output == Some(sibling) {
                view.hidden = true;
                hidden = Some(view.id.clone());
            } else if view.output == Some(output) {
                view.hidden = false;
            }
        }
        hidden
    }

    /// Patches badges whose value differs from the fetched one. Returns how
    /// many badges changed.
    pub fn patch_scores(&mut self, scores: &[ScoreEntry]) -> usize {
        let mut changed = 0;
        for entry in scores {
            let (Some(score), Some(view)) = (entry.critic_score, self.messages.get_mut(&entry.id))
            else {
                continue;
            };
            if view.score.as_ref().map(|b| b.score) == Some(score) {
                continue;
            }
            let regenerated = view.score.as_ref().is_some_and(ScoreBadge::is_regenerated);
            view.score = Some(ScoreBadge::new(score, regenerated));
            changed += 1;
        }
        if changed > 0 {
            debug!(changed, "critic scores patched");
        }
        changed
    }

    fn render_assistant(
        &mut self,
        parent_id: &str,
        assistant: &AssistantMessageDump,
        fallback: OutputNumber,
    ) -> OutputNumber {
        let output = assistant.output(fallback);
        let created = self.render_message(
            RenderRequest::new(
                &assistant.id,
                assistant.content.clone().unwrap_or_default(),
                Role::Assistant,
            )
            .score(assistant.critic_score)
            .linked(parent_id, output),
        );
        if created {
            let second_assistant = self.second_assistant;
            if let Some(view) = self.messages.get_mut(&assistant.id) {
                view.preferable = second_assistant;
            }
        }
        output
    }

    /// Renders a fresh reply to a user turn. Returns the assistant bubbles that
    /// need a processing poll.
    pub fn apply_chat_reply(&mut self, reply: &ChatReply) -> Vec<(String, OutputNumber)> {
        self.remove_dummies();

        if let Some(user) = reply.user_message.as_ref() {
            self.render_message(RenderRequest::new(&user.id, &user.content, Role::User));
        }

        let mut to_poll = Vec::new();
        if let Some(first) = reply.assistant_message.as_ref() {
            let output = self.render_assistant(&reply.id, first, OutputNumber::First);
            to_poll.push((first.id.clone(), output));
        }
        if let Some(second) = reply.assistant_message2.as_ref() {
            let output = self.render_assistant(&reply.id, second, OutputNumber::Second);
            to_poll.push((second.id.clone(), output));
        }
        to_poll
    }

    /// Replaces the store's content with a stored transcript. Each turn shows
    /// the preferred output when one was recorded, otherwise every output.
    /// Returns the replayed assistant bubbles the server is still working on.
    pub fn replay_transcript(&mut self, transcript: &ChatTranscript) -> Vec<(String, OutputNumber)> {
        self.clear();
        self.second_assistant = transcript.allow_second_assistant;
        let mut still_updating = Vec::new();
        for turn in &transcript.messages {
            if let Some(user) = turn.user_message.as_ref() {
                self.render_message(RenderRequest::new(&user.id, &user.content, Role::User));
            }

            let outputs = [
                (turn.assistant_message.as_ref(), OutputNumber::First),
                (turn.assistant_message2.as_ref(), OutputNumber::Second),
            ];
            let preferred = turn.preferred_output();
            for (assistant, fallback) in outputs {
                let Some(assistant) = assistant else { continue };
                if preferred.is_some_and(|p| assistant.output(fallback) != p) {
                    continue;
                }
                let output = self.render_assistant(&turn.id, assistant, fallback);
                if assistant.is_updating {
                    still_updating.push((assistant.id.clone(), output));
                }
            }
        }
        still_updating
    }

    /// Switches a bubble's displayed text to one side of its comparison.
    pub fn choose_comparison(&mut self, id: &str, side: ComparisonSide) -> bool {
        let Some(view) = self.messages.get_mut(id) else {
            return false;
        };
        let Some(comparison) = view.comparison.as_mut() else {
            return false;
        };
        comparison.selected = side;
        view.text = comparison.text_for(side).to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assistant(id: &str, output: u8, content: &str) -> AssistantMessageDump {
        AssistantMessageDump {
            id: id.to_string(),
            output_number: Some(output),
            content: Some(content.to_string()),
            search_output: None,
            critic_score: None,
            is_updating: true,
        }
    }

    fn reply(second: bool) -> ChatReply {
        ChatReply {
            id: "p1".to_string(),
            chat_id: Some("c1".to_string()),
            user_message: Some(crate::utils::UserMessageDump {
                id: "u1".to_string(),
                content: "Find me a hotel".to_string(),
            }),
            assistant_message: Some(assistant("a1", 1, "First")),
            assistant_message2: second.then(|| assistant("a2", 2, "Second")),
            preferred_assistant: None,
        }
    }

    #[test]
    fn test_render_same_id_twice_updates_in_place() {
        let mut store = MessageStore::new();
        assert!(store.render_message(RenderRequest::new("m1", "draft", Role::Assistant)));
        assert!(!store.render_message(
            RenderRequest::new("m1", "final", Role::Assistant).score(Some(9.0))
        ));

        assert_eq!(store.iter().count(), 1);
        let view = store.get("m1").unwrap();
        assert_eq!(view.text, "final");
        assert_eq!(view.score, Some(ScoreBadge::new(9.0, false)));
    }

    #[test]
    fn test_dummies_are_removed_before_reply() {
        let mut store = MessageStore::new();
        let (user_id, assistant_id) = store.push_dummies("Find me a hotel");
        assert_eq!(store.get(&assistant_id).unwrap().text, TYPING_PLACEHOLDER);
        assert!(store.get(&user_id).unwrap().is_dummy);

        let to_poll = store.apply_chat_reply(&reply(true));

        assert!(store.get(&user_id).is_none());
        assert!(store.get(&assistant_id).is_none());
        let ids: Vec<_> = store.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "a1", "a2"]);
        assert_eq!(
            to_poll,
            vec![
                ("a1".to_string(), OutputNumber::First),
                ("a2".to_string(), OutputNumber::Second)
            ]
        );
    }

    #[test]
    fn test_prefer_hides_only_the_sibling() {
        let mut store = MessageStore::new();
        store.apply_chat_reply(&reply(true));

        let hidden = store.prefer("p1", OutputNumber::Second);
        assert_eq!(hidden.as_deref(), Some("a1"));
        assert!(store.get("a1").unwrap().hidden);
        assert!(!store.get("a2").unwrap().hidden);

        // Same arguments again is a no-op.
        store.prefer("p1", OutputNumber::Second);
        let visible: Vec<_> = store.visible().into_iter().map(|m| m.id).collect();
        assert_eq!(visible, vec!["u1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn test_single_output_reply_offers_no_prefer_control() {
        let mut store = MessageStore::new();
        store.apply_chat_reply(&reply(false));

        let a1 = store.get("a1").unwrap();
        assert_eq!(a1.output, Some(OutputNumber::First));
        assert!(!a1.is_preferable());
    }

    #[test]
    fn test_prefer_control_fixed_when_bubble_is_created() {
        let mut store = MessageStore::new();
        store.set_second_assistant(true);
        store.apply_chat_reply(&reply(true));
        assert!(store.get("a1").unwrap().is_preferable());
        assert!(store.get("a2").unwrap().is_preferable());

        // Switching the mode off keeps the controls already shown.
        store.set_second_assistant(false);
        store.apply_chat_reply(&reply(true));
        assert!(store.get("a2").unwrap().is_preferable());

        store.clear();
        store.apply_chat_reply(&reply(true));
        assert!(!store.get("a2").unwrap().is_preferable());
    }

    #[test]
    fn test_patch_scores_counts_changes() {
        let mut store = MessageStore::new();
        store.apply_chat_reply(&reply(false));

        let scores = vec![
            ScoreEntry {
                id: "a1".to_string(),
                critic_score: Some(7.0),
            },
            ScoreEntry {
                id: "missing".to_string(),
                critic_score: Some(3.0),
            },
        ];
        assert_eq!(store.patch_scores(&scores), 1);
        assert_eq!(store.patch_scores(&scores), 0);
        assert_eq!(store.get("a1").unwrap().score.as_ref().unwrap().label(), "7");
    }

    #[test]
    fn test_replay_prefers_recorded_output() {
        let mut preferred = reply(true);
        preferred.preferred_assistant = Some(2);
        let transcript = ChatTranscript {
            id: "c1".to_string(),
            allow_second_assistant: true,
            messages: vec![preferred, {
                let mut both = reply(true);
                both.id = "p2".to_string();
                both.user_message.as_mut().unwrap().id = "u2".to_string();
                both.assistant_message.as_mut().unwrap().id = "b1".to_string();
                both.assistant_message2.as_mut().unwrap().id = "b2".to_string();
                both
            }],
        };

        let mut store = MessageStore::new();
        store.render_message(RenderRequest::new("stale", "old", Role::User));
        let updating = store.replay_transcript(&transcript);

        let ids: Vec<_> = store.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "a2", "u2", "b1", "b2"]);
        assert!(store.get("b1").unwrap().is_preferable());
        assert_eq!(
            updating,
            vec![
                ("a2".to_string(), OutputNumber::Second),
                ("b1".to_string(), OutputNumber::First),
                ("b2".to_string(), OutputNumber::Second),
            ]
        );
    }

    #[test]
    fn test_choose_comparison_switches_text() {
        let mut store = MessageStore::new();
        store.render_message(RenderRequest::new("m1", "improved", Role::Assistant));
        store.get_mut("m1").unwrap().comparison = Some(RegenerationComparison::build(
            "original".to_string(),
            "improved".to_string(),
            None,
            None,
        ));

        assert!(store.choose_comparison("m1", ComparisonSide::Original));
        assert_eq!(store.get("m1").unwrap().text, "original");
        assert!(!store.choose_comparison("unknown", ComparisonSide::Original));
    }

    #[test]
    fn test_overlay_label() {
        let overlay = ProcessingOverlay {
            step: Some("evaluating_response".to_string()),
            progress: Some(62.4),
        };
        assert_eq!(overlay.label(), "Evaluating Response (62%)");
        let bare = ProcessingOverlay {
            step: None,
            progress: None,
        };
        assert_eq!(bare.label(), "Processing");
    }
}
