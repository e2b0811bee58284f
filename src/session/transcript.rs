use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which party produced a stretch of speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Candidate,
    Agent,
}

/// One finished turn (or interrupted fragment) of the conversation.
///
/// Immutable once appended; ordering is append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub interrupted: bool,
}

/// Accumulates streaming partial fragments into discrete transcript
/// entries.
///
/// Fragments for the current candidate turn and current agent turn
/// build up in separate buffers. A turn-boundary signal commits both
/// non-empty buffers; an interruption commits the agent's in-progress
/// buffer immediately so no spoken content is silently dropped.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    candidate_buffer: String,
    agent_buffer: String,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a streaming fragment to the speaker's in-progress turn.
    pub fn push_partial(&mut self, speaker: Speaker, text: &str) {
        match speaker {
            Speaker::Candidate => self.candidate_buffer.push_str(text),
            Speaker::Agent => self.agent_buffer.push_str(text),
        }
    }

    /// Turn boundary: commit both non-empty buffers as entries.
    pub fn complete_turn(&mut self) {
        self.commit(Speaker::Candidate, false);
        self.commit(Speaker::Agent, false);
    }

    /// Interruption: commit the agent's in-progress buffer, marked
    /// interrupted, so the cut-off utterance is preserved.
    pub fn interrupt_agent(&mut self) {
        self.commit(Speaker::Agent, true);
    }

    fn commit(&mut self, speaker: Speaker, interrupted: bool) {
        let buffer = match speaker {
            Speaker::Candidate => &mut self.candidate_buffer,
            Speaker::Agent => &mut self.agent_buffer,
        };

        let text = buffer.trim().to_string();
        buffer.clear();

        // Empty buffers are never appended
        if text.is_empty() {
            return;
        }

        self.entries.push(TranscriptEntry {
            speaker,
            text,
            timestamp: Utc::now(),
            interrupted,
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Final flush: trailing partial utterances become entries before
    /// the transcript is sealed.
    pub fn finish(mut self) -> Vec<TranscriptEntry> {
        self.complete_turn();
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_accumulate_until_turn_boundary() {
        let mut assembler = TranscriptAssembler::new();

        assembler.push_partial(Speaker::Candidate, "I would use ");
        assembler.push_partial(Speaker::Candidate, "a hash map");
        assert!(assembler.entries().is_empty());

        assembler.complete_turn();

        let entries = assembler.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "I would use a hash map");
        assert_eq!(entries[0].speaker, Speaker::Candidate);
        assert!(!entries[0].interrupted);
    }

    #[test]
    fn test_empty_buffers_are_never_appended() {
        let mut assembler = TranscriptAssembler::new();

        assembler.complete_turn();
        assembler.push_partial(Speaker::Agent, "   ");
        assembler.complete_turn();
        assembler.interrupt_agent();

        assert!(assembler.entries().is_empty());
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn test_interruption_marks_agent_entry() {
        let mut assembler = TranscriptAssembler::new();

        assembler.push_partial(Speaker::Agent, "Let me explain the next");
        assembler.interrupt_agent();

        let entries = assembler.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].speaker, Speaker::Agent);
        assert!(entries[0].interrupted);

        // Buffer was cleared by the commit
        assembler.interrupt_agent();
        assert_eq!(assembler.entries().len(), 1);
    }

    #[test]
    fn test_entries_preserve_append_order() {
        let mut assembler = TranscriptAssembler::new();

        assembler.push_partial(Speaker::Agent, "First question");
        assembler.complete_turn();
        assembler.push_partial(Speaker::Candidate, "First answer");
        assembler.complete_turn();
        assembler.push_partial(Speaker::Agent, "Second question");
        assembler.complete_turn();

        let texts: Vec<&str> = assembler
            .entries()
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["First question", "First answer", "Second question"]
        );

        for pair in assembler.entries().windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_finish_flushes_trailing_partials() {
        let mut assembler = TranscriptAssembler::new();

        assembler.push_partial(Speaker::Candidate, "I was about to say");
        assembler.push_partial(Speaker::Agent, "And I was mid-");

        let entries = assembler.finish();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "I was about to say");
        assert_eq!(entries[1].text, "And I was mid-");
    }
}
