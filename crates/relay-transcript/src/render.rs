//! Render sink abstraction: the append-only live-display channel,
//! separate from persisted state.

use relay_store::{SanitizedResult, UserMessage};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One node appended to the live transcript. Visual presentation is the
/// host's concern; these carry only what a renderer needs.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderNode {
    Separator,
    User(UserMessage),
    /// Announces a streaming text segment; subsequent text-sink updates
    /// belong to it. `label` names the producing agent when known.
    TextStream { label: Option<String> },
    ToolCall { tool_name: String, args: Value },
    ToolResult { tool_name: String, result: SanitizedResult },
    Error { message: String },
}

/// Nested sink for one streaming text segment.
pub trait TextSink: Send {
    fn update(&mut self, delta: &str);
    fn done(&mut self);
}

/// Ordered, append-only output channel for one turn.
pub trait RenderSink: Send {
    fn append(&mut self, node: RenderNode);
    fn text_sink(&mut self) -> Box<dyn TextSink>;
    fn done(&mut self);
}

#[derive(Debug, Default)]
struct BufferedState {
    nodes: Vec<RenderNode>,
    text_segments: Vec<String>,
    closed_segments: usize,
    done: bool,
}

/// In-memory render sink; the test double for the UI channel.
#[derive(Clone, Default)]
pub struct BufferedRenderSink {
    inner: Arc<Mutex<BufferedState>>,
}

impl BufferedRenderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<RenderNode> {
        self.inner.lock().expect("render sink mutex poisoned").nodes.clone()
    }

    pub fn text_segments(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("render sink mutex poisoned")
            .text_segments
            .clone()
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().expect("render sink mutex poisoned").done
    }

    /// True when every streaming text segment has been closed.
    pub fn all_segments_closed(&self) -> bool {
        let state = self.inner.lock().expect("render sink mutex poisoned");
        state.closed_segments == state.text_segments.len()
    }
}

impl RenderSink for BufferedRenderSink {
    fn append(&mut self, node: RenderNode) {
        self.inner
            .lock()
            .expect("render sink mutex poisoned")
            .nodes
            .push(node);
    }

    fn text_sink(&mut self) -> Box<dyn TextSink> {
        let index = {
            let mut state = self.inner.lock().expect("render sink mutex poisoned");
            state.text_segments.push(String::new());
            state.text_segments.len() - 1
        };
        Box::new(BufferedTextSink {
            inner: self.inner.clone(),
            index,
        })
    }

    fn done(&mut self) {
        self.inner.lock().expect("render sink mutex poisoned").done = true;
    }
}

struct BufferedTextSink {
    inner: Arc<Mutex<BufferedState>>,
    index: usize,
}

impl TextSink for BufferedTextSink {
    fn update(&mut self, delta: &str) {
        let mut state = self.inner.lock().expect("render sink mutex poisoned");
        if let Some(segment) = state.text_segments.get_mut(self.index) {
            segment.push_str(delta);
        }
    }

    fn done(&mut self) {
        let mut state = self.inner.lock().expect("render sink mutex poisoned");
        state.closed_segments += 1;
    }
}

/// Streaming substring rewriter: replaces `target` with `replacement`
/// even when the target arrives split across delta boundaries. Holds
/// back output only while the buffer is still a fragment of the target.
#[derive(Debug)]
pub struct TokenReplacer {
    target: String,
    replacement: String,
    buffer: String,
}

impl TokenReplacer {
    pub fn new(target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            replacement: replacement.into(),
            buffer: String::new(),
        }
    }

    pub fn push(&mut self, token: &str) -> String {
        self.buffer.push_str(token);

        if self.buffer.contains(self.target.as_str()) {
            self.buffer = self.buffer.replace(&self.target, &self.replacement);
        }

        let held = self.held_suffix_len();
        let emit_to = self.buffer.len() - held;
        self.buffer.drain(..emit_to).collect()
    }

    /// Release anything still held back at end of stream.
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Length of the longest buffer suffix that is a proper prefix of
    /// the target, i.e. text that might still complete into a match.
    fn held_suffix_len(&self) -> usize {
        let mut held = 0;
        for (end, _) in self.target.char_indices().skip(1) {
            if self.buffer.ends_with(&self.target[..end]) {
                held = end;
            }
        }
        held
    }
}

/// Display label for the producing agent, derived from the
/// `langgraph_node` metadata member: `data_specialist` -> `DataSpecialist`.
pub fn agent_label(metadata: &Value) -> Option<String> {
    let node = metadata.get("langgraph_node")?.as_str()?;
    let label: String = node
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    if label.is_empty() { None } else { Some(label) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffered_sink_records_nodes_and_segments() {
        let mut sink = BufferedRenderSink::new();
        sink.append(RenderNode::Separator);
        let mut text = sink.text_sink();
        text.update("Hel");
        text.update("lo");
        text.done();
        sink.done();

        assert_eq!(sink.nodes(), vec![RenderNode::Separator]);
        assert_eq!(sink.text_segments(), vec!["Hello".to_string()]);
        assert!(sink.all_segments_closed());
        assert!(sink.is_done());
    }

    #[test]
    fn token_replacer_handles_target_split_across_tokens() {
        let mut replacer = TokenReplacer::new("sandbox:data/output", "/images");
        let mut out = String::new();
        out.push_str(&replacer.push("see sandbox:"));
        out.push_str(&replacer.push("data/out"));
        out.push_str(&replacer.push("put/plot.png done"));
        out.push_str(&replacer.flush());

        assert_eq!(out, "see /images/plot.png done");
    }

    #[test]
    fn token_replacer_passes_unrelated_text_through() {
        let mut replacer = TokenReplacer::new("sandbox:data/output", "/images");
        assert_eq!(replacer.push("hello world"), "hello world");
        assert_eq!(replacer.flush(), "");
    }

    #[test]
    fn agent_label_camel_cases_node_name() {
        let metadata = json!({"langgraph_node": "data_specialist"});
        assert_eq!(agent_label(&metadata).as_deref(), Some("DataSpecialist"));
        assert_eq!(agent_label(&json!({})), None);
    }
}
