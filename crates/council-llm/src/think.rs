//! Streaming splitter for inline `<think>` reasoning
//!
//! Some backends put reasoning into the reply text wrapped in
//! `<think>...</think>`. Tags may be split across stream chunks, so a
//! possible tag prefix at the end of a chunk is held back until the next
//! chunk decides it.

use crate::types::Delta;

const OPEN: &str = "<think>";
const CLOSE: &str = "</think>";

/// A run of text of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The text
    pub text: String,
    /// Whether it was inside a think block
    pub thought: bool,
}

/// Incremental `<think>` tag parser
#[derive(Debug, Default)]
pub struct ThinkTagParser {
    pending: String,
    in_thought: bool,
}

impl ThinkTagParser {
    /// Parser positioned outside any think block
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return the segments it completes
    pub fn feed(&mut self, chunk: &str) -> Vec<Segment> {
        self.pending.push_str(chunk);
        let mut segments = Vec::new();

        loop {
            let tag = if self.in_thought { CLOSE } else { OPEN };

            if let Some(pos) = self.pending.find(tag) {
                self.take(pos, &mut segments);
                self.pending.drain(..tag.len());
                self.in_thought = !self.in_thought;
                continue;
            }

            let held = partial_tag_len(&self.pending, tag);
            self.take(self.pending.len() - held, &mut segments);
            break;
        }

        segments
    }

    /// Release anything held back; call once the stream has ended
    pub fn flush(&mut self) -> Vec<Segment> {
        let mut segments = Vec::new();
        self.take(self.pending.len(), &mut segments);
        segments
    }

    fn take(&mut self, len: usize, segments: &mut Vec<Segment>) {
        if len == 0 {
            return;
        }
        let text: String = self.pending.drain(..len).collect();
        match segments.last_mut() {
            Some(last) if last.thought == self.in_thought => last.text.push_str(&text),
            _ => segments.push(Segment {
                text,
                thought: self.in_thought,
            }),
        }
    }
}

/// Length of the longest proper prefix of `tag` that `text` ends with
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len()).rev().find(|&k| text.ends_with(&tag[..k])).unwrap_or(0)
}

/// Reply and reasoning text accumulated from one streamed text channel
#[derive(Debug, Default)]
pub struct SplitText {
    parser: ThinkTagParser,
    /// Reply text so far
    pub text: String,
    /// Reasoning text so far
    pub thought: String,
}

impl SplitText {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the text channel and return the increments it completes
    pub fn feed(&mut self, chunk: &str) -> Vec<Delta> {
        let segments = self.parser.feed(chunk);
        self.record(segments)
    }

    /// Reasoning delivered on a separate channel
    pub fn push_thought(&mut self, fragment: &str) -> Delta {
        self.thought.push_str(fragment);
        Delta::Thought(fragment.to_owned())
    }

    /// Release text held back by the tag parser
    pub fn flush(&mut self) -> Vec<Delta> {
        let segments = self.parser.flush();
        self.record(segments)
    }

    fn record(&mut self, segments: Vec<Segment>) -> Vec<Delta> {
        segments
            .into_iter()
            .map(|segment| {
                if segment.thought {
                    self.thought.push_str(&segment.text);
                    Delta::Thought(segment.text)
                } else {
                    self.text.push_str(&segment.text);
                    Delta::Text(segment.text)
                }
            })
            .collect()
    }
}

/// Split a complete string into reasoning and reply text
pub fn split_think(text: &str) -> (String, String) {
    let mut parser = ThinkTagParser::new();
    let mut segments = parser.feed(text);
    segments.extend(parser.flush());

    let mut thought = String::new();
    let mut reply = String::new();
    for segment in segments {
        if segment.thought {
            thought.push_str(&segment.text);
        } else {
            reply.push_str(&segment.text);
        }
    }
    (thought, reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, thought: bool) -> Segment {
        Segment {
            text: text.to_owned(),
            thought,
        }
    }

    #[test]
    fn whole_tags_in_one_chunk() {
        let mut parser = ThinkTagParser::new();
        let segments = parser.feed("<think>look at volume</think>放量上涨");

        assert_eq!(segments, vec![seg("look at volume", true), seg("放量上涨", false)]);
    }

    #[test]
    fn tags_split_across_chunks() {
        let mut parser = ThinkTagParser::new();
        let mut segments = Vec::new();

        for chunk in ["<th", "ink>a", "b</thi", "nk>c", "<"] {
            segments.extend(parser.feed(chunk));
        }
        segments.extend(parser.flush());

        assert_eq!(segments, vec![seg("a", true), seg("b", true), seg("c", false), seg("<", false)]);
    }

    #[test]
    fn lone_angle_bracket_is_released_by_next_chunk() {
        let mut parser = ThinkTagParser::new();

        assert_eq!(parser.feed("price <"), vec![seg("price ", false)]);
        assert_eq!(parser.feed(" 10"), vec![seg("< 10", false)]);
    }

    #[test]
    fn unterminated_think_flushes_as_thought() {
        let (thought, reply) = split_think("ok<think>still going");
        assert_eq!(thought, "still going");
        assert_eq!(reply, "ok");
    }
}
