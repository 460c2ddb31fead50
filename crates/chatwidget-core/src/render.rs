//! Projection of the transcript into displayable bubbles.
//!
//! Text is shown line for line with no markdown interpretation. Scrolling is
//! left to the front end.

use crate::state::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    User,
    Model,
    /// Transient placeholder while a reply is pending
    Thinking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub kind: BubbleKind,
    pub label: &'static str,
    pub lines: Vec<String>,
}

pub const THINKING_TEXT: &str = "Thinking";

/// Split on `\n` only, so blank lines and trailing newlines survive.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

fn bubble_for(message: &Message) -> Bubble {
    let kind = match message.role {
        Role::User => BubbleKind::User,
        Role::Model => BubbleKind::Model,
    };

    Bubble {
        kind,
        label: message.role.display_name(),
        lines: split_lines(&message.text()),
    }
}

pub fn project(transcript: &[Message], busy: bool) -> Vec<Bubble> {
    let mut bubbles: Vec<Bubble> = transcript.iter().map(bubble_for).collect();

    if busy {
        bubbles.push(Bubble {
            kind: BubbleKind::Thinking,
            label: Role::Model.display_name(),
            lines: vec![THINKING_TEXT.to_string()],
        });
    }

    bubbles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Part;

    #[test]
    fn one_bubble_per_message_in_order() {
        let transcript = vec![Message::model("hi"), Message::user("Hello")];
        let bubbles = project(&transcript, false);

        assert_eq!(bubbles.len(), 2);
        assert_eq!(bubbles[0].kind, BubbleKind::Model);
        assert_eq!(bubbles[0].label, "Gemini");
        assert_eq!(bubbles[1].kind, BubbleKind::User);
        assert_eq!(bubbles[1].label, "You");
    }

    #[test]
    fn lines_are_literal_and_keep_blanks() {
        let transcript = vec![Message::model("**bold**\n\n  indented\n")];
        let bubbles = project(&transcript, false);
        assert_eq!(
            bubbles[0].lines,
            vec!["**bold**", "", "  indented", ""]
        );
    }

    #[test]
    fn parts_are_joined_before_splitting() {
        let transcript = vec![Message {
            role: Role::Model,
            parts: vec![Part { text: "a".into() }, Part { text: "b\nc".into() }],
        }];
        assert_eq!(project(&transcript, false)[0].lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn busy_appends_thinking_placeholder_only_in_projection() {
        let transcript = vec![Message::model("hi"), Message::user("Hello")];
        let bubbles = project(&transcript, true);

        assert_eq!(bubbles.len(), 3);
        let last = bubbles.last().unwrap();
        assert_eq!(last.kind, BubbleKind::Thinking);
        assert_eq!(last.label, "Gemini");
        assert_eq!(transcript.len(), 2);
    }
}
