use chrono::{DateTime, Duration, Utc};

use crate::{ChatMessage, Role};

/// A message as replayed into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&ChatMessage> for ChatTurn {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Time window and size cap applied to a user's chat log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub hours: i64,
    pub max_messages: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            hours: 24,
            max_messages: 10,
        }
    }
}

impl HistoryWindow {
    pub fn new(hours: i64, max_messages: usize) -> Self {
        Self {
            hours,
            max_messages,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.hours)
    }

    /// Messages inside the window, oldest first.
    pub fn recent(&self, messages: &[ChatMessage], now: DateTime<Utc>) -> Vec<ChatMessage> {
        let cutoff = self.cutoff(now);
        let mut recent: Vec<ChatMessage> = messages
            .iter()
            .filter(|message| message.created_at >= cutoff)
            .cloned()
            .collect();
        recent.sort_by_key(|message| message.created_at);
        recent
    }

    /// The newest `max_messages` of the window, in chronological order.
    /// Older messages inside the window are left out of the context.
    pub fn for_context(&self, messages: &[ChatMessage], now: DateTime<Utc>) -> Vec<ChatTurn> {
        let recent = self.recent(messages, now);
        let skip = recent.len().saturating_sub(self.max_messages);
        recent.iter().skip(skip).map(ChatTurn::from).collect()
    }
}

/// Renders the last `limit` turns as `Role: content` lines.
pub fn format_turns(turns: &[ChatTurn], limit: usize) -> Option<String> {
    if turns.is_empty() {
        return None;
    }
    let skip = turns.len().saturating_sub(limit);
    let lines: Vec<String> = turns
        .iter()
        .skip(skip)
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn message_at(role: Role, content: &str, created_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            role,
            content: content.to_string(),
            created_at,
        }
    }

    #[test]
    fn should_drop_messages_older_than_window() {
        let now = Utc::now();
        let messages = vec![
            message_at(Role::User, "old", now - Duration::hours(25)),
            message_at(Role::User, "fresh", now - Duration::hours(1)),
        ];

        let recent = HistoryWindow::default().recent(&messages, now);

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "fresh");
    }

    #[test]
    fn should_sort_recent_messages_chronologically() {
        let now = Utc::now();
        let messages = vec![
            message_at(Role::Assistant, "second", now - Duration::minutes(1)),
            message_at(Role::User, "first", now - Duration::minutes(2)),
        ];

        let recent = HistoryWindow::default().recent(&messages, now);

        assert_eq!(recent[0].content, "first");
        assert_eq!(recent[1].content, "second");
    }

    #[test]
    fn should_keep_newest_messages_for_context() {
        let now = Utc::now();
        let messages: Vec<ChatMessage> = (0..15)
            .map(|i| message_at(Role::User, &format!("m{i}"), now - Duration::minutes(15 - i)))
            .collect();

        let turns = HistoryWindow::new(24, 10).for_context(&messages, now);

        assert_eq!(turns.len(), 10);
        assert_eq!(turns[0].content, "m5");
        assert_eq!(turns[9].content, "m14");
    }

    #[test]
    fn should_format_turns_with_capitalized_roles() {
        let turns = vec![
            ChatTurn {
                role: Role::User,
                content: "What is in the report?".to_string(),
            },
            ChatTurn {
                role: Role::Assistant,
                content: "Quarterly numbers.".to_string(),
            },
        ];

        let formatted = format_turns(&turns, 10).unwrap();

        assert_eq!(
            formatted,
            "User: What is in the report?\nAssistant: Quarterly numbers."
        );
    }

    #[test]
    fn should_limit_formatted_turns() {
        let turns: Vec<ChatTurn> = (0..12)
            .map(|i| ChatTurn {
                role: Role::User,
                content: format!("q{i}"),
            })
            .collect();

        let formatted = format_turns(&turns, 10).unwrap();

        assert!(formatted.starts_with("User: q2\n"));
        assert!(formatted.ends_with("User: q11"));
    }

    #[test]
    fn should_return_none_for_empty_history() {
        assert_eq!(format_turns(&[], 10), None);
    }
}
