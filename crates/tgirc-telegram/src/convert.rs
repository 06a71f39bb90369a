//! teloxide `Message` to bridge events.

use teloxide::types::{Message, User};

use tgirc_core::{
    domain::{ChatId, MessageId},
    events::{Attachment, Origin, ServiceEvent, TelegramMessage, TelegramUser},
};

/// Convert one update into bridge messages.
///
/// Usually one; a "members joined" update becomes one message per member.
/// Updates without a sender (channel posts) are dropped.
pub fn to_events(msg: &Message) -> Vec<TelegramMessage> {
    let Some(from) = msg.from() else {
        return Vec::new();
    };

    let base = TelegramMessage {
        chat: ChatId(msg.chat.id.0),
        id: MessageId(msg.id.0),
        timestamp: msg.date.timestamp(),
        sender: user(from),
        text: msg.text().unwrap_or_default().to_string(),
        caption: msg.caption().unwrap_or_default().to_string(),
        attachment: attachment(msg),
        origin: origin(msg),
        service: None,
    };

    if let Some(members) = msg.new_chat_members() {
        return members
            .iter()
            .map(|m| TelegramMessage {
                service: Some(ServiceEvent::Joined(user(m))),
                ..base.clone()
            })
            .collect();
    }

    let service = msg
        .left_chat_member()
        .map(|m| ServiceEvent::Left(user(m)))
        .or_else(|| {
            msg.new_chat_title()
                .map(|t| ServiceEvent::TitleChanged(t.to_string()))
        });
    vec![TelegramMessage { service, ..base }]
}

/// Username without `@`, or the first name for users without one.
pub fn user(u: &User) -> TelegramUser {
    let name = match u.username.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => u.first_name.clone(),
    };
    TelegramUser::new(u.id.0 as i64, name)
}

fn attachment(msg: &Message) -> Option<Attachment> {
    if let Some(sizes) = msg.photo() {
        // Sizes are ordered smallest first.
        let best = sizes.last()?;
        return Some(Attachment::Photo {
            file_id: best.file.id.clone(),
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(Attachment::Sticker {
            file_id: sticker.file.id.clone(),
        });
    }
    if msg.audio().is_some() || msg.voice().is_some() {
        return Some(Attachment::Audio);
    }
    if msg.video().is_some() || msg.video_note().is_some() {
        return Some(Attachment::Video);
    }
    if let Some(doc) = msg.document() {
        return Some(Attachment::Document {
            file_id: doc.file.id.clone(),
            mime: doc
                .mime_type
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        });
    }
    if let Some(loc) = msg.location() {
        return Some(Attachment::Location {
            latitude: loc.latitude,
            longitude: loc.longitude,
        });
    }
    if let Some(c) = msg.contact() {
        return Some(Attachment::Contact {
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone().unwrap_or_default(),
            phone: c.phone_number.clone(),
        });
    }
    None
}

fn origin(msg: &Message) -> Option<Origin> {
    if let Some(date) = msg.forward_date() {
        let sender = match (msg.forward_from_user(), msg.forward_from_sender_name()) {
            (Some(u), _) => user(u),
            (None, Some(name)) => TelegramUser::new(0, name),
            (None, None) => {
                let title = msg
                    .forward_from_chat()
                    .and_then(|c| c.title())
                    .unwrap_or("unknown");
                TelegramUser::new(0, title)
            }
        };
        return Some(Origin::Forward {
            sender,
            timestamp: date.timestamp(),
        });
    }

    let parent = msg.reply_to_message()?;
    let sender = parent.from().map(user)?;
    Some(Origin::Reply {
        id: MessageId(parent.id.0),
        timestamp: parent.date.timestamp(),
        sender,
        text: parent
            .text()
            .or_else(|| parent.caption())
            .unwrap_or_default()
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> Message {
        serde_json::from_value(v).unwrap()
    }

    fn chat() -> serde_json::Value {
        json!({"id": -100123, "type": "supergroup", "title": "General"})
    }

    fn alice() -> serde_json::Value {
        json!({"id": 42, "is_bot": false, "first_name": "Alice", "username": "alice"})
    }

    #[test]
    fn text_message() {
        let msg = parse(json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": chat(),
            "from": alice(),
            "text": "hello"
        }));
        let events = to_events(&msg);
        assert_eq!(
            events,
            vec![TelegramMessage::text(
                ChatId(-100123),
                7,
                1_700_000_000,
                TelegramUser::new(42, "alice"),
                "hello"
            )]
        );
    }

    #[test]
    fn first_name_when_no_username() {
        let msg = parse(json!({
            "message_id": 1,
            "date": 1,
            "chat": chat(),
            "from": {"id": 5, "is_bot": false, "first_name": "Bob"},
            "text": "hi"
        }));
        assert_eq!(to_events(&msg)[0].sender.username, "Bob");
    }

    #[test]
    fn photo_uses_largest_size_and_caption() {
        let msg = parse(json!({
            "message_id": 1,
            "date": 1,
            "chat": chat(),
            "from": alice(),
            "caption": "look",
            "photo": [
                {"file_id": "small", "file_unique_id": "s", "width": 90, "height": 90},
                {"file_id": "big", "file_unique_id": "b", "width": 800, "height": 800}
            ]
        }));
        let ev = &to_events(&msg)[0];
        assert!(ev.text.is_empty());
        assert_eq!(ev.caption, "look");
        assert_eq!(
            ev.attachment,
            Some(Attachment::Photo {
                file_id: "big".to_string()
            })
        );
    }

    #[test]
    fn one_event_per_joined_member() {
        let msg = parse(json!({
            "message_id": 1,
            "date": 1,
            "chat": chat(),
            "from": alice(),
            "new_chat_members": [
                {"id": 8, "is_bot": false, "first_name": "C", "username": "carol"},
                {"id": 9, "is_bot": false, "first_name": "D", "username": "dave"}
            ]
        }));
        let events = to_events(&msg);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].service,
            Some(ServiceEvent::Joined(TelegramUser::new(9, "dave")))
        );
    }

    #[test]
    fn left_member_is_the_subject() {
        let msg = parse(json!({
            "message_id": 1,
            "date": 1,
            "chat": chat(),
            "from": alice(),
            "left_chat_member": {"id": 9, "is_bot": false, "first_name": "D", "username": "dave"}
        }));
        assert_eq!(
            to_events(&msg)[0].service,
            Some(ServiceEvent::Left(TelegramUser::new(9, "dave")))
        );
    }

    #[test]
    fn reply_origin() {
        let msg = parse(json!({
            "message_id": 2,
            "date": 20,
            "chat": chat(),
            "from": alice(),
            "text": "agreed",
            "reply_to_message": {
                "message_id": 1,
                "date": 10,
                "chat": chat(),
                "from": {"id": 9, "is_bot": false, "first_name": "D", "username": "dave"},
                "text": "pizza?"
            }
        }));
        assert_eq!(
            to_events(&msg)[0].origin,
            Some(Origin::Reply {
                id: MessageId(1),
                timestamp: 10,
                sender: TelegramUser::new(9, "dave"),
                text: "pizza?".to_string(),
            })
        );
    }

    #[test]
    fn location_attachment() {
        let msg = parse(json!({
            "message_id": 1,
            "date": 1,
            "chat": chat(),
            "from": alice(),
            "location": {"latitude": 60.1699, "longitude": 24.9384}
        }));
        let ev = &to_events(&msg)[0];
        assert!(ev.text.is_empty());
        assert_eq!(
            ev.attachment,
            Some(Attachment::Location {
                latitude: 60.1699,
                longitude: 24.9384
            })
        );
    }
}
