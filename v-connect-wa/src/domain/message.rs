use serde::{Deserialize, Serialize};

/// 协议层消息负载（多态）/ Protocol-level message payload (polymorphic)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        #[serde(default)]
        caption: Option<String>,
    },
    Audio {
        #[serde(default)]
        voice_note: bool,
    },
    Document {
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        caption: Option<String>,
    },
    Sticker,
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        name: Option<String>,
    },
    LiveLocation {
        latitude: f64,
        longitude: f64,
    },
    Contact {
        display_name: String,
    },
    ContactList {
        count: usize,
    },
    Reaction {
        emoji: String,
    },
    Poll {
        question: String,
    },
    #[serde(other)]
    Unknown,
}

fn with_caption(tag: &str, caption: &Option<String>) -> String {
    match caption.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => format!("{} {}", tag, c),
        _ => tag.to_string(),
    }
}

impl MessageContent {
    /// 文本渲染 / Textual rendering
    pub fn render(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Image { caption } => with_caption("[Image]", caption),
            MessageContent::Video { caption } => with_caption("[Video]", caption),
            MessageContent::Audio { voice_note: true } => "[Voice message]".to_string(),
            MessageContent::Audio { voice_note: false } => "[Audio]".to_string(),
            MessageContent::Document { file_name, caption } => {
                let mut out = with_caption("[Document]", file_name);
                if let Some(c) = caption.as_deref().filter(|c| !c.trim().is_empty()) {
                    out.push_str(" - ");
                    out.push_str(c.trim());
                }
                out
            }
            MessageContent::Sticker => "[Sticker]".to_string(),
            MessageContent::Location {
                latitude,
                longitude,
                name,
            } => match name.as_deref().filter(|n| !n.is_empty()) {
                Some(n) => format!("[Location] {} ({}, {})", n, latitude, longitude),
                None => format!("[Location] ({}, {})", latitude, longitude),
            },
            MessageContent::LiveLocation {
                latitude,
                longitude,
            } => format!("[Live location] ({}, {})", latitude, longitude),
            MessageContent::Contact { display_name } => format!("[Contact] {}", display_name),
            MessageContent::ContactList { count } => format!("[Contacts] {} contacts", count),
            MessageContent::Reaction { emoji } => format!("[Reaction] {}", emoji),
            MessageContent::Poll { question } => format!("[Poll] {}", question),
            MessageContent::Unknown => "[Unsupported message]".to_string(),
        }
    }
}

/// 对外发出的标准化消息 / Normalized message emitted outward
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// 网络分配的消息ID，重试间保持稳定 / Network-assigned id, stable across retries
    pub id: String,
    pub instance_id: String,
    pub from_me: bool,
    pub remote_jid: String,
    /// 仅知道隐私标识时为 false / false when only the privacy-preserving id is known
    pub remote_resolved: bool,
    pub body: String,
    /// 秒级时间戳 / Epoch seconds
    pub timestamp: i64,
    pub historical: bool,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_variants() {
        assert_eq!(MessageContent::Text { text: "hi".into() }.render(), "hi");
        assert_eq!(MessageContent::Image { caption: None }.render(), "[Image]");
        assert_eq!(
            MessageContent::Image { caption: Some("menu".into()) }.render(),
            "[Image] menu"
        );
        assert_eq!(MessageContent::Audio { voice_note: true }.render(), "[Voice message]");
        assert_eq!(
            MessageContent::Document {
                file_name: Some("invoice.pdf".into()),
                caption: Some("march".into())
            }
            .render(),
            "[Document] invoice.pdf - march"
        );
        assert_eq!(
            MessageContent::Location {
                latitude: -23.5,
                longitude: -46.25,
                name: Some("Office".into())
            }
            .render(),
            "[Location] Office (-23.5, -46.25)"
        );
        assert_eq!(MessageContent::ContactList { count: 3 }.render(), "[Contacts] 3 contacts");
    }

    #[test]
    fn test_unknown_kind_deserializes() {
        let content: MessageContent =
            serde_json::from_value(serde_json::json!({"type": "payment_request"})).unwrap();
        assert_eq!(content, MessageContent::Unknown);
        assert_eq!(content.render(), "[Unsupported message]");
    }
}
