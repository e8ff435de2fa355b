//! Classification of an envelope into a dispatch route.
//!
//! `MsgType` selects the route; when it is `event`, the `Event` tag selects
//! it instead. Tags compare ASCII case-insensitively since the platform has
//! used both `SCAN` and `scan` over time.
//!
//! One tag is ambiguous on its own: `subscribe` is sent both for a plain
//! follow and for a follow through a parameterized QR code. The latter
//! carries a `Ticket`, and is routed as [`EventType::QrSubscribe`].

use crate::message::MessageEnvelope;

/// Non-event message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    Voice,
    Video,
    ShortVideo,
    Location,
    Link,
    File,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        MessageKind::Text,
        MessageKind::Image,
        MessageKind::Voice,
        MessageKind::Video,
        MessageKind::ShortVideo,
        MessageKind::Location,
        MessageKind::Link,
        MessageKind::File,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Voice => "voice",
            MessageKind::Video => "video",
            MessageKind::ShortVideo => "shortvideo",
            MessageKind::Location => "location",
            MessageKind::Link => "link",
            MessageKind::File => "file",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(tag))
    }
}

/// Event notifications (`MsgType` = `event`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Subscribe,
    /// `subscribe` carrying a `Ticket`: followed through a QR code.
    QrSubscribe,
    Unsubscribe,
    Scan,
    Location,
    Click,
    View,
    ViewMiniprogram,
    ScanCodePush,
    ScanCodeWaitMsg,
    PicSysPhoto,
    PicPhotoOrAlbum,
    PicWeixin,
    LocationSelect,
    TemplateSendJobFinish,
    MassSendJobFinish,
    KfCreateSession,
    KfCloseSession,
    KfSwitchSession,
    CardPassCheck,
    CardNotPassCheck,
    UserGetCard,
    UserDelCard,
    UserConsumeCard,
    UserViewCard,
    UserEnterSessionFromCard,
    QualificationVerifySuccess,
    QualificationVerifyFail,
}

impl EventType {
    pub const ALL: [EventType; 28] = [
        EventType::Subscribe,
        EventType::QrSubscribe,
        EventType::Unsubscribe,
        EventType::Scan,
        EventType::Location,
        EventType::Click,
        EventType::View,
        EventType::ViewMiniprogram,
        EventType::ScanCodePush,
        EventType::ScanCodeWaitMsg,
        EventType::PicSysPhoto,
        EventType::PicPhotoOrAlbum,
        EventType::PicWeixin,
        EventType::LocationSelect,
        EventType::TemplateSendJobFinish,
        EventType::MassSendJobFinish,
        EventType::KfCreateSession,
        EventType::KfCloseSession,
        EventType::KfSwitchSession,
        EventType::CardPassCheck,
        EventType::CardNotPassCheck,
        EventType::UserGetCard,
        EventType::UserDelCard,
        EventType::UserConsumeCard,
        EventType::UserViewCard,
        EventType::UserEnterSessionFromCard,
        EventType::QualificationVerifySuccess,
        EventType::QualificationVerifyFail,
    ];

    /// Wire tag. [`EventType::QrSubscribe`] shares `subscribe`.
    pub fn tag(&self) -> &'static str {
        match self {
            EventType::Subscribe | EventType::QrSubscribe => "subscribe",
            EventType::Unsubscribe => "unsubscribe",
            EventType::Scan => "SCAN",
            EventType::Location => "LOCATION",
            EventType::Click => "CLICK",
            EventType::View => "VIEW",
            EventType::ViewMiniprogram => "view_miniprogram",
            EventType::ScanCodePush => "scancode_push",
            EventType::ScanCodeWaitMsg => "scancode_waitmsg",
            EventType::PicSysPhoto => "pic_sysphoto",
            EventType::PicPhotoOrAlbum => "pic_photo_or_album",
            EventType::PicWeixin => "pic_weixin",
            EventType::LocationSelect => "location_select",
            EventType::TemplateSendJobFinish => "TEMPLATESENDJOBFINISH",
            EventType::MassSendJobFinish => "MASSSENDJOBFINISH",
            EventType::KfCreateSession => "kf_create_session",
            EventType::KfCloseSession => "kf_close_session",
            EventType::KfSwitchSession => "kf_switch_session",
            EventType::CardPassCheck => "card_pass_check",
            EventType::CardNotPassCheck => "card_not_pass_check",
            EventType::UserGetCard => "user_get_card",
            EventType::UserDelCard => "user_del_card",
            EventType::UserConsumeCard => "user_consume_card",
            EventType::UserViewCard => "user_view_card",
            EventType::UserEnterSessionFromCard => "user_enter_session_from_card",
            EventType::QualificationVerifySuccess => "qualification_verify_success",
            EventType::QualificationVerifyFail => "qualification_verify_fail",
        }
    }

    /// Resolve a tag, using `has_ticket` to split `subscribe`.
    pub fn from_tag(tag: &str, has_ticket: bool) -> Option<Self> {
        if tag.eq_ignore_ascii_case("subscribe") {
            return Some(if has_ticket {
                EventType::QrSubscribe
            } else {
                EventType::Subscribe
            });
        }

        Self::ALL
            .into_iter()
            .filter(|event| !matches!(event, EventType::Subscribe | EventType::QrSubscribe))
            .find(|event| event.tag().eq_ignore_ascii_case(tag))
    }
}

/// Dispatch key: one per concrete payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Message(MessageKind),
    Event(EventType),
}

impl Route {
    /// Every route the classifier can produce.
    pub fn all() -> impl Iterator<Item = Route> {
        MessageKind::ALL
            .into_iter()
            .map(Route::Message)
            .chain(EventType::ALL.into_iter().map(Route::Event))
    }

    /// `(MsgType, Event)` tag pair this route answers to.
    pub fn tags(&self) -> (&'static str, Option<&'static str>) {
        match self {
            Route::Message(kind) => (kind.tag(), None),
            Route::Event(event) => ("event", Some(event.tag())),
        }
    }
}

/// Why an envelope did not classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationMiss {
    UnknownMsgType(String),
    MissingEvent,
    UnknownEvent(String),
}

/// Resolve the route for `envelope`.
pub fn classify(envelope: &MessageEnvelope) -> Result<Route, ClassificationMiss> {
    if !envelope.is_event() {
        return MessageKind::from_tag(&envelope.msg_type)
            .map(Route::Message)
            .ok_or_else(|| ClassificationMiss::UnknownMsgType(envelope.msg_type.clone()));
    }

    let tag = match envelope.event.as_deref() {
        Some(tag) if !tag.is_empty() => tag,
        _ => return Err(ClassificationMiss::MissingEvent),
    };

    let has_ticket = envelope
        .ticket
        .as_deref()
        .map(|ticket| !ticket.is_empty())
        .unwrap_or(false);

    EventType::from_tag(tag, has_ticket)
        .map(Route::Event)
        .ok_or_else(|| ClassificationMiss::UnknownEvent(tag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(msg_type: &str, event: Option<&str>) -> MessageEnvelope {
        MessageEnvelope {
            msg_type: msg_type.to_string(),
            event: event.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_messages() {
        for kind in MessageKind::ALL {
            assert_eq!(
                classify(&envelope(kind.tag(), None)),
                Ok(Route::Message(kind))
            );
        }
    }

    #[test]
    fn test_classify_events() {
        for event in EventType::ALL {
            let mut env = envelope("event", Some(event.tag()));
            if event == EventType::QrSubscribe {
                env.ticket = Some("gQH47joAAAAAAAAAASxodHRw".to_string());
            }
            assert_eq!(classify(&env), Ok(Route::Event(event)), "{:?}", event);
        }
    }

    #[test]
    fn test_subscribe_disambiguated_by_ticket() {
        let mut env = envelope("event", Some("subscribe"));
        assert_eq!(classify(&env), Ok(Route::Event(EventType::Subscribe)));

        env.ticket = Some(String::new());
        assert_eq!(classify(&env), Ok(Route::Event(EventType::Subscribe)));

        env.ticket = Some("ticket".to_string());
        env.event_key = Some("qrscene_123".to_string());
        assert_eq!(classify(&env), Ok(Route::Event(EventType::QrSubscribe)));
    }

    #[test]
    fn test_event_tags_are_case_insensitive() {
        assert_eq!(
            classify(&envelope("event", Some("scan"))),
            Ok(Route::Event(EventType::Scan))
        );
        assert_eq!(
            classify(&envelope("EVENT", Some("click"))),
            Ok(Route::Event(EventType::Click))
        );
    }

    #[test]
    fn test_classification_misses() {
        assert_eq!(
            classify(&envelope("hologram", None)),
            Err(ClassificationMiss::UnknownMsgType("hologram".to_string()))
        );
        assert_eq!(
            classify(&envelope("event", None)),
            Err(ClassificationMiss::MissingEvent)
        );
        assert_eq!(
            classify(&envelope("event", Some("teleport"))),
            Err(ClassificationMiss::UnknownEvent("teleport".to_string()))
        );
    }

    #[test]
    fn test_event_tag_ignored_on_messages() {
        assert_eq!(
            classify(&envelope("text", Some("CLICK"))),
            Ok(Route::Message(MessageKind::Text))
        );
    }

    #[test]
    fn test_route_tags() {
        assert_eq!(Route::Message(MessageKind::ShortVideo).tags(), ("shortvideo", None));
        assert_eq!(
            Route::Event(EventType::QrSubscribe).tags(),
            ("event", Some("subscribe"))
        );
        assert_eq!(Route::all().count(), MessageKind::ALL.len() + EventType::ALL.len());
    }
}
