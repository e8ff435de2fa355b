//! Typed payloads, one shape per [`Route`].
//!
//! Payloads borrow from the envelope they were built from. Absent string
//! fields read as `""` and absent numbers as zero.

use super::route::{EventType, MessageKind, Route};
use crate::message::MessageEnvelope;

/// Prefix of `EventKey` on a QR-code subscribe.
const QR_SCENE_PREFIX: &str = "qrscene_";

#[derive(Debug, Clone, PartialEq)]
pub enum Payload<'a> {
    Text {
        msg_id: i64,
        content: &'a str,
    },
    Image {
        msg_id: i64,
        pic_url: &'a str,
        media_id: &'a str,
    },
    Voice {
        msg_id: i64,
        media_id: &'a str,
        format: &'a str,
        /// Speech recognition result, when enabled for the account.
        recognition: Option<&'a str>,
    },
    /// Also used for `shortvideo`.
    Video {
        msg_id: i64,
        media_id: &'a str,
        thumb_media_id: &'a str,
    },
    Location {
        msg_id: i64,
        latitude: f64,
        longitude: f64,
        scale: f64,
        label: &'a str,
    },
    Link {
        msg_id: i64,
        title: &'a str,
        description: &'a str,
        url: &'a str,
    },
    File {
        msg_id: i64,
        title: &'a str,
        description: &'a str,
        file_key: &'a str,
        file_md5: &'a str,
        file_total_len: u64,
    },
    Event(EventPayload<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload<'a> {
    Subscribe {
        event_key: Option<&'a str>,
    },
    /// `scene` is the QR scene value with the `qrscene_` prefix removed.
    QrSubscribe {
        scene: &'a str,
        ticket: &'a str,
    },
    Unsubscribe,
    Scan {
        scene: &'a str,
        ticket: &'a str,
    },
    Location {
        latitude: f64,
        longitude: f64,
        precision: f64,
    },
    Click {
        key: &'a str,
    },
    /// `target` is the URL for `VIEW` and the page path for
    /// `view_miniprogram`.
    View {
        target: &'a str,
        menu_id: Option<&'a str>,
    },
    ScanCode {
        key: &'a str,
        scan_type: &'a str,
        scan_result: &'a str,
    },
    Pictures {
        key: &'a str,
        count: u32,
        md5_sums: Vec<&'a str>,
    },
    LocationSelect {
        key: &'a str,
        latitude: f64,
        longitude: f64,
        scale: f64,
        label: &'a str,
        poiname: &'a str,
    },
    TemplateSendJobFinish {
        job_id: i64,
        status: &'a str,
    },
    MassSendJobFinish {
        job_id: i64,
        status: &'a str,
        total_count: u64,
        filter_count: u64,
        sent_count: u64,
        error_count: u64,
    },
    /// Session created or closed.
    KfSession {
        kf_account: &'a str,
    },
    KfSwitchSession {
        from_kf_account: &'a str,
        to_kf_account: &'a str,
    },
    /// Card audit result; `refuse_reason` is set when it failed.
    CardAudit {
        card_id: &'a str,
        refuse_reason: Option<&'a str>,
    },
    UserGetCard {
        card_id: &'a str,
        user_card_code: &'a str,
        given_by_friend: bool,
        friend_user_name: &'a str,
        outer_id: i64,
        old_user_card_code: &'a str,
    },
    /// Deleted, viewed, or opened a session from a card.
    UserCard {
        card_id: &'a str,
        user_card_code: &'a str,
    },
    UserConsumeCard {
        card_id: &'a str,
        user_card_code: &'a str,
        consume_source: &'a str,
        location_name: &'a str,
        staff_open_id: &'a str,
    },
    Qualification {
        fail_reason: Option<&'a str>,
        expired_time: i64,
    },
}

impl<'a> Payload<'a> {
    /// Build the payload shape `route` defines from `envelope`.
    pub fn from_route(route: Route, envelope: &'a MessageEnvelope) -> Self {
        let e = envelope;
        let msg_id = e.msg_id.unwrap_or_default();

        match route {
            Route::Message(MessageKind::Text) => Payload::Text {
                msg_id,
                content: text(&e.content),
            },
            Route::Message(MessageKind::Image) => Payload::Image {
                msg_id,
                pic_url: text(&e.pic_url),
                media_id: text(&e.media_id),
            },
            Route::Message(MessageKind::Voice) => Payload::Voice {
                msg_id,
                media_id: text(&e.media_id),
                format: text(&e.format),
                recognition: e.recognition.as_deref(),
            },
            Route::Message(MessageKind::Video) | Route::Message(MessageKind::ShortVideo) => {
                Payload::Video {
                    msg_id,
                    media_id: text(&e.media_id),
                    thumb_media_id: text(&e.thumb_media_id),
                }
            }
            Route::Message(MessageKind::Location) => Payload::Location {
                msg_id,
                latitude: e.location_x.unwrap_or_default(),
                longitude: e.location_y.unwrap_or_default(),
                scale: e.scale.unwrap_or_default(),
                label: text(&e.label),
            },
            Route::Message(MessageKind::Link) => Payload::Link {
                msg_id,
                title: text(&e.title),
                description: text(&e.description),
                url: text(&e.url),
            },
            Route::Message(MessageKind::File) => Payload::File {
                msg_id,
                title: text(&e.title),
                description: text(&e.description),
                file_key: text(&e.file_key),
                file_md5: text(&e.file_md5),
                file_total_len: e.file_total_len.unwrap_or_default(),
            },
            Route::Event(event) => Payload::Event(EventPayload::from_event(event, e)),
        }
    }

    pub fn as_event(&self) -> Option<&EventPayload<'a>> {
        match self {
            Payload::Event(event) => Some(event),
            _ => None,
        }
    }
}

impl<'a> EventPayload<'a> {
    fn from_event(event: EventType, e: &'a MessageEnvelope) -> Self {
        let key = text(&e.event_key);

        match event {
            EventType::Subscribe => EventPayload::Subscribe {
                event_key: e.event_key.as_deref().filter(|k| !k.is_empty()),
            },
            EventType::QrSubscribe => EventPayload::QrSubscribe {
                scene: key.strip_prefix(QR_SCENE_PREFIX).unwrap_or(key),
                ticket: text(&e.ticket),
            },
            EventType::Unsubscribe => EventPayload::Unsubscribe,
            EventType::Scan => EventPayload::Scan {
                scene: key,
                ticket: text(&e.ticket),
            },
            EventType::Location => EventPayload::Location {
                latitude: e.latitude.unwrap_or_default(),
                longitude: e.longitude.unwrap_or_default(),
                precision: e.precision.unwrap_or_default(),
            },
            EventType::Click => EventPayload::Click { key },
            EventType::View | EventType::ViewMiniprogram => EventPayload::View {
                target: key,
                menu_id: e.menu_id.as_deref(),
            },
            EventType::ScanCodePush | EventType::ScanCodeWaitMsg => {
                let info = e.scan_code_info.as_ref();
                EventPayload::ScanCode {
                    key,
                    scan_type: info.map(|i| i.scan_type.as_str()).unwrap_or_default(),
                    scan_result: info.map(|i| i.scan_result.as_str()).unwrap_or_default(),
                }
            }
            EventType::PicSysPhoto | EventType::PicPhotoOrAlbum | EventType::PicWeixin => {
                let info = e.send_pics_info.as_ref();
                EventPayload::Pictures {
                    key,
                    count: info.map(|i| i.count).unwrap_or_default(),
                    md5_sums: info
                        .map(|i| {
                            i.pic_list
                                .items
                                .iter()
                                .map(|item| item.pic_md5_sum.as_str())
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            }
            EventType::LocationSelect => {
                let info = e.send_location_info.as_ref();
                EventPayload::LocationSelect {
                    key,
                    latitude: info.and_then(|i| i.location_x).unwrap_or_default(),
                    longitude: info.and_then(|i| i.location_y).unwrap_or_default(),
                    scale: info.and_then(|i| i.scale).unwrap_or_default(),
                    label: info.and_then(|i| i.label.as_deref()).unwrap_or_default(),
                    poiname: info.and_then(|i| i.poiname.as_deref()).unwrap_or_default(),
                }
            }
            EventType::TemplateSendJobFinish => EventPayload::TemplateSendJobFinish {
                job_id: e.job_msg_id.unwrap_or_default(),
                status: text(&e.status),
            },
            EventType::MassSendJobFinish => EventPayload::MassSendJobFinish {
                job_id: e.job_msg_id.unwrap_or_default(),
                status: text(&e.status),
                total_count: e.total_count.unwrap_or_default(),
                filter_count: e.filter_count.unwrap_or_default(),
                sent_count: e.sent_count.unwrap_or_default(),
                error_count: e.error_count.unwrap_or_default(),
            },
            EventType::KfCreateSession | EventType::KfCloseSession => EventPayload::KfSession {
                kf_account: text(&e.kf_account),
            },
            EventType::KfSwitchSession => EventPayload::KfSwitchSession {
                from_kf_account: text(&e.from_kf_account),
                to_kf_account: text(&e.to_kf_account),
            },
            EventType::CardPassCheck => EventPayload::CardAudit {
                card_id: text(&e.card_id),
                refuse_reason: None,
            },
            EventType::CardNotPassCheck => EventPayload::CardAudit {
                card_id: text(&e.card_id),
                refuse_reason: Some(text(&e.refuse_reason)),
            },
            EventType::UserGetCard => EventPayload::UserGetCard {
                card_id: text(&e.card_id),
                user_card_code: text(&e.user_card_code),
                given_by_friend: e.is_give_by_friend == Some(1),
                friend_user_name: text(&e.friend_user_name),
                outer_id: e.outer_id.unwrap_or_default(),
                old_user_card_code: text(&e.old_user_card_code),
            },
            EventType::UserDelCard
            | EventType::UserViewCard
            | EventType::UserEnterSessionFromCard => EventPayload::UserCard {
                card_id: text(&e.card_id),
                user_card_code: text(&e.user_card_code),
            },
            EventType::UserConsumeCard => EventPayload::UserConsumeCard {
                card_id: text(&e.card_id),
                user_card_code: text(&e.user_card_code),
                consume_source: text(&e.consume_source),
                location_name: text(&e.location_name),
                staff_open_id: text(&e.staff_open_id),
            },
            EventType::QualificationVerifySuccess => EventPayload::Qualification {
                fail_reason: None,
                expired_time: e.expired_time.unwrap_or_default(),
            },
            EventType::QualificationVerifyFail => EventPayload::Qualification {
                fail_reason: Some(text(&e.fail_reason)),
                expired_time: e.expired_time.unwrap_or_default(),
            },
        }
    }
}

fn text(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or_default()
}
