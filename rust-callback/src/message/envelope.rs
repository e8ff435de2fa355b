//! Inbound message envelope.
//!
//! The platform posts one flat XML document per callback. Which optional
//! fields are present depends on `MsgType` and, for events, `Event`. Fields
//! are kept as a wide struct and narrowed into a typed payload by
//! [`crate::dispatch::Payload`].

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::error::CallbackError;

/// `MsgType` value that marks an event notification.
pub const EVENT_MSG_TYPE: &str = "event";

/// A parsed plain-text callback document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename = "xml")]
pub struct MessageEnvelope {
    /// Recipient: the official account's original id.
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    /// Sender: the user's open id.
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: String,
    #[serde(rename = "CreateTime", default, deserialize_with = "empty_as_zero")]
    pub create_time: i64,
    #[serde(rename = "MsgType", default)]
    pub msg_type: String,
    /// Only meaningful when `msg_type` is [`EVENT_MSG_TYPE`].
    #[serde(rename = "Event")]
    pub event: Option<String>,

    // =========================================================================
    // Message fields
    // =========================================================================
    #[serde(rename = "MsgId", default, deserialize_with = "empty_as_none")]
    pub msg_id: Option<i64>,
    #[serde(rename = "Content")]
    pub content: Option<String>,
    #[serde(rename = "PicUrl")]
    pub pic_url: Option<String>,
    #[serde(rename = "MediaId")]
    pub media_id: Option<String>,
    #[serde(rename = "Format")]
    pub format: Option<String>,
    #[serde(rename = "Recognition")]
    pub recognition: Option<String>,
    #[serde(rename = "ThumbMediaId")]
    pub thumb_media_id: Option<String>,
    #[serde(rename = "Location_X", default, deserialize_with = "empty_as_none")]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y", default, deserialize_with = "empty_as_none")]
    pub location_y: Option<f64>,
    #[serde(rename = "Scale", default, deserialize_with = "empty_as_none")]
    pub scale: Option<f64>,
    #[serde(rename = "Label")]
    pub label: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Url")]
    pub url: Option<String>,
    #[serde(rename = "FileKey")]
    pub file_key: Option<String>,
    #[serde(rename = "FileMd5")]
    pub file_md5: Option<String>,
    #[serde(rename = "FileTotalLen", default, deserialize_with = "empty_as_none")]
    pub file_total_len: Option<u64>,

    // =========================================================================
    // Event fields
    // =========================================================================
    #[serde(rename = "EventKey")]
    pub event_key: Option<String>,
    #[serde(rename = "Ticket")]
    pub ticket: Option<String>,
    #[serde(rename = "Latitude", default, deserialize_with = "empty_as_none")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default, deserialize_with = "empty_as_none")]
    pub longitude: Option<f64>,
    #[serde(rename = "Precision", default, deserialize_with = "empty_as_none")]
    pub precision: Option<f64>,
    #[serde(rename = "MenuId")]
    pub menu_id: Option<String>,
    #[serde(rename = "ScanCodeInfo")]
    pub scan_code_info: Option<ScanCodeInfo>,
    #[serde(rename = "SendPicsInfo")]
    pub send_pics_info: Option<SendPicsInfo>,
    #[serde(rename = "SendLocationInfo")]
    pub send_location_info: Option<SendLocationInfo>,

    /// Job id on template and mass-send completion events (note the casing).
    #[serde(rename = "MsgID", default, deserialize_with = "empty_as_none")]
    pub job_msg_id: Option<i64>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "TotalCount", default, deserialize_with = "empty_as_none")]
    pub total_count: Option<u64>,
    #[serde(rename = "FilterCount", default, deserialize_with = "empty_as_none")]
    pub filter_count: Option<u64>,
    #[serde(rename = "SentCount", default, deserialize_with = "empty_as_none")]
    pub sent_count: Option<u64>,
    #[serde(rename = "ErrorCount", default, deserialize_with = "empty_as_none")]
    pub error_count: Option<u64>,

    #[serde(rename = "KfAccount")]
    pub kf_account: Option<String>,
    #[serde(rename = "FromKfAccount")]
    pub from_kf_account: Option<String>,
    #[serde(rename = "ToKfAccount")]
    pub to_kf_account: Option<String>,

    #[serde(rename = "CardId")]
    pub card_id: Option<String>,
    #[serde(rename = "RefuseReason")]
    pub refuse_reason: Option<String>,
    #[serde(rename = "UserCardCode")]
    pub user_card_code: Option<String>,
    #[serde(rename = "IsGiveByFriend", default, deserialize_with = "empty_as_none")]
    pub is_give_by_friend: Option<u8>,
    #[serde(rename = "FriendUserName")]
    pub friend_user_name: Option<String>,
    #[serde(rename = "OuterId", default, deserialize_with = "empty_as_none")]
    pub outer_id: Option<i64>,
    #[serde(rename = "OldUserCardCode")]
    pub old_user_card_code: Option<String>,
    #[serde(rename = "ConsumeSource")]
    pub consume_source: Option<String>,
    #[serde(rename = "LocationName")]
    pub location_name: Option<String>,
    #[serde(rename = "StaffOpenId")]
    pub staff_open_id: Option<String>,

    #[serde(rename = "FailReason")]
    pub fail_reason: Option<String>,
    #[serde(rename = "ExpiredTime", default, deserialize_with = "empty_as_none")]
    pub expired_time: Option<i64>,
}

/// Result of a `scancode_push` / `scancode_waitmsg` menu scan.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScanCodeInfo {
    #[serde(rename = "ScanType", default)]
    pub scan_type: String,
    #[serde(rename = "ScanResult", default)]
    pub scan_result: String,
}

/// Pictures sent from a `pic_*` menu button.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SendPicsInfo {
    #[serde(rename = "Count", default)]
    pub count: u32,
    #[serde(rename = "PicList", default)]
    pub pic_list: PicList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PicList {
    #[serde(rename = "item", default)]
    pub items: Vec<PicItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PicItem {
    #[serde(rename = "PicMd5Sum", default)]
    pub pic_md5_sum: String,
}

/// Location chosen from a `location_select` menu button.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SendLocationInfo {
    #[serde(rename = "Location_X", default, deserialize_with = "empty_as_none")]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y", default, deserialize_with = "empty_as_none")]
    pub location_y: Option<f64>,
    #[serde(rename = "Scale", default, deserialize_with = "empty_as_none")]
    pub scale: Option<f64>,
    #[serde(rename = "Label")]
    pub label: Option<String>,
    #[serde(rename = "Poiname")]
    pub poiname: Option<String>,
}

/// Numeric element that may be present but blank (`<MsgId></MsgId>`,
/// `<Latitude/>`). Blank reads as absent.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}

fn empty_as_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(empty_as_none(deserializer)?.unwrap_or_default())
}

impl MessageEnvelope {
    /// Parse a plain callback document.
    pub fn from_xml(bytes: &[u8]) -> Result<Self, CallbackError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(quick_xml::de::from_str(text)?)
    }

    pub fn is_event(&self) -> bool {
        self.msg_type.eq_ignore_ascii_case(EVENT_MSG_TYPE)
    }
}
