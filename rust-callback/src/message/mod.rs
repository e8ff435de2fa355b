//! Wire documents exchanged with the platform.
//!
//! - [`envelope`]: the plain inbound message/event document
//! - [`encrypted`]: secure-mode request and response wrappers
//! - [`reply`]: passive replies produced by handlers

pub mod encrypted;
pub mod envelope;
pub mod reply;
mod xml;

pub use encrypted::{EncryptedEnvelope, EncryptedRequestBody};
pub use envelope::{
    MessageEnvelope, PicItem, PicList, ScanCodeInfo, SendLocationInfo, SendPicsInfo,
    EVENT_MSG_TYPE,
};
pub use reply::{Article, Reply, MAX_NEWS_ARTICLES};
