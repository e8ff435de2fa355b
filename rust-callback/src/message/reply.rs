//! Passive replies a handler can return for an inbound message.

use tracing::warn;

use super::envelope::MessageEnvelope;
use super::xml::XmlDocument;
use crate::error::CallbackError;

/// Most articles a single news reply may carry.
pub const MAX_NEWS_ARTICLES: usize = 8;

/// One entry of a [`Reply::News`] reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub pic_url: String,
    pub url: String,
}

/// Response envelope produced by a handler.
///
/// `Empty` tells the platform the message was accepted without a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reply {
    #[default]
    Empty,
    Text {
        content: String,
    },
    Image {
        media_id: String,
    },
    Voice {
        media_id: String,
    },
    Video {
        media_id: String,
        title: Option<String>,
        description: Option<String>,
    },
    Music {
        title: Option<String>,
        description: Option<String>,
        music_url: Option<String>,
        hq_music_url: Option<String>,
        thumb_media_id: String,
    },
    News {
        articles: Vec<Article>,
    },
    /// Hand the conversation to the customer-service system, optionally to a
    /// specific agent account.
    TransferCustomerService {
        kf_account: Option<String>,
    },
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Reply::Text {
            content: content.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    /// `MsgType` tag written into the reply document.
    pub fn msg_type(&self) -> Option<&'static str> {
        match self {
            Reply::Empty => None,
            Reply::Text { .. } => Some("text"),
            Reply::Image { .. } => Some("image"),
            Reply::Voice { .. } => Some("voice"),
            Reply::Video { .. } => Some("video"),
            Reply::Music { .. } => Some("music"),
            Reply::News { .. } => Some("news"),
            Reply::TransferCustomerService { .. } => Some("transfer_customer_service"),
        }
    }

    /// Serialize as a reply to `inbound`: sender and recipient are swapped.
    ///
    /// Returns `None` for [`Reply::Empty`].
    pub fn encode(
        &self,
        inbound: &MessageEnvelope,
        create_time: i64,
    ) -> Result<Option<Vec<u8>>, CallbackError> {
        let msg_type = match self.msg_type() {
            Some(msg_type) => msg_type,
            None => return Ok(None),
        };

        let mut doc = XmlDocument::new()?;
        doc.cdata("ToUserName", &inbound.from_user_name)?
            .cdata("FromUserName", &inbound.to_user_name)?
            .text("CreateTime", create_time)?
            .cdata("MsgType", msg_type)?;

        match self {
            Reply::Empty => {}
            Reply::Text { content } => {
                doc.cdata("Content", content)?;
            }
            Reply::Image { media_id } => {
                doc.open("Image")?.cdata("MediaId", media_id)?.close("Image")?;
            }
            Reply::Voice { media_id } => {
                doc.open("Voice")?.cdata("MediaId", media_id)?.close("Voice")?;
            }
            Reply::Video {
                media_id,
                title,
                description,
            } => {
                doc.open("Video")?.cdata("MediaId", media_id)?;
                optional_cdata(&mut doc, "Title", title)?;
                optional_cdata(&mut doc, "Description", description)?;
                doc.close("Video")?;
            }
            Reply::Music {
                title,
                description,
                music_url,
                hq_music_url,
                thumb_media_id,
            } => {
                doc.open("Music")?;
                optional_cdata(&mut doc, "Title", title)?;
                optional_cdata(&mut doc, "Description", description)?;
                optional_cdata(&mut doc, "MusicUrl", music_url)?;
                optional_cdata(&mut doc, "HQMusicUrl", hq_music_url)?;
                doc.cdata("ThumbMediaId", thumb_media_id)?.close("Music")?;
            }
            Reply::News { articles } => {
                if articles.len() > MAX_NEWS_ARTICLES {
                    warn!(
                        article_count = articles.len(),
                        max = MAX_NEWS_ARTICLES,
                        "reply_news_truncated"
                    );
                }
                let articles = &articles[..articles.len().min(MAX_NEWS_ARTICLES)];

                doc.text("ArticleCount", articles.len())?.open("Articles")?;
                for article in articles {
                    doc.open("item")?
                        .cdata("Title", &article.title)?
                        .cdata("Description", &article.description)?
                        .cdata("PicUrl", &article.pic_url)?
                        .cdata("Url", &article.url)?
                        .close("item")?;
                }
                doc.close("Articles")?;
            }
            Reply::TransferCustomerService { kf_account } => {
                if let Some(account) = kf_account {
                    doc.open("TransInfo")?
                        .cdata("KfAccount", account)?
                        .close("TransInfo")?;
                }
            }
        }

        Ok(Some(doc.finish()?))
    }
}

fn optional_cdata(
    doc: &mut XmlDocument,
    name: &str,
    value: &Option<String>,
) -> Result<(), CallbackError> {
    if let Some(value) = value {
        doc.cdata(name, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> MessageEnvelope {
        MessageEnvelope {
            to_user_name: "gh_account".to_string(),
            from_user_name: "oUser".to_string(),
            create_time: 1,
            msg_type: "text".to_string(),
            ..Default::default()
        }
    }

    fn encode(reply: &Reply) -> String {
        String::from_utf8(reply.encode(&inbound(), 1409304348).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_reply_encodes_to_nothing() {
        assert!(Reply::Empty.encode(&inbound(), 0).unwrap().is_none());
        assert!(Reply::default().is_empty());
    }

    #[test]
    fn test_text_reply_swaps_parties() {
        let xml = encode(&Reply::text("hello"));

        assert_eq!(
            xml,
            "<xml><ToUserName><![CDATA[oUser]]></ToUserName>\
             <FromUserName><![CDATA[gh_account]]></FromUserName>\
             <CreateTime>1409304348</CreateTime>\
             <MsgType><![CDATA[text]]></MsgType>\
             <Content><![CDATA[hello]]></Content></xml>"
        );
    }

    #[test]
    fn test_image_reply() {
        let xml = encode(&Reply::Image {
            media_id: "media-1".to_string(),
        });

        assert!(xml.contains("<MsgType><![CDATA[image]]></MsgType>"));
        assert!(xml.contains("<Image><MediaId><![CDATA[media-1]]></MediaId></Image>"));
    }

    #[test]
    fn test_video_reply_omits_absent_fields() {
        let xml = encode(&Reply::Video {
            media_id: "m".to_string(),
            title: Some("t".to_string()),
            description: None,
        });

        assert!(xml.contains("<Video><MediaId><![CDATA[m]]></MediaId><Title><![CDATA[t]]></Title></Video>"));
        assert!(!xml.contains("Description"));
    }

    #[test]
    fn test_news_reply_is_capped() {
        let articles = vec![
            Article {
                title: "t".to_string(),
                ..Default::default()
            };
            MAX_NEWS_ARTICLES + 2
        ];

        let xml = encode(&Reply::News { articles });

        assert!(xml.contains(&format!("<ArticleCount>{}</ArticleCount>", MAX_NEWS_ARTICLES)));
        assert_eq!(xml.matches("<item>").count(), MAX_NEWS_ARTICLES);
    }

    #[test]
    fn test_transfer_customer_service() {
        let plain = encode(&Reply::TransferCustomerService { kf_account: None });
        assert!(plain.contains("<MsgType><![CDATA[transfer_customer_service]]></MsgType>"));
        assert!(!plain.contains("TransInfo"));

        let targeted = encode(&Reply::TransferCustomerService {
            kf_account: Some("agent@account".to_string()),
        });
        assert!(targeted.contains("<TransInfo><KfAccount><![CDATA[agent@account]]></KfAccount></TransInfo>"));
    }
}
