//! Mock YouTube server for testing feed scans and random picks
//!
//! Provides a [`MockYoutubeServer`] that serves channel Atom feeds and
//! search result pages, plus [`FeedEntryFixture`] for building feeds.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock YouTube server for testing feed and search clients
///
/// This struct wraps a [`wiremock::MockServer`]. Point both the feed and
/// search base URLs of the client at [`MockYoutubeServer::url`].
///
/// # Example
///
/// ```rust,ignore
/// use tubebot_test_utils::{FeedEntryFixture, MockYoutubeServer};
///
/// #[tokio::test]
/// async fn test_scan() {
///     let server = MockYoutubeServer::start().await;
///     server
///         .mock_feed("UC1", vec![FeedEntryFixture::video("v1", "2024-01-01T00:00:00+00:00")])
///         .await;
///
///     // Configure the client with server.url()
/// }
/// ```
pub struct MockYoutubeServer {
    server: MockServer,
}

impl MockYoutubeServer {
    /// Start a new mock YouTube server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Mount a feed for a channel, entries given newest first
    pub async fn mock_feed(&self, channel_id: &str, entries: Vec<FeedEntryFixture>) {
        Mock::given(method("GET"))
            .and(path("/feeds/videos.xml"))
            .and(query_param("channel_id", channel_id))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/atom+xml; charset=UTF-8")
                    .set_body_string(atom_feed(channel_id, &entries)),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a 404 for a channel feed
    pub async fn mock_feed_not_found(&self, channel_id: &str) {
        Mock::given(method("GET"))
            .and(path("/feeds/videos.xml"))
            .and(query_param("channel_id", channel_id))
            .respond_with(ResponseTemplate::new(404))
            .mount(&self.server)
            .await;
    }

    /// Mount a server error for a channel feed
    pub async fn mock_feed_server_error(&self, channel_id: &str) {
        Mock::given(method("GET"))
            .and(path("/feeds/videos.xml"))
            .and(query_param("channel_id", channel_id))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&self.server)
            .await;
    }

    /// Mount a search results page containing the given video ids
    pub async fn mock_search(&self, video_ids: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/results"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(video_ids)))
            .mount(&self.server)
            .await;
    }

    /// Mount a search page that lacks the embedded results document
    pub async fn mock_search_without_data(&self) {
        Mock::given(method("GET"))
            .and(path("/results"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&self.server)
            .await;
    }

    /// Mount a rate limit response for every request
    pub async fn mock_rate_limit(&self) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&self.server)
            .await;
    }
}

/// One feed entry used to build mock Atom feeds
#[derive(Debug, Clone)]
pub struct FeedEntryFixture {
    pub video_id: String,
    pub title: String,
    pub link: String,
    /// RFC 3339 publish timestamp
    pub published: String,
}

impl FeedEntryFixture {
    /// A regular upload
    pub fn video(video_id: &str, published: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: format!("Upload {}", video_id),
            link: format!("https://www.youtube.com/watch?v={}", video_id),
            published: published.to_string(),
        }
    }

    /// A short-form upload
    pub fn short(video_id: &str, published: &str) -> Self {
        Self {
            title: format!("Quick one {} #shorts", video_id),
            link: format!("https://www.youtube.com/shorts/{}", video_id),
            ..Self::video(video_id, published)
        }
    }

    /// Render as an Atom `<entry>` element
    pub fn to_xml(&self) -> String {
        format!(
            r#" <entry>
  <id>yt:video:{id}</id>
  <yt:videoId>{id}</yt:videoId>
  <title>{title}</title>
  <link rel="alternate" href="{link}"/>
  <published>{published}</published>
  <updated>{published}</updated>
 </entry>
"#,
            id = self.video_id,
            title = self.title,
            link = self.link,
            published = self.published,
        )
    }
}

/// Render a complete channel feed document
pub fn atom_feed(channel_id: &str, entries: &[FeedEntryFixture]) -> String {
    let body: String = entries.iter().map(FeedEntryFixture::to_xml).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <link rel="self" href="http://www.youtube.com/feeds/videos.xml?channel_id={channel_id}"/>
 <id>yt:channel:{channel_id}</id>
 <yt:channelId>{channel_id}</yt:channelId>
 <title>Channel {channel_id}</title>
{body}</feed>"#
    )
}

/// Render a search results page embedding the given video ids
pub fn search_page(video_ids: &[&str]) -> String {
    let items: Vec<serde_json::Value> = video_ids
        .iter()
        .map(|id| json!({ "videoRenderer": { "videoId": id } }))
        .collect();
    let data = json!({
        "contents": {
            "twoColumnSearchResultsRenderer": {
                "primaryContents": {
                    "sectionListRenderer": {
                        "contents": [{ "itemSectionRenderer": { "contents": items } }]
                    }
                }
            }
        }
    });
    format!(
        "<html><body><script>var ytInitialData = {};</script></body></html>",
        data
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_feed_is_served_per_channel() {
        let server = MockYoutubeServer::start().await;
        server
            .mock_feed(
                "UC1",
                vec![FeedEntryFixture::video("v1", "2024-01-01T00:00:00+00:00")],
            )
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/feeds/videos.xml?channel_id=UC1", server.url()))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        let body = response.text().await.unwrap();
        assert!(body.contains("<yt:videoId>v1</yt:videoId>"));
    }

    #[tokio::test]
    async fn test_mock_feed_not_found() {
        let server = MockYoutubeServer::start().await;
        server.mock_feed_not_found("UC404").await;

        let response = reqwest::Client::new()
            .get(format!("{}/feeds/videos.xml?channel_id=UC404", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[test]
    fn test_short_fixture_is_tagged() {
        let entry = FeedEntryFixture::short("s1", "2024-01-01T00:00:00+00:00");
        assert!(entry.title.contains("#shorts"));
        assert!(entry.link.contains("/shorts/"));
    }

    #[test]
    fn test_search_page_embeds_ids() {
        let page = search_page(&["a", "b"]);
        assert!(page.contains("ytInitialData = "));
        assert!(page.contains(r#""videoId":"a""#));
        assert!(page.ends_with(";</script></body></html>"));
    }
}
