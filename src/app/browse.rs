//! Channel, video and search listings.

use crate::error::Result;
use crate::types::{
    Conversation, EntityRef, MediaFilter, MediaPost, Phase, ProgressUpdate, ScreenId, SearchHit,
    StatusMessage,
};

use super::App;

impl App {
    /// Show the channel listing as the root screen
    ///
    /// Lists the most recent conversations and keeps the channel-like ones.
    /// An empty result is a valid listing.
    pub async fn load_channels(&self) -> Result<Vec<Conversation>> {
        self.ensure_accepting()?;
        self.ensure_connected()?;

        {
            let mut navigation = self.navigation.lock().await;
            if !navigation.is_active(ScreenId::Channels) {
                navigation.reset_to(ScreenId::Channels).await;
            }
        }

        self.list_channels().await
    }

    async fn list_channels(&self) -> Result<Vec<Conversation>> {
        self.listing_progress("Loading channels");
        let conversations = self
            .transport
            .list_conversations(self.config.listing.conversation_limit)
            .await
            .map_err(|e| self.report("Could not load channels", e.into()))?;

        let listed = conversations.len();
        let channels: Vec<Conversation> = conversations
            .into_iter()
            .filter(|c| c.is_channel_like)
            .collect();
        tracing::info!(listed, channels = channels.len(), "channels loaded");

        self.presenter.show_conversations(&channels);
        Ok(channels)
    }

    /// Show the video posts of one conversation
    pub async fn open_conversation(&self, conversation: &EntityRef) -> Result<Vec<MediaPost>> {
        self.ensure_accepting()?;
        self.ensure_connected()?;

        {
            let mut navigation = self.navigation.lock().await;
            if !navigation.is_active(ScreenId::Videos) && !navigation.navigate_to(ScreenId::Videos)
            {
                return Ok(Vec::new());
            }
        }
        self.browse.lock().await.conversation = Some(conversation.clone());

        self.list_videos(conversation).await
    }

    async fn list_videos(&self, conversation: &EntityRef) -> Result<Vec<MediaPost>> {
        self.listing_progress("Loading videos");
        let posts = self
            .transport
            .list_media(
                conversation,
                self.config.listing.media_limit,
                MediaFilter::Video,
            )
            .await
            .map_err(|e| self.report("Could not load videos", e.into()))?;

        tracing::info!(conversation = %conversation.0, videos = posts.len(), "videos loaded");
        self.presenter.show_media(&posts);
        Ok(posts)
    }

    /// Search conversations and contacts
    ///
    /// A blank query only shows a hint and leaves the active screen alone.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.ensure_accepting()?;
        self.ensure_connected()?;

        let query = query.trim();
        if query.is_empty() {
            self.presenter
                .status(&StatusMessage::info("Type something to search for"));
            return Ok(Vec::new());
        }

        {
            let mut navigation = self.navigation.lock().await;
            if !navigation.is_active(ScreenId::Search) && !navigation.navigate_to(ScreenId::Search)
            {
                return Ok(Vec::new());
            }
        }
        self.browse.lock().await.query = Some(query.to_string());

        self.run_search(query).await
    }

    async fn run_search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.listing_progress("Searching");
        let hits = self
            .transport
            .search(query, self.config.listing.search_limit)
            .await
            .map_err(|e| self.report("Search failed", e.into()))?;

        tracing::debug!(query, hits = hits.len(), "search finished");
        self.presenter.show_search_results(&hits);
        Ok(hits)
    }

    /// Reload whatever the active screen lists
    pub async fn refresh(&self) -> Result<()> {
        self.ensure_accepting()?;
        let active = self.active_screen().await;

        match active {
            ScreenId::Channels => {
                self.ensure_connected()?;
                self.list_channels().await?;
            }
            ScreenId::Videos => {
                self.ensure_connected()?;
                let conversation = self.browse.lock().await.conversation.clone();
                if let Some(conversation) = conversation {
                    self.list_videos(&conversation).await?;
                }
            }
            ScreenId::Search => {
                self.ensure_connected()?;
                let query = self.browse.lock().await.query.clone();
                if let Some(query) = query {
                    self.run_search(&query).await?;
                }
            }
            ScreenId::Auth => self.restart_login().await?,
            ScreenId::Config | ScreenId::Player => {
                tracing::debug!(screen = %active, "nothing to refresh");
            }
        }
        Ok(())
    }

    /// Bytes of the smallest thumbnail offered for `post`, if any
    pub async fn thumbnail(&self, post: &MediaPost) -> Result<Option<Vec<u8>>> {
        self.ensure_connected()?;
        let Some(spec) = post.media.smallest_thumbnail() else {
            return Ok(None);
        };

        let bytes = self
            .transport
            .download_thumbnail(&post.media.remote, spec)
            .await?;
        Ok(Some(bytes))
    }

    fn listing_progress(&self, message: &str) {
        self.presenter.progress(&ProgressUpdate {
            phase: Phase::Listing,
            percent: None,
            message: message.to_string(),
        });
    }
}
