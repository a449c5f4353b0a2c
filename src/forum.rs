use crate::option::Params;
use crate::option::TopicDetailsOption;
use crate::option::TopicsOption;
use crate::Client;
use crate::MalError;
use crate::Response;
use chrono::DateTime;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Forum {
    pub categories: Vec<ForumCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForumCategory {
    pub title: String,
    pub boards: Vec<ForumBoard>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForumBoard {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub subboards: Vec<ForumSubboard>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForumSubboard {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForumUser {
    pub id: u64,
    pub name: String,
    pub forum_avator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Topic {
    pub id: u64,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<ForumUser>,
    pub number_of_posts: u32,
    pub last_post_created_at: Option<DateTime<Utc>>,
    pub last_post_created_by: Option<ForumUser>,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TopicDetail {
    pub title: String,
    pub posts: Vec<Post>,
    pub poll: Option<Poll>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: u64,
    pub number: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<ForumUser>,
    pub body: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Poll {
    pub id: u64,
    pub question: String,
    pub closed: bool,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollOption {
    pub id: u64,
    pub text: String,
    pub votes: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ForumService<'a> {
    pub(crate) client: &'a Client,
}

impl ForumService<'_> {
    pub async fn boards(&self, cancel: &CancellationToken) -> Result<(Forum, Response), MalError> {
        self.client
            .json(Method::GET, "forum/boards", Params::new(), cancel)
            .await
    }

    pub async fn topics(
        &self,
        options: &[&dyn TopicsOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Topic>, Response), MalError> {
        self.client
            .page("forum/topics", Params::from_options(options), cancel)
            .await
    }

    /// One page of the posts of topic `id`.
    pub async fn topic_details(
        &self,
        id: u64,
        options: &[&dyn TopicDetailsOption],
        cancel: &CancellationToken,
    ) -> Result<(TopicDetail, Response), MalError> {
        self.client
            .page(
                &format!("forum/topic/{id}"),
                Params::from_options(options),
                cancel,
            )
            .await
    }
}
