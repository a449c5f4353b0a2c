use crate::anime::Anime;
use crate::anime::AnimeListStatus;
use crate::client::segment;
use crate::manga::Manga;
use crate::manga::MangaListStatus;
use crate::option::AnimeListOption;
use crate::option::MangaListOption;
use crate::option::MyInfoOption;
use crate::option::Params;
use crate::Client;
use crate::MalError;
use crate::Response;
use chrono::DateTime;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Profile of the authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub picture: String,
    pub gender: String,
    pub birthday: String,
    pub location: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub anime_statistics: Option<AnimeStatistics>,
    pub time_zone: String,
    pub is_supporter: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimeStatistics {
    pub num_items_watching: u32,
    pub num_items_completed: u32,
    pub num_items_on_hold: u32,
    pub num_items_dropped: u32,
    pub num_items_plan_to_watch: u32,
    pub num_items: u32,
    pub num_days_watched: f64,
    pub num_days_watching: f64,
    pub num_days_completed: f64,
    pub num_days_on_hold: f64,
    pub num_days_dropped: f64,
    pub num_days: f64,
    pub num_episodes: u32,
    pub num_times_rewatched: u32,
    pub mean_score: f64,
}

/// An anime on a user's list together with its list status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserAnime {
    #[serde(rename = "node")]
    pub anime: Anime,
    #[serde(default, rename = "list_status")]
    pub status: AnimeListStatus,
}

/// A manga on a user's list together with its list status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserManga {
    #[serde(rename = "node")]
    pub manga: Manga,
    #[serde(default, rename = "list_status")]
    pub status: MangaListStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct UserService<'a> {
    pub(crate) client: &'a Client,
}

impl UserService<'_> {
    pub async fn my_info(
        &self,
        options: &[&dyn MyInfoOption],
        cancel: &CancellationToken,
    ) -> Result<(User, Response), MalError> {
        self.client
            .json(
                Method::GET,
                "users/@me",
                Params::from_options(options),
                cancel,
            )
            .await
    }

    /// Anime list of `username`; `@me` names the authenticated user.
    pub async fn anime_list(
        &self,
        username: &str,
        options: &[&dyn AnimeListOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<UserAnime>, Response), MalError> {
        self.client
            .page(
                &format!("users/{}/animelist", segment(username)?),
                Params::from_options(options),
                cancel,
            )
            .await
    }

    pub async fn manga_list(
        &self,
        username: &str,
        options: &[&dyn MangaListOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<UserManga>, Response), MalError> {
        self.client
            .page(
                &format!("users/{}/mangalist", segment(username)?),
                Params::from_options(options),
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::option::AnimeStatus;

    #[test]
    fn test_flatten_list_item() {
        let item: UserAnime = serde_json::from_str(
            r#"{"node":{"id":1,"title":"Cowboy Bebop"},"list_status":{"status":"watching","score":8,"num_episodes_watched":3}}"#,
        )
        .unwrap();
        assert_eq!(item.anime.id, 1);
        assert_eq!(item.anime.title, "Cowboy Bebop");
        assert_eq!(item.status.status, Some(AnimeStatus::Watching));
        assert_eq!(item.status.num_episodes_watched, 3);
    }
}
