use crate::client::Api;
use crate::decode::deserialize_number_from_string;
use crate::decode::deserialize_optional_number;
use crate::decode::Node;
use crate::option::AnimeRankingType;
use crate::option::AnimeStatus;
use crate::option::DetailsOption;
use crate::option::Params;
use crate::option::Query;
use crate::option::RankingOption;
use crate::option::RequestOption;
use crate::option::SearchOption;
use crate::option::Season;
use crate::option::SeasonalOption;
use crate::option::SuggestedOption;
use crate::option::UpdateMyAnimeListStatusOption;
use crate::Client;
use crate::LegacyList;
use crate::MalError;
use crate::Response;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Result of the legacy anime search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnimeResult {
    #[serde(default, rename = "entry")]
    pub rows: Vec<AnimeRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimeRow {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub id: u64,
    pub title: String,
    pub english: String,
    pub synonyms: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub episodes: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub score: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub synopsis: String,
    pub image: String,
}

/// A user's anime list as dumped by `malappinfo.php`.
///
/// `error` is set instead of the entries when the server rejects the query,
/// e.g. for an unknown user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnimeList {
    #[serde(default)]
    pub myinfo: AnimeMyInfo,
    #[serde(default, rename = "anime", deserialize_with = "anime_entries")]
    pub entries: Vec<AnimeListEntry>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimeMyInfo {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_id: u64,
    pub user_name: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_watching: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_completed: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_onhold: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_dropped: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_plantowatch: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_days_spent_watching: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimeListEntry {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_animedb_id: u64,
    pub series_title: String,
    pub series_synonyms: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_type: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_episodes: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_status: u32,
    pub series_start: String,
    pub series_end: String,
    pub series_image: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_id: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_watched_episodes: u32,
    pub my_start_date: String,
    pub my_finish_date: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_score: u8,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_status: u8,
    /// Also read from `my_rewatchingg`.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_rewatching: u32,
    #[serde(rename = "my_rewatchingg", deserialize_with = "deserialize_optional_number")]
    my_rewatchingg: Option<u32>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_rewatching_ep: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_last_updated: i64,
    pub my_tags: String,
}

impl AnimeListEntry {
    /// The misspelled element only counts when the correct one is zero.
    fn merge_spellings(&mut self) {
        if let Some(value) = self.my_rewatchingg.take() {
            if self.my_rewatching == 0 {
                self.my_rewatching = value;
            }
        }
    }
}

fn anime_entries<'de, D>(deserializer: D) -> Result<Vec<AnimeListEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut entries = Vec::<AnimeListEntry>::deserialize(deserializer)?;
    entries.iter_mut().for_each(AnimeListEntry::merge_spellings);
    Ok(entries)
}

/// Status of a legacy list entry.
///
/// The legacy API takes either the status name or its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Watching,
    Reading,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
    PlanToRead,
    Code(u8),
}

impl Serialize for EntryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let token = match self {
            Self::Watching => "watching",
            Self::Reading => "reading",
            Self::Completed => "completed",
            Self::OnHold => "onhold",
            Self::Dropped => "dropped",
            Self::PlanToWatch => "plantowatch",
            Self::PlanToRead => "plantoread",
            Self::Code(code) => return serializer.serialize_u8(*code),
        };
        serializer.serialize_str(token)
    }
}

/// Payload of the legacy anime list writes.
///
/// Zero fields are left out of the document. `status`, `comments` and
/// `enable_rewatching` are written whenever they are set, zero or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnimeEntry {
    #[serde(skip_serializing_if = "is_zero")]
    pub episode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "is_zero")]
    pub score: u8,
    #[serde(skip_serializing_if = "is_zero")]
    pub storage_type: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub storage_value: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub times_rewatched: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub rewatch_value: u8,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_date"
    )]
    pub date_start: Option<NaiveDate>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_date"
    )]
    pub date_finish: Option<NaiveDate>,
    #[serde(skip_serializing_if = "is_zero")]
    pub priority: u8,
    #[serde(skip_serializing_if = "is_zero")]
    pub enable_discussion: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_rewatching: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_tags")]
    pub tags: Vec<String>,
}

pub(crate) fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Legacy dates are written as `MMDDYYYY`.
pub(crate) fn serialize_date<S: Serializer>(
    date: &Option<NaiveDate>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(date) => serializer.serialize_str(&date.format("%m%d%Y").to_string()),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn serialize_tags<S: Serializer>(
    tags: &[String],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&tags.join(","))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Picture {
    pub medium: String,
    pub large: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlternativeTitles {
    pub synonyms: Vec<String>,
    pub en: String,
    pub ja: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StartSeason {
    pub year: u32,
    pub season: Option<Season>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Broadcast {
    pub day_of_the_week: String,
    pub start_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Studio {
    pub id: u64,
    pub name: String,
}

/// Anime of the v2 API. Which fields are filled depends on the `fields`
/// option of the call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Anime {
    pub id: u64,
    pub title: String,
    pub main_picture: Picture,
    pub alternative_titles: AlternativeTitles,
    pub start_date: String,
    pub end_date: String,
    pub synopsis: String,
    pub mean: f64,
    pub rank: u32,
    pub popularity: u32,
    pub num_list_users: u32,
    pub num_scoring_users: u32,
    pub nsfw: String,
    pub genres: Vec<Genre>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub media_type: String,
    pub status: String,
    pub my_list_status: Option<AnimeListStatus>,
    pub num_episodes: u32,
    pub start_season: Option<StartSeason>,
    pub broadcast: Option<Broadcast>,
    pub source: String,
    pub average_episode_duration: u32,
    pub rating: String,
    pub studios: Vec<Studio>,
    pub background: String,
}

/// An anime's entry on the authenticated user's list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnimeListStatus {
    pub status: Option<AnimeStatus>,
    pub score: u8,
    pub num_episodes_watched: u32,
    pub is_rewatching: bool,
    pub start_date: String,
    pub finish_date: String,
    pub priority: u8,
    pub num_times_rewatched: u32,
    pub rewatch_value: u8,
    pub tags: Vec<String>,
    pub comments: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An anime and its place in a ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimeRanking {
    pub anime: Anime,
    pub rank: u32,
    pub previous_rank: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Ranking {
    pub(crate) rank: u32,
    pub(crate) previous_rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RankedAnime {
    node: Anime,
    #[serde(default)]
    ranking: Ranking,
}

#[derive(Debug, Clone, Copy)]
pub struct AnimeService<'a> {
    pub(crate) client: &'a Client,
}

impl AnimeService<'_> {
    /// Search the catalog through the legacy API.
    pub async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(AnimeResult, Response), MalError> {
        let mut params = Params::new();
        Query::new(query).apply(&mut params);
        self.client
            .get_xml("api/anime/search.xml", params, cancel)
            .await
    }

    /// Dump the anime list of `username` through the legacy API.
    ///
    /// An `<error>` in the document fails with [`MalError::SoftError`], which
    /// still carries the decoded list.
    pub async fn list(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<(AnimeList, Response), MalError> {
        let mut params = Params::new();
        params.set("status", "all");
        params.set("type", "anime");
        params.set("u", username);
        let (list, response) = self
            .client
            .get_xml::<AnimeList>("malappinfo.php", params, cancel)
            .await?;
        if !list.error.is_empty() {
            warn!(error = %list.error, "anime list rejected");
            return Err(MalError::SoftError {
                message: list.error.clone(),
                list: Box::new(LegacyList::Anime(list)),
                response: Box::new(response),
            });
        }
        Ok((list, response))
    }

    pub async fn add(
        &self,
        id: u64,
        entry: &AnimeEntry,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        self.client
            .post_entry(&format!("api/animelist/add/{id}.xml"), entry, cancel)
            .await
    }

    pub async fn update(
        &self,
        id: u64,
        entry: &AnimeEntry,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        self.client
            .post_entry(&format!("api/animelist/update/{id}.xml"), entry, cancel)
            .await
    }

    pub async fn delete(&self, id: u64, cancel: &CancellationToken) -> Result<Response, MalError> {
        self.client
            .send(
                Api::Legacy,
                Method::DELETE,
                &format!("api/animelist/delete/{id}.xml"),
                Params::new(),
                cancel,
            )
            .await
    }

    pub async fn details(
        &self,
        id: u64,
        options: &[&dyn DetailsOption],
        cancel: &CancellationToken,
    ) -> Result<(Anime, Response), MalError> {
        self.client
            .json(
                Method::GET,
                &format!("anime/{id}"),
                Params::from_options(options),
                cancel,
            )
            .await
    }

    /// Search the catalog through the v2 API.
    pub async fn find(
        &self,
        query: &str,
        options: &[&dyn SearchOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Anime>, Response), MalError> {
        let mut params = Params::new();
        Query::new(query).apply(&mut params);
        params.extend(Params::from_options(options));
        let (nodes, response) = self
            .client
            .page::<Vec<Node<Anime>>>("anime", params, cancel)
            .await?;
        Ok((nodes.into_iter().map(|n| n.node).collect(), response))
    }

    pub async fn ranking(
        &self,
        ranking: AnimeRankingType,
        options: &[&dyn RankingOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<AnimeRanking>, Response), MalError> {
        let mut params = Params::new();
        ranking.apply(&mut params);
        params.extend(Params::from_options(options));
        let (ranked, response) = self
            .client
            .page::<Vec<RankedAnime>>("anime/ranking", params, cancel)
            .await?;
        let ranked = ranked
            .into_iter()
            .map(|r| AnimeRanking {
                anime: r.node,
                rank: r.ranking.rank,
                previous_rank: r.ranking.previous_rank,
            })
            .collect();
        Ok((ranked, response))
    }

    pub async fn seasonal(
        &self,
        year: u32,
        season: Season,
        options: &[&dyn SeasonalOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Anime>, Response), MalError> {
        let (nodes, response) = self
            .client
            .page::<Vec<Node<Anime>>>(
                &format!("anime/season/{year}/{season}"),
                Params::from_options(options),
                cancel,
            )
            .await?;
        Ok((nodes.into_iter().map(|n| n.node).collect(), response))
    }

    /// Anime suggested for the authenticated user.
    pub async fn suggested(
        &self,
        options: &[&dyn SuggestedOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Anime>, Response), MalError> {
        let (nodes, response) = self
            .client
            .page::<Vec<Node<Anime>>>("anime/suggestions", Params::from_options(options), cancel)
            .await?;
        Ok((nodes.into_iter().map(|n| n.node).collect(), response))
    }

    /// Add or change the anime on the authenticated user's list.
    pub async fn update_my_list_status(
        &self,
        id: u64,
        options: &[&dyn UpdateMyAnimeListStatusOption],
        cancel: &CancellationToken,
    ) -> Result<(AnimeListStatus, Response), MalError> {
        self.client
            .json(
                Method::PATCH,
                &format!("anime/{id}/my_list_status"),
                Params::from_options(options),
                cancel,
            )
            .await
    }

    pub async fn delete_my_list_item(
        &self,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        self.client
            .send(
                Api::V2,
                Method::DELETE,
                &format!("anime/{id}/my_list_status"),
                Params::new(),
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(entry: &AnimeEntry) -> String {
        quick_xml::se::to_string_with_root("entry", entry).unwrap()
    }

    #[test]
    fn test_entry_status_only() {
        let entry = AnimeEntry {
            status: Some(EntryStatus::Watching),
            ..Default::default()
        };
        assert_eq!(encode(&entry), "<entry><status>watching</status></entry>");
    }

    #[test]
    fn test_entry_fields() {
        let entry = AnimeEntry {
            episode: 5,
            status: Some(EntryStatus::Code(1)),
            score: 8,
            date_start: NaiveDate::from_ymd_opt(2020, 1, 2),
            enable_rewatching: Some(0),
            comments: Some("great & short".to_string()),
            tags: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let xml = encode(&entry);
        assert!(!xml.starts_with("<?xml"));
        assert!(xml.starts_with("<entry><episode>5</episode><status>1</status><score>8</score>"));
        assert!(xml.contains("<date_start>01022020</date_start>"));
        assert!(xml.contains("<enable_rewatching>0</enable_rewatching>"));
        assert!(xml.contains("<comments>great &amp; short</comments>"));
        assert!(xml.contains("<tags>a,b</tags>"));
        assert!(!xml.contains("storage_value"));
        assert!(!xml.contains("date_finish"));
        assert!(!xml.contains("priority"));
    }

    #[test]
    fn test_decode_list() {
        let body = br#"<myanimelist>
            <myinfo><user_id>42</user_id><user_name>TestUser</user_name><user_watching>1</user_watching><user_days_spent_watching>1.5</user_days_spent_watching></myinfo>
            <anime><series_animedb_id>1</series_animedb_id><series_title>Cowboy Bebop</series_title><series_episodes>26</series_episodes><my_watched_episodes>3</my_watched_episodes><my_score></my_score><my_status>1</my_status><my_rewatchingg>1</my_rewatchingg></anime>
            <anime><series_animedb_id>5</series_animedb_id><series_title>Bebop Movie</series_title><my_rewatching>0</my_rewatching></anime>
        </myanimelist>"#;
        let list: AnimeList = crate::decode::xml(body).unwrap();
        assert_eq!(list.myinfo.user_id, 42);
        assert_eq!(list.myinfo.user_name, "TestUser");
        assert_eq!(list.myinfo.user_days_spent_watching, 1.5);
        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.entries[0].series_title, "Cowboy Bebop");
        assert_eq!(list.entries[0].my_score, 0);
        assert_eq!(list.entries[0].my_rewatching, 1);
        assert_eq!(list.entries[1].series_animedb_id, 5);
        assert!(list.error.is_empty());
    }

    #[test]
    fn test_decode_list_both_spellings() {
        let body = br#"<myanimelist>
            <anime><series_animedb_id>1</series_animedb_id><my_rewatching>2</my_rewatching><my_rewatchingg>1</my_rewatchingg></anime>
            <anime><series_animedb_id>2</series_animedb_id><my_rewatching>0</my_rewatching><my_rewatchingg>1</my_rewatchingg></anime>
        </myanimelist>"#;
        let list: AnimeList = crate::decode::xml(body).unwrap();
        assert_eq!(list.entries[0].my_rewatching, 2);
        assert_eq!(list.entries[1].my_rewatching, 1);
    }

    #[test]
    fn test_decode_list_status() {
        let status: AnimeListStatus = serde_json::from_str(
            r#"{"status":"completed","score":9,"num_episodes_watched":26,"is_rewatching":false,"tags":["space"],"updated_at":"2018-04-25T15:59:52+00:00"}"#,
        )
        .unwrap();
        assert_eq!(status.status, Some(AnimeStatus::Completed));
        assert_eq!(status.score, 9);
        assert_eq!(status.tags, vec!["space".to_string()]);
        assert!(status.updated_at.is_some());
    }
}
