use crate::anime::is_zero;
use crate::anime::serialize_date;
use crate::anime::serialize_tags;
use crate::anime::AlternativeTitles;
use crate::anime::EntryStatus;
use crate::anime::Genre;
use crate::anime::Picture;
use crate::anime::Ranking;
use crate::client::Api;
use crate::decode::deserialize_number_from_string;
use crate::decode::deserialize_optional_number;
use crate::decode::Node;
use crate::option::DetailsOption;
use crate::option::MangaRankingType;
use crate::option::MangaStatus;
use crate::option::Params;
use crate::option::Query;
use crate::option::RankingOption;
use crate::option::RequestOption;
use crate::option::SearchOption;
use crate::option::UpdateMyMangaListStatusOption;
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
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MangaResult {
    #[serde(default, rename = "entry")]
    pub rows: Vec<MangaRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MangaRow {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub id: u64,
    pub title: String,
    pub english: String,
    pub synonyms: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub chapters: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub volumes: u32,
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

/// A user's manga list as dumped by `malappinfo.php`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MangaList {
    #[serde(default)]
    pub myinfo: MangaMyInfo,
    #[serde(default, rename = "manga", deserialize_with = "manga_entries")]
    pub entries: Vec<MangaListEntry>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MangaMyInfo {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_id: u64,
    pub user_name: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_reading: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_completed: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_onhold: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_dropped: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_plantoread: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub user_days_spent_watching: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MangaListEntry {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_mangadb_id: u64,
    pub series_title: String,
    pub series_synonyms: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_type: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_chapters: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_volumes: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub series_status: u32,
    pub series_start: String,
    pub series_end: String,
    pub series_image: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_id: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_read_chapters: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_read_volumes: u32,
    pub my_start_date: String,
    pub my_finish_date: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_score: u8,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_status: u8,
    /// Also read from `my_rereadingg`, `my_rewatching` and `my_rewatchingg`.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_rereading: u32,
    #[serde(rename = "my_rereadingg", deserialize_with = "deserialize_optional_number")]
    my_rereadingg: Option<u32>,
    #[serde(rename = "my_rewatching", deserialize_with = "deserialize_optional_number")]
    my_rewatching: Option<u32>,
    #[serde(rename = "my_rewatchingg", deserialize_with = "deserialize_optional_number")]
    my_rewatchingg: Option<u32>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_rereading_chap: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub my_last_updated: i64,
    pub my_tags: String,
}

impl MangaListEntry {
    /// Other spellings only count when `my_rereading` is zero; the first
    /// non-zero one wins.
    fn merge_spellings(&mut self) {
        let others = [
            self.my_rereadingg.take(),
            self.my_rewatching.take(),
            self.my_rewatchingg.take(),
        ];
        if self.my_rereading == 0 {
            self.my_rereading = others.into_iter().flatten().find(|v| *v != 0).unwrap_or(0);
        }
    }
}

fn manga_entries<'de, D>(deserializer: D) -> Result<Vec<MangaListEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut entries = Vec::<MangaListEntry>::deserialize(deserializer)?;
    entries.iter_mut().for_each(MangaListEntry::merge_spellings);
    Ok(entries)
}

/// Payload of the legacy manga list writes.
///
/// Zero fields are left out of the document. `status`, `comments` and
/// `enable_rereading` are written whenever they are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MangaEntry {
    #[serde(skip_serializing_if = "is_zero")]
    pub chapter: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub volume: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "is_zero")]
    pub score: u8,
    #[serde(skip_serializing_if = "is_zero")]
    pub times_reread: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub reread_value: u8,
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
    pub enable_rereading: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scan_group: String,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_tags")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub retail_volumes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Author {
    pub node: AuthorNode,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorNode {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
}

/// Manga of the v2 API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Manga {
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
    pub my_list_status: Option<MangaListStatus>,
    pub num_volumes: u32,
    pub num_chapters: u32,
    pub authors: Vec<Author>,
    pub background: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MangaListStatus {
    pub status: Option<MangaStatus>,
    pub is_rereading: bool,
    pub num_volumes_read: u32,
    pub num_chapters_read: u32,
    pub score: u8,
    pub start_date: String,
    pub finish_date: String,
    pub priority: u8,
    pub num_times_reread: u32,
    pub reread_value: u8,
    pub tags: Vec<String>,
    pub comments: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MangaRanking {
    pub manga: Manga,
    pub rank: u32,
    pub previous_rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RankedManga {
    node: Manga,
    #[serde(default)]
    ranking: Ranking,
}

#[derive(Debug, Clone, Copy)]
pub struct MangaService<'a> {
    pub(crate) client: &'a Client,
}

impl MangaService<'_> {
    pub async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(MangaResult, Response), MalError> {
        let mut params = Params::new();
        Query::new(query).apply(&mut params);
        self.client
            .get_xml("api/manga/search.xml", params, cancel)
            .await
    }

    /// Dump the manga list of `username`; see [`crate::anime::AnimeService::list`].
    pub async fn list(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<(MangaList, Response), MalError> {
        let mut params = Params::new();
        params.set("status", "all");
        params.set("type", "manga");
        params.set("u", username);
        let (list, response) = self
            .client
            .get_xml::<MangaList>("malappinfo.php", params, cancel)
            .await?;
        if !list.error.is_empty() {
            warn!(error = %list.error, "manga list rejected");
            return Err(MalError::SoftError {
                message: list.error.clone(),
                list: Box::new(LegacyList::Manga(list)),
                response: Box::new(response),
            });
        }
        Ok((list, response))
    }

    pub async fn add(
        &self,
        id: u64,
        entry: &MangaEntry,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        self.client
            .post_entry(&format!("api/mangalist/add/{id}.xml"), entry, cancel)
            .await
    }

    pub async fn update(
        &self,
        id: u64,
        entry: &MangaEntry,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        self.client
            .post_entry(&format!("api/mangalist/update/{id}.xml"), entry, cancel)
            .await
    }

    pub async fn delete(&self, id: u64, cancel: &CancellationToken) -> Result<Response, MalError> {
        self.client
            .send(
                Api::Legacy,
                Method::DELETE,
                &format!("api/mangalist/delete/{id}.xml"),
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
    ) -> Result<(Manga, Response), MalError> {
        self.client
            .json(
                Method::GET,
                &format!("manga/{id}"),
                Params::from_options(options),
                cancel,
            )
            .await
    }

    pub async fn find(
        &self,
        query: &str,
        options: &[&dyn SearchOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Manga>, Response), MalError> {
        let mut params = Params::new();
        Query::new(query).apply(&mut params);
        params.extend(Params::from_options(options));
        let (nodes, response) = self
            .client
            .page::<Vec<Node<Manga>>>("manga", params, cancel)
            .await?;
        Ok((nodes.into_iter().map(|n| n.node).collect(), response))
    }

    pub async fn ranking(
        &self,
        ranking: MangaRankingType,
        options: &[&dyn RankingOption],
        cancel: &CancellationToken,
    ) -> Result<(Vec<MangaRanking>, Response), MalError> {
        let mut params = Params::new();
        ranking.apply(&mut params);
        params.extend(Params::from_options(options));
        let (ranked, response) = self
            .client
            .page::<Vec<RankedManga>>("manga/ranking", params, cancel)
            .await?;
        let ranked = ranked
            .into_iter()
            .map(|r| MangaRanking {
                manga: r.node,
                rank: r.ranking.rank,
                previous_rank: r.ranking.previous_rank,
            })
            .collect();
        Ok((ranked, response))
    }

    pub async fn update_my_list_status(
        &self,
        id: u64,
        options: &[&dyn UpdateMyMangaListStatusOption],
        cancel: &CancellationToken,
    ) -> Result<(MangaListStatus, Response), MalError> {
        self.client
            .json(
                Method::PATCH,
                &format!("manga/{id}/my_list_status"),
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
                &format!("manga/{id}/my_list_status"),
                Params::new(),
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_entry_encoding() {
        let entry = MangaEntry {
            chapter: 12,
            status: Some(EntryStatus::Reading),
            scan_group: "group".to_string(),
            ..Default::default()
        };
        assert_eq!(
            quick_xml::se::to_string_with_root("entry", &entry).unwrap(),
            "<entry><chapter>12</chapter><status>reading</status><scan_group>group</scan_group></entry>"
        );
    }

    #[test]
    fn test_rereading_spellings() {
        for tag in ["my_rereading", "my_rereadingg", "my_rewatching", "my_rewatchingg"] {
            let body = format!(
                "<myanimelist><manga><series_mangadb_id>2</series_mangadb_id><{tag}>1</{tag}></manga></myanimelist>"
            );
            let list: MangaList = crate::decode::xml(body.as_bytes()).unwrap();
            assert_eq!(list.entries[0].series_mangadb_id, 2);
            assert_eq!(list.entries[0].my_rereading, 1, "{tag}");
        }
    }

    #[test]
    fn test_rereading_mixed_spellings() {
        let body = "<myanimelist><manga><my_rereadingg>0</my_rereadingg><my_rewatching>3</my_rewatching><my_rewatchingg>1</my_rewatchingg></manga></myanimelist>";
        let list: MangaList = crate::decode::xml(body.as_bytes()).unwrap();
        assert_eq!(list.entries[0].my_rereading, 3);

        let body = "<myanimelist><manga><my_rereading>2</my_rereading><my_rereadingg>5</my_rereadingg></manga></myanimelist>";
        let list: MangaList = crate::decode::xml(body.as_bytes()).unwrap();
        assert_eq!(list.entries[0].my_rereading, 2);
    }
}
