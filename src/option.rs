//! Typed request options.
//!
//! Every option is a small value that knows how to write itself into a
//! [`Params`] bag. Endpoints accept `&[&dyn SomeOption]` slices where
//! `SomeOption` is a marker trait implemented only by the options that
//! endpoint understands, so passing e.g. a [`Score`] to a ranking call does
//! not compile.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use url::form_urlencoded;

/// Ordered key/value parameters of a request.
///
/// Setting a key that is already present replaces its value in place, so the
/// last writer wins while the original insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into `self`, `other` winning on shared keys.
    pub fn extend(&mut self, other: Params) {
        for (k, v) in other.0 {
            self.set(k, v);
        }
    }

    /// `application/x-www-form-urlencoded` rendering.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }

    pub(crate) fn from_options<O>(options: &[&O]) -> Self
    where
        O: RequestOption + ?Sized,
    {
        let mut params = Self::new();
        for option in options {
            option.apply(&mut params);
        }
        params
    }
}

/// A value that imprints itself on a request as one parameter.
pub trait RequestOption: Send + Sync {
    fn apply(&self, params: &mut Params);
}

macro_rules! capability {
    ($(#[$meta:meta])* $name:ident: $($option:ty),+ $(,)?) => {
        $(#[$meta])*
        pub trait $name: RequestOption {}
        $(impl $name for $option {})+
    };
}

capability!(
    /// Options accepted by anime and manga details.
    DetailsOption: Fields
);
capability!(
    /// Options accepted by the catalog search of anime and manga.
    SearchOption: Limit, Offset, Fields, Nsfw
);
capability!(
    /// Options accepted by anime and manga ranking.
    RankingOption: Limit, Offset, Fields, Nsfw
);
capability!(
    /// Options accepted by seasonal anime.
    SeasonalOption: SortSeasonal, Limit, Offset, Fields, Nsfw
);
capability!(
    /// Options accepted by suggested anime.
    SuggestedOption: Limit, Offset, Fields, Nsfw
);
capability!(
    /// Options accepted when updating an anime list entry.
    UpdateMyAnimeListStatusOption: AnimeStatus,
    IsRewatching,
    Score,
    NumEpisodesWatched,
    Priority,
    NumTimesRewatched,
    RewatchValue,
    Tags,
    Comments,
    StartDate,
    FinishDate,
);
capability!(
    /// Options accepted when updating a manga list entry.
    UpdateMyMangaListStatusOption: MangaStatus,
    IsRereading,
    Score,
    NumVolumesRead,
    NumChaptersRead,
    Priority,
    NumTimesReread,
    RereadValue,
    Tags,
    Comments,
    StartDate,
    FinishDate,
);
capability!(
    /// Options accepted when reading a user's anime list.
    AnimeListOption: AnimeStatus, SortAnimeList, Limit, Offset, Fields, Nsfw
);
capability!(
    /// Options accepted when reading a user's manga list.
    MangaListOption: MangaStatus, SortMangaList, Limit, Offset, Fields, Nsfw
);
capability!(
    /// Options accepted by the authenticated user's profile.
    MyInfoOption: Fields
);
capability!(
    /// Options accepted when listing forum topics.
    TopicsOption: BoardId,
    SubboardId,
    SortTopics,
    Query,
    TopicUserName,
    UserName,
    Limit,
    Offset,
);
capability!(
    /// Options accepted when reading a forum topic.
    TopicDetailsOption: Limit, Offset
);

macro_rules! int_option {
    ($(#[$meta:meta])* $name:ident($ty:ty) => $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub $ty);

        impl RequestOption for $name {
            fn apply(&self, params: &mut Params) {
                params.set($key, self.0.to_string());
            }
        }
    };
}

macro_rules! bool_option {
    ($(#[$meta:meta])* $name:ident => $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub bool);

        impl RequestOption for $name {
            fn apply(&self, params: &mut Params) {
                params.set($key, if self.0 { "true" } else { "false" });
            }
        }
    };
}

macro_rules! str_option {
    ($(#[$meta:meta])* $name:ident => $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }
        }

        impl RequestOption for $name {
            fn apply(&self, params: &mut Params) {
                params.set($key, self.0.as_str());
            }
        }
    };
}

int_option!(
    /// Page size.
    Limit(u32) => "limit"
);
int_option!(
    /// Index of the first item of the page.
    Offset(u32) => "offset"
);
int_option!(BoardId(u64) => "board_id");
int_option!(SubboardId(u64) => "subboard_id");
int_option!(
    /// List score, 0 to 10.
    Score(u8) => "score"
);
int_option!(NumEpisodesWatched(u32) => "num_watched_episodes");
int_option!(NumVolumesRead(u32) => "num_volumes_read");
int_option!(NumChaptersRead(u32) => "num_chapters_read");
int_option!(NumTimesRewatched(u32) => "num_times_rewatched");
int_option!(NumTimesReread(u32) => "num_times_reread");
int_option!(
    /// 0 to 5.
    RewatchValue(u8) => "rewatch_value"
);
int_option!(
    /// 0 to 5.
    RereadValue(u8) => "reread_value"
);
int_option!(
    /// 0 low, 1 medium, 2 high.
    Priority(u8) => "priority"
);

bool_option!(IsRewatching => "is_rewatching");
bool_option!(IsRereading => "is_rereading");
bool_option!(
    /// Include entries flagged as not safe for work.
    Nsfw => "nsfw"
);

str_option!(
    /// Free text search.
    Query => "q"
);
str_option!(TopicUserName => "topic_user_name");
str_option!(UserName => "user_name");
str_option!(Comments => "comments");

/// Attributes the server should include in the response.
///
/// Nested selectors such as `list_status{start_date,end_date}` are passed
/// through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(pub Vec<String>);

impl Fields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }
}

impl RequestOption for Fields {
    fn apply(&self, params: &mut Params) {
        params.set("fields", self.0.join(","));
    }
}

/// Tags attached to a list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(pub Vec<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }
}

impl RequestOption for Tags {
    fn apply(&self, params: &mut Params) {
        params.set("tags", self.0.join(","));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDate(pub NaiveDate);

impl RequestOption for StartDate {
    fn apply(&self, params: &mut Params) {
        params.set("start_date", self.0.format("%Y-%m-%d").to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishDate(pub NaiveDate);

impl RequestOption for FinishDate {
    fn apply(&self, params: &mut Params) {
        params.set("finish_date", self.0.format("%Y-%m-%d").to_string());
    }
}

macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident $(=> $key:literal)? {
            $($variant:ident = $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        $(
            impl RequestOption for $name {
                fn apply(&self, params: &mut Params) {
                    params.set($key, self.as_str());
                }
            }
        )?
    };
}

token_enum!(
    /// Status of an anime on a user's list.
    AnimeStatus => "status" {
        Watching = "watching",
        Completed = "completed",
        OnHold = "on_hold",
        Dropped = "dropped",
        PlanToWatch = "plan_to_watch",
    }
);

token_enum!(
    /// Status of a manga on a user's list.
    MangaStatus => "status" {
        Reading = "reading",
        Completed = "completed",
        OnHold = "on_hold",
        Dropped = "dropped",
        PlanToRead = "plan_to_read",
    }
);

token_enum!(
    AnimeRankingType => "ranking_type" {
        All = "all",
        Airing = "airing",
        Upcoming = "upcoming",
        Tv = "tv",
        Ova = "ova",
        Movie = "movie",
        Special = "special",
        ByPopularity = "bypopularity",
        Favorite = "favorite",
    }
);

token_enum!(
    MangaRankingType => "ranking_type" {
        All = "all",
        Manga = "manga",
        Novels = "novels",
        Oneshots = "oneshots",
        Doujin = "doujin",
        Manhwa = "manhwa",
        Manhua = "manhua",
        ByPopularity = "bypopularity",
        Favorite = "favorite",
    }
);

token_enum!(
    /// Broadcast season, used as a path segment of seasonal anime.
    Season {
        Winter = "winter",
        Spring = "spring",
        Summer = "summer",
        Fall = "fall",
    }
);

token_enum!(
    SortSeasonal => "sort" {
        AnimeScore = "anime_score",
        AnimeNumListUsers = "anime_num_list_users",
    }
);

token_enum!(
    SortAnimeList => "sort" {
        ListScore = "list_score",
        ListUpdatedAt = "list_updated_at",
        AnimeTitle = "anime_title",
        AnimeStartDate = "anime_start_date",
        AnimeId = "anime_id",
    }
);

token_enum!(
    SortMangaList => "sort" {
        ListScore = "list_score",
        ListUpdatedAt = "list_updated_at",
        MangaTitle = "manga_title",
        MangaStartDate = "manga_start_date",
        MangaId = "manga_id",
    }
);

token_enum!(
    SortTopics => "sort" {
        Recent = "recent",
    }
);
