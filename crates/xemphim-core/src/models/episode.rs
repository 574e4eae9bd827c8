use serde::{Deserialize, Deserializer, Serialize};

/// Episode payload as returned by `GET /product/{slug}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub slug: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub seri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<CategorySummary>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub view: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub next_episode: Option<String>,
    #[serde(default)]
    pub prev_episode: Option<String>,

    // Video sources, highest preference first.
    #[serde(default)]
    pub voice_over_link: Option<String>,
    #[serde(default)]
    pub voice_over_link2: Option<String>,
    #[serde(default)]
    pub daily_motion_server: Option<String>,
    #[serde(default)]
    pub daily_motion_server2: Option<String>,
    #[serde(default)]
    pub daily_motion_server3: Option<String>,
}

impl EpisodeRecord {
    /// Raw value of one source field.
    pub fn source(&self, field: SourceField) -> Option<&str> {
        match field {
            SourceField::VoiceOverPrimary => self.voice_over_link.as_deref(),
            SourceField::VoiceOverSecondary => self.voice_over_link2.as_deref(),
            SourceField::SubtitlePrimary => self.daily_motion_server.as_deref(),
            SourceField::SubtitleSecondary => self.daily_motion_server2.as_deref(),
            SourceField::SubtitleTertiary => self.daily_motion_server3.as_deref(),
        }
    }

    /// "Series - Tập N" style display title.
    pub fn display_title(&self) -> String {
        let series = self
            .category
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("Unknown");
        match &self.seri {
            Some(seri) => format!("{series} - Tập {seri}"),
            None => series.to_string(),
        }
    }
}

/// A series, as embedded in an episode payload or listed by the catalog
/// endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub another_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub sum_seri: Option<String>,
    #[serde(default)]
    pub products: Vec<EpisodeSummary>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub year: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub des: Option<String>,
}

impl CategorySummary {
    /// Series name, falling back to the slug.
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .or(self.slug.as_deref())
            .unwrap_or("Unknown")
    }

    /// Newest episode, for "continue watching" style links.
    pub fn latest_episode(&self) -> Option<&EpisodeSummary> {
        self.products.iter().max_by_key(|e| e.number())
    }

    /// Sibling episodes, newest (highest episode number) first.
    pub fn sorted_episodes(&self) -> Vec<&EpisodeSummary> {
        let mut episodes: Vec<&EpisodeSummary> = self.products.iter().collect();
        episodes.sort_by_key(|e| std::cmp::Reverse(e.number()));
        episodes
    }
}

/// One page of series from `GET /category/latest/next`.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub series: Vec<CategorySummary>,
    pub page: u32,
    pub pages: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeSummary {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub seri: Option<String>,
}

impl EpisodeSummary {
    /// Navigation key: slug, then id.
    pub fn key(&self) -> Option<&str> {
        self.slug.as_deref().or(self.id.as_deref())
    }

    /// Numeric episode number; unparsable values sort as 0.
    pub fn number(&self) -> u32 {
        self.seri
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// The fixed, ordered set of source fields on an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceField {
    VoiceOverPrimary,
    VoiceOverSecondary,
    SubtitlePrimary,
    SubtitleSecondary,
    SubtitleTertiary,
}

impl SourceField {
    pub const ALL: &[SourceField] = &[
        Self::VoiceOverPrimary,
        Self::VoiceOverSecondary,
        Self::SubtitlePrimary,
        Self::SubtitleSecondary,
        Self::SubtitleTertiary,
    ];

    /// Stable id, identical to the JSON field name.
    pub fn id(self) -> &'static str {
        match self {
            Self::VoiceOverPrimary => "voiceOverLink",
            Self::VoiceOverSecondary => "voiceOverLink2",
            Self::SubtitlePrimary => "dailyMotionServer",
            Self::SubtitleSecondary => "dailyMotionServer2",
            Self::SubtitleTertiary => "dailyMotionServer3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VoiceOverPrimary => "Thuyết minh #1",
            Self::VoiceOverSecondary => "Thuyết minh #2",
            Self::SubtitlePrimary => "Vietsub #1",
            Self::SubtitleSecondary => "Vietsub #2",
            Self::SubtitleTertiary => "Vietsub #3",
        }
    }

    /// Lower is preferred. Unique per field.
    pub fn priority(self) -> u8 {
        match self {
            Self::VoiceOverPrimary => 1,
            Self::VoiceOverSecondary => 2,
            Self::SubtitlePrimary => 3,
            Self::SubtitleSecondary => 4,
            Self::SubtitleTertiary => 5,
        }
    }
}

/// One playable candidate source for an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOption {
    pub id: String,
    pub name: String,
    pub url: String,
    pub priority: u8,
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_payload() {
        let json = r#"{
            "slug": "tien-nghich-tap-12",
            "seri": 12,
            "view": "1520",
            "category": {
                "name": "Tiên Nghịch",
                "anotherName": "Renegade Immortal",
                "sumSeri": "128",
                "products": [
                    {"slug": "tien-nghich-tap-11", "seri": "11"},
                    {"_id": "abc", "seri": "12"}
                ]
            },
            "voiceOverLink": "https://voe.sx/e/abc",
            "dailyMotionServer": "https://www.dailymotion.com/embed/video/x8",
            "nextEpisode": "tien-nghich-tap-13",
            "prevEpisode": null
        }"#;
        let ep: EpisodeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(ep.slug, "tien-nghich-tap-12");
        assert_eq!(ep.seri.as_deref(), Some("12"));
        assert_eq!(ep.view.as_deref(), Some("1520"));
        assert_eq!(ep.next_episode.as_deref(), Some("tien-nghich-tap-13"));
        assert!(ep.prev_episode.is_none());
        assert_eq!(
            ep.source(SourceField::VoiceOverPrimary),
            Some("https://voe.sx/e/abc")
        );
        assert!(ep.source(SourceField::SubtitleSecondary).is_none());
        assert_eq!(ep.display_title(), "Tiên Nghịch - Tập 12");
    }

    #[test]
    fn test_sorted_episodes_newest_first() {
        let category = CategorySummary {
            products: vec![
                EpisodeSummary {
                    slug: Some("ep-2".into()),
                    id: None,
                    seri: Some("2".into()),
                },
                EpisodeSummary {
                    slug: None,
                    id: Some("id-10".into()),
                    seri: Some("10".into()),
                },
                EpisodeSummary {
                    slug: Some("ep-x".into()),
                    id: None,
                    seri: Some("special".into()),
                },
            ],
            ..Default::default()
        };
        let keys: Vec<_> = category
            .sorted_episodes()
            .into_iter()
            .map(|e| e.key().unwrap())
            .collect();
        assert_eq!(keys, vec!["id-10", "ep-2", "ep-x"]);
        assert_eq!(category.latest_episode().unwrap().key(), Some("id-10"));
    }

    #[test]
    fn test_catalog_series_payload() {
        let json = r#"{
            "_id": "c1",
            "name": "Đấu Phá Thương Khung",
            "slug": "dau-pha-thuong-khung",
            "sumSeri": 156,
            "year": 2024,
            "status": "Đang chiếu",
            "products": [],
            "linkImg": "https://img.test/1.jpg",
            "rating": []
        }"#;
        let series: CategorySummary = serde_json::from_str(json).unwrap();
        assert_eq!(series.id.as_deref(), Some("c1"));
        assert_eq!(series.sum_seri.as_deref(), Some("156"));
        assert_eq!(series.year.as_deref(), Some("2024"));
        assert_eq!(series.title(), "Đấu Phá Thương Khung");
        assert!(series.latest_episode().is_none());

        let nameless = CategorySummary {
            slug: Some("tien-nghich".into()),
            ..Default::default()
        };
        assert_eq!(nameless.title(), "tien-nghich");
    }

    #[test]
    fn test_priorities_unique_and_ordered() {
        let priorities: Vec<u8> = SourceField::ALL.iter().map(|f| f.priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4, 5]);
    }
}
