use anyhow::{Context, Result};
use async_trait::async_trait;
use common::candidate::CandidateRecord;
use common::search::RecordingSearch;
use reqwest::header;
use serde::Deserialize;

const USER_AGENT: &str = concat!("kmvp-bot/", env!("CARGO_PKG_VERSION"), " ( https://vectorhost.net )");
const SEARCH_URL: &str = "https://musicbrainz.org/ws/2/recording";

pub struct MusicBrainzClient {
    client: reqwest::Client,
    url: String,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: SEARCH_URL.to_owned(),
        })
    }
}

#[async_trait]
impl RecordingSearch for MusicBrainzClient {
    async fn search(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<CandidateRecord>> {
        let limit = limit.to_string();
        let offset = offset.to_string();

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("query", query),
                ("fmt", "json"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await
            .context("Failed to send MusicBrainz request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("MusicBrainz answered {status} for '{query}'");
        }

        let search_result: MbRecordingSearch = response
            .json()
            .await
            .context("Failed to decode MusicBrainz response")?;

        Ok(search_result.into_candidates())
    }
}

// --- Serde Structs ---

#[derive(Deserialize, Debug)]
struct MbRecordingSearch {
    #[serde(default)]
    recordings: Vec<MbRecording>,
}

#[derive(Deserialize, Debug)]
struct MbRecording {
    title: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MbArtistCredit>,
    #[serde(default)]
    releases: Vec<MbRelease>,
}

#[derive(Deserialize, Debug)]
struct MbArtistCredit {
    name: Option<String>,
    artist: Option<MbArtist>,
}

#[derive(Deserialize, Debug)]
struct MbArtist {
    name: String,
}

#[derive(Deserialize, Debug)]
struct MbRelease {
    title: Option<String>,
}

impl MbRecordingSearch {
    fn into_candidates(self) -> Vec<CandidateRecord> {
        self.recordings
            .into_iter()
            .enumerate()
            .map(|(index, rec)| {
                // Only the first credit and the first release are used.
                let artist = rec.artist_credit.into_iter().next().and_then(|credit| {
                    credit.artist.map(|a| a.name).or(credit.name)
                });
                let album = rec.releases.into_iter().next().and_then(|r| r.title);

                CandidateRecord {
                    index,
                    title: rec.title,
                    artist,
                    album,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "created": "2025-06-01T10:00:00.000Z",
        "count": 2,
        "offset": 0,
        "recordings": [
            {
                "id": "a1",
                "score": 100,
                "title": "Halcyon + On + On",
                "artist-credit": [
                    { "name": "Orbital", "artist": { "id": "x", "name": "Orbital" } },
                    { "name": "Guest", "artist": { "id": "y", "name": "Guest" } }
                ],
                "releases": [
                    { "id": "r1", "title": "Orbital 2" },
                    { "id": "r2", "title": "Work 1989-2002" }
                ]
            },
            {
                "id": "a2",
                "score": 80,
                "title": "Untitled"
            }
        ]
    }"#;

    #[test]
    fn maps_first_credit_and_release() {
        let parsed: MbRecordingSearch = serde_json::from_str(RESPONSE).unwrap();
        let candidates = parsed.into_candidates();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].index, 0);
        assert_eq!(candidates[0].title.as_deref(), Some("Halcyon + On + On"));
        assert_eq!(candidates[0].artist.as_deref(), Some("Orbital"));
        assert_eq!(candidates[0].album.as_deref(), Some("Orbital 2"));
    }

    #[test]
    fn tolerates_missing_credits_and_releases() {
        let parsed: MbRecordingSearch = serde_json::from_str(RESPONSE).unwrap();
        let candidates = parsed.into_candidates();

        assert_eq!(candidates[1].index, 1);
        assert!(candidates[1].artist.is_none());
        assert!(candidates[1].album.is_none());
    }

    #[test]
    fn empty_body_has_no_recordings() {
        let parsed: MbRecordingSearch = serde_json::from_str("{}").unwrap();
        assert!(parsed.into_candidates().is_empty());
    }
}
