use std::fmt;

/// Album written when the user types the metadata by hand, or when the chosen
/// recording has no known release.
pub const PLACEHOLDER_ALBUM: &str = "YTD Tracks";

/// Shown in place of a missing title, artist or album.
pub const UNKNOWN: &str = "Unknown";

/// Separator between title and artist in free-form user input.
pub const SEPARATOR: char = ';';

/// One recording returned by a metadata search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Zero-based position within the page it was fetched on.
    pub index: usize,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl CandidateRecord {
    #[must_use]
    pub fn title_or_unknown(&self) -> &str {
        self.title.as_deref().unwrap_or(UNKNOWN)
    }

    #[must_use]
    pub fn artist_or_unknown(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN)
    }

    #[must_use]
    pub fn album_or_unknown(&self) -> &str {
        self.album.as_deref().unwrap_or(UNKNOWN)
    }

    /// Metadata to tag with when this record is picked. A missing album falls
    /// back to the placeholder rather than `Unknown`.
    #[must_use]
    pub fn resolve(&self) -> ResolvedMetadata {
        ResolvedMetadata {
            title: self.title_or_unknown().to_owned(),
            artist: self.artist_or_unknown().to_owned(),
            album: self
                .album
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_ALBUM.to_owned()),
        }
    }
}

/// The final title/artist/album triple written onto the audio file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl ResolvedMetadata {
    /// Parses `Title;Artist`. Returns `None` when the separator is missing.
    #[must_use]
    pub fn from_manual_entry(input: &str) -> Option<Self> {
        let (title, artist) = split_title_artist(input)?;
        Some(Self {
            title: title.to_owned(),
            artist: artist.to_owned(),
            album: PLACEHOLDER_ALBUM.to_owned(),
        })
    }
}

impl fmt::Display for ResolvedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {} [{}]", self.title, self.artist, self.album)
    }
}

/// Splits on the first separator and trims both halves.
#[must_use]
pub fn split_title_artist(input: &str) -> Option<(&str, &str)> {
    let (title, artist) = input.trim().split_once(SEPARATOR)?;
    Some((title.trim(), artist.trim()))
}
