use std::fmt::Write as _;
use std::str::FromStr;

use crate::candidate::CandidateRecord;

/// A selection the user can make while choosing among candidates. The
/// identifiers round-trip through the transport as opaque button payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Choose(usize),
    Again,
    Direct,
    Manual,
    Unknown(String),
}

impl Action {
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Action::Choose(idx) => format!("choose_{idx}"),
            Action::Again => "again".into(),
            Action::Direct => "direct".into(),
            Action::Manual => "manual".into(),
            Action::Unknown(raw) => raw.clone(),
        }
    }

    /// Parses a button payload. Anything unrecognised becomes `Unknown`.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id {
            "again" => Action::Again,
            "direct" => Action::Direct,
            "manual" => Action::Manual,
            other => other
                .strip_prefix("choose_")
                .and_then(|idx| idx.parse().ok())
                .map_or_else(|| Action::Unknown(other.to_owned()), Action::Choose),
        }
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Action::from_id(s))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub action: Action,
}

/// A rendered page of candidates: a header, one line per candidate, and the
/// buttons to pick from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Menu {
    pub header: String,
    pub lines: Vec<String>,
    pub buttons: Vec<MenuButton>,
}

#[must_use]
pub fn candidate_line(rank: usize, record: &CandidateRecord) -> String {
    format!(
        "{rank}. {} — {} [{}]",
        record.title_or_unknown(),
        record.artist_or_unknown(),
        record.album_or_unknown()
    )
}

fn fixed_buttons() -> [MenuButton; 3] {
    [
        MenuButton {
            label: "Try Again".into(),
            action: Action::Again,
        },
        MenuButton {
            label: "Direct Search".into(),
            action: Action::Direct,
        },
        MenuButton {
            label: "Manual Entry".into(),
            action: Action::Manual,
        },
    ]
}

/// Builds the selection menu for one page of results.
#[must_use]
pub fn present(candidates: &[CandidateRecord], query: &str, page: u32) -> Menu {
    if candidates.is_empty() {
        return Menu {
            header: "No matches found. Choose another option:".into(),
            lines: Vec::new(),
            buttons: fixed_buttons().into(),
        };
    }

    let mut header = String::from("🎶 Select a matching track or choose another option:");
    if page > 1 {
        let _ = write!(header, "\n(page {page} for '{query}')");
    }

    let mut lines = Vec::with_capacity(candidates.len());
    let mut buttons = Vec::with_capacity(candidates.len() + 3);
    for (idx, record) in candidates.iter().enumerate() {
        let rank = idx + 1;
        lines.push(candidate_line(rank, record));
        buttons.push(MenuButton {
            label: rank.to_string(),
            action: Action::Choose(idx),
        });
    }
    buttons.extend(fixed_buttons());

    Menu {
        header,
        lines,
        buttons,
    }
}
