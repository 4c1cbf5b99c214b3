pub mod drive;
pub mod musicbrainz;
pub mod ytdlp;
