use anyhow::{Context, Result};
use common::candidate::ResolvedMetadata;
use common::executor::TagWriter;
use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::fs::File;
use std::path::Path;

/// Writes tags through lofty, creating the file's primary tag if it has none.
pub struct LoftyTagger;

impl TagWriter for LoftyTagger {
    fn write_tags(&self, path: &Path, metadata: &ResolvedMetadata) -> Result<()> {
        let path_display = path.display();

        let mut tagged_file = {
            let file =
                File::open(path).with_context(|| format!("Failed to open file: {path_display}"))?;
            let mut probe = Probe::new(file);

            // Hint the file type based on extension if possible
            if let Some(file_type) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(lofty::file::FileType::from_ext)
            {
                probe = probe.set_file_type(file_type);
            }

            probe
                .read()
                .with_context(|| format!("Failed to read {path_display}"))?
        }; // file handle goes out of scope here

        if tagged_file.primary_tag().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged_file
            .primary_tag_mut()
            .context("No primary tag found")?;
        apply(tag, metadata);

        tagged_file
            .save_to_path(path, WriteOptions::default())
            .with_context(|| format!("Failed to write tags to {path_display}"))?;

        tracing::debug!("Tags written to {path_display}");
        Ok(())
    }
}

fn apply(tag: &mut Tag, metadata: &ResolvedMetadata) {
    tag.set_title(metadata.title.clone());
    tag.set_artist(metadata.artist.clone());
    tag.set_album(metadata.album.clone());
}
