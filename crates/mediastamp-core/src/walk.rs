use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cancel;
use crate::classify::{classify, Mode};
use crate::error::Result;
use crate::media::{MediaFile, MediaKind};
use crate::patch::{patch_image, patch_video, PatchOutcome};
use crate::report::RunStats;
use crate::{RunConfig, Services};

/// Walk `dir` (one level, or the whole subtree with `config.recursive`),
/// patch every file matching `config.mode` and tally the outcomes.
///
/// Per-file problems never stop the walk; only a failed precondition or
/// cancellation does.
pub fn walk_directory(dir: &Path, config: &RunConfig, services: &Services) -> Result<RunStats> {
    config.validate_for(dir)?;

    let files = list_files(dir, config.recursive, services);
    let total = files.len() as u64;
    let mut stats = RunStats::default();

    for (i, path) in files.into_iter().enumerate() {
        cancel::checkpoint(services.cancel)?;
        stats.total_files += 1;

        if let Some(outcome) = process_file(path, config, services) {
            stats.matched_files += 1;
            match outcome {
                PatchOutcome::Exists => stats.metadata_exists += 1,
                PatchOutcome::Updated => stats.updated += 1,
                PatchOutcome::Failed(_) => stats.failed += 1,
            }
        }
        services.reporter.progress("patch", i as u64 + 1, total);
    }

    Ok(stats)
}

fn list_files(dir: &Path, recursive: bool, services: &Services) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        match entry {
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => services
                .reporter
                .error(&format!("Cannot read directory entry: {e}")),
        }
    }
    files
}

/// `None` when the file does not follow the active naming convention.
fn process_file(path: PathBuf, config: &RunConfig, services: &Services) -> Option<PatchOutcome> {
    // non UTF-8 names cannot match either convention
    let filename = path.file_name()?.to_str()?.to_string();

    let classification = match classify(&filename) {
        Ok(c) => c,
        Err(e) if config.mode == Mode::WhatsApp => {
            services
                .reporter
                .error(&format!("Error processing {}: {}", path.display(), e));
            return Some(PatchOutcome::Failed(e.to_string()));
        }
        Err(_) => return None,
    };
    if !config.mode.accepts(&classification) {
        return None;
    }

    let mut media = MediaFile::new(path, filename, classification);
    let Some(date) = classification.embedded_date().or(config.fallback_date) else {
        return Some(PatchOutcome::Failed("no date available".into()));
    };

    let outcome = match media.kind {
        MediaKind::Image => patch_image(&media.path, date, services.reporter),
        MediaKind::Video => patch_video(
            &media.path,
            date,
            services.remuxer,
            config.check_video_metadata,
            services.reporter,
        ),
        MediaKind::Other => PatchOutcome::Failed(format!("unsupported media type: {}", media.filename)),
    };
    media.outcome = Some(outcome.clone());
    tracing::debug!(
        file = %media.filename,
        classification = ?media.classification,
        kind = ?media.kind,
        had_metadata = media.had_metadata(),
        ?outcome,
        "processed"
    );
    Some(outcome)
}
