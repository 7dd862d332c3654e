//! Turns configuration-level references into the concrete values Sonarr's create and
//! update endpoints expect.
//!
//! Missing or unmatched references degrade to a usable default with a warning. Only an
//! empty remote resource list is an error.

use crate::config::{ResourceRef, SeriesType};
use crate::error::{Result, SonarrError};
use crate::models::{QualityProfile, RootFolder, Tag};
use tracing::{debug, info, warn};

pub const DEFAULT_SEASON_MONITORING: &str = "all";

/// What to do when a reference matches none of the remote candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Use the first candidate the server reported.
    First,
    /// Resolve to nothing.
    Skip,
}

/// First present value across the per-call override and the configured default.
pub fn prefer<T>(override_value: Option<T>, configured: Option<T>) -> Option<T> {
    override_value.or(configured)
}

/// Finds the candidate `matches` selects, applying `fallback` with a warning naming every
/// available candidate when nothing matches.
pub fn match_candidate<'c, C>(
    what: &str,
    reference: &ResourceRef,
    candidates: &'c [C],
    matches: impl Fn(&C) -> bool,
    describe: impl Fn(&C) -> &str,
    fallback: Fallback,
) -> Option<&'c C> {
    if let Some(found) = candidates.iter().find(|c| matches(c)) {
        return Some(found);
    }

    let available: Vec<&str> = candidates.iter().map(&describe).collect();
    match fallback {
        Fallback::First => {
            warn!(
                "Could not find {} \"{}\". Available: {}",
                what,
                reference,
                available.join(", ")
            );
            candidates.first()
        }
        Fallback::Skip => {
            warn!("{} \"{}\" not found in Sonarr - skipping", what, reference);
            None
        }
    }
}

/// Numeric references are used as-is without consulting `profiles`. Names match
/// case-insensitively and fall back to the first profile.
pub fn quality_profile_id(
    reference: Option<&ResourceRef>,
    profiles: &[QualityProfile],
) -> Result<i32> {
    if let Some(id) = reference.and_then(ResourceRef::as_id) {
        return Ok(id);
    }

    let first = profiles.first().ok_or(SonarrError::NoQualityProfile)?;
    let Some(reference) = reference else {
        info!("Using default quality profile: {} (ID: {})", first.name, first.id);
        return Ok(first.id);
    };

    let wanted = reference.to_string().to_lowercase();
    let profile = match_candidate(
        "quality profile",
        reference,
        profiles,
        |p| p.name.to_lowercase() == wanted,
        |p| p.name.as_str(),
        Fallback::First,
    )
    .unwrap_or(first);

    info!("Using quality profile: {} (ID: {})", profile.name, profile.id);
    Ok(profile.id)
}

pub fn first_root_folder(folders: &[RootFolder]) -> Result<String> {
    let folder = folders.first().ok_or(SonarrError::NoRootFolder)?;
    info!("Using root folder: {}", folder.path);
    Ok(folder.path.clone())
}

/// Per-call tag overrides win when non-empty, otherwise the configured defaults apply.
/// Every reference is checked against `existing`; whatever does not resolve is dropped.
pub fn tag_ids(
    overrides: Option<&[ResourceRef]>,
    configured: &[ResourceRef],
    existing: &[Tag],
) -> Vec<i32> {
    let references = selected_tags(overrides, configured);
    let mut ids: Vec<i32> = Vec::with_capacity(references.len());

    for reference in references {
        let found = match reference.as_id() {
            Some(id) => match_candidate(
                "Tag ID",
                reference,
                existing,
                |t| t.id == id,
                |t| t.label.as_str(),
                Fallback::Skip,
            ),
            None => {
                let label = reference.to_string();
                match_candidate(
                    "Tag",
                    reference,
                    existing,
                    |t| t.label == label,
                    |t| t.label.as_str(),
                    Fallback::Skip,
                )
            }
        };

        if let Some(tag) = found {
            debug!("Using existing tag: {} (ID: {})", tag.label, tag.id);
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }
    }

    ids
}

/// Tag references an add operation will try to resolve.
pub fn selected_tags<'a>(
    overrides: Option<&'a [ResourceRef]>,
    configured: &'a [ResourceRef],
) -> &'a [ResourceRef] {
    match overrides {
        Some(tags) if !tags.is_empty() => tags,
        _ => configured,
    }
}

pub fn season_monitoring(override_value: Option<&str>, configured: Option<&str>) -> String {
    prefer(
        override_value.filter(|s| !s.is_empty()),
        configured.filter(|s| !s.is_empty()),
    )
    .unwrap_or(DEFAULT_SEASON_MONITORING)
    .to_string()
}

pub fn series_type(override_value: Option<SeriesType>, configured: Option<SeriesType>) -> SeriesType {
    prefer(override_value, configured).unwrap_or_default()
}
