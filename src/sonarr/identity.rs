use crate::error::{Result, SonarrError};
use crate::models::{Guid, Item};
use std::future::Future;
use tracing::debug;

/// Sonarr's own ID for `item`.
///
/// A `sonarr:` identifier is used directly. Failing that, a `tvdb:` identifier is looked
/// up in the full catalog returned by `scan`, which is only called in that case.
pub async fn resolve_remote_id<F, Fut, I>(item: &Item, scan: F) -> Result<i32>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<I>>,
    I: IntoIterator<Item = Item>,
{
    if let Some(id) = item.sonarr_id() {
        return Ok(id);
    }

    let Some(tvdb_id) = item.tvdb_id() else {
        return Err(SonarrError::IdentityNotFound(format!(
            "no Sonarr or TVDB identifier on \"{}\"",
            item.title
        )));
    };

    debug!("Scanning Sonarr catalog for TVDB ID {}", tvdb_id);
    let matching = scan()
        .await?
        .into_iter()
        .find(|candidate| candidate.guids.contains(&Guid::Tvdb(tvdb_id)))
        .ok_or_else(|| {
            SonarrError::IdentityNotFound(format!("could not find show with TVDB ID: {}", tvdb_id))
        })?;

    matching.sonarr_id().ok_or_else(|| {
        SonarrError::IdentityNotFound(format!(
            "show with TVDB ID {} has no Sonarr ID",
            tvdb_id
        ))
    })
}
