use crate::error::Result;
use crate::sonarr::gateway::Gateway;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct PagedResult<T> {
    #[serde(default)]
    pub page: usize,
    #[serde(rename = "pageSize", default)]
    pub page_size: usize,
    #[serde(rename = "totalRecords")]
    pub total_records: usize,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

/// Drains a paged listing, one page after another in ascending order, converting each
/// record as it arrives.
///
/// Stops once the accumulated count reaches the total reported by the latest page, or
/// when a page comes back empty so a total that shrinks mid-scan cannot loop forever.
pub async fn fetch_all<R, T, F>(
    gateway: &Gateway<'_>,
    resource: &str,
    sort_key: &str,
    page_size: usize,
    mut convert: F,
) -> Result<Vec<T>>
where
    R: DeserializeOwned,
    F: FnMut(R) -> T,
{
    let mut current_page = 1usize;
    let mut items = Vec::new();

    loop {
        let query = [
            ("page", current_page.to_string()),
            ("pageSize", page_size.to_string()),
            ("sortDirection", "ascending".to_string()),
            ("sortKey", sort_key.to_string()),
        ];
        let paged: PagedResult<R> = gateway.get_with_query(resource, &query).await?;
        let fetched = paged.records.len();
        items.extend(paged.records.into_iter().map(&mut convert));

        debug!("Fetched page {} of {} ({} records)", current_page, resource, fetched);

        if fetched == 0 || items.len() >= paged.total_records {
            break;
        }
        current_page += 1;
    }

    Ok(items)
}
