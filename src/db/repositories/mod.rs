pub mod alerts;
pub mod detections;
pub mod images;

/// One page of results plus the pagination bookkeeping the listings
/// report alongside it.
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub per_page: i64,
}

/// Clamp raw pagination parameters to sane values. Out-of-range pages
/// stay as requested and simply yield an empty page.
pub fn clamp_page(page: Option<i64>, per_page: Option<i64>, default_per_page: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).max(1);
    (page, per_page)
}

/// Total page count for a result set: ceil(total / per_page).
/// Saturates instead of overflowing near i64::MAX.
pub fn page_count(total: i64, per_page: i64) -> i64 {
    total.saturating_add(per_page.saturating_sub(1)) / per_page
}

/// OFFSET for a page. Saturates so an absurd page number falls through
/// to an empty result set instead of wrapping.
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(per_page)
}
