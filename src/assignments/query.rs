use serde::{Deserialize, Serialize};
use time::{Date, Duration};
use url::form_urlencoded;

use crate::error::{ApiError, ApiResult};

pub const PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Date bucket, each a closed interval ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
    Year,
}

impl DateRange {
    pub fn parse(s: &str) -> Option<DateRange> {
        match s {
            "all" => Some(DateRange::All),
            "today" => Some(DateRange::Today),
            "week" => Some(DateRange::Week),
            "month" => Some(DateRange::Month),
            "year" => Some(DateRange::Year),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::All => "all",
            DateRange::Today => "today",
            DateRange::Week => "week",
            DateRange::Month => "month",
            DateRange::Year => "year",
        }
    }

    /// Inclusive `(from, to)`; `None` means unbounded.
    pub fn bounds(self, today: Date) -> Option<(Date, Date)> {
        let days = match self {
            DateRange::All => return None,
            DateRange::Today => 1,
            DateRange::Week => 7,
            DateRange::Month => 30,
            DateRange::Year => 365,
        };
        Some((today - Duration::days(days - 1), today))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Finished,
    Unfinished,
}

impl StatusFilter {
    /// `pending` is what older dashboards send for unfinished meals.
    pub fn parse(s: &str) -> Option<StatusFilter> {
        match s {
            "finished" => Some(StatusFilter::Finished),
            "unfinished" | "pending" => Some(StatusFilter::Unfinished),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::Finished => "finished",
            StatusFilter::Unfinished => "unfinished",
        }
    }

    pub fn finished(self) -> bool {
        self == StatusFilter::Finished
    }
}

/// Raw query string of `GET /all-meal-stats`. Everything arrives as text so
/// bad values get our own 400 message instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub user_id: Option<String>,
    pub dietician_id: Option<String>,
    pub status: Option<String>,
    pub date_range: Option<String>,
}

/// Selected filters plus the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsFilterState {
    user_id: Option<i64>,
    dietician_id: Option<i64>,
    status: Option<StatusFilter>,
    date_range: DateRange,
    page: u32,
    per_page: u32,
}

impl Default for StatsFilterState {
    fn default() -> Self {
        Self {
            user_id: None,
            dietician_id: None,
            status: None,
            date_range: DateRange::All,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StatsFilterState {
    pub fn from_query(q: StatsQuery) -> ApiResult<Self> {
        let mut st = Self::default();

        if let Some(raw) = non_blank(&q.user_id) {
            st.set_user(Some(parse_id(raw, "userId")?));
        }
        if let Some(raw) = non_blank(&q.dietician_id) {
            st.set_dietician(Some(parse_id(raw, "dieticianId")?));
        }
        if let Some(raw) = non_blank(&q.status) {
            let status = StatusFilter::parse(&raw.to_lowercase())
                .ok_or_else(|| ApiError::validation("status must be finished or unfinished"))?;
            st.set_status(Some(status));
        }
        if let Some(raw) = non_blank(&q.date_range) {
            let range = DateRange::parse(&raw.to_lowercase()).ok_or_else(|| {
                ApiError::validation("dateRange must be one of today, week, month, year, all")
            })?;
            st.set_date_range(range);
        }
        if let Some(raw) = non_blank(&q.per_page) {
            let size = raw
                .parse::<u32>()
                .ok()
                .filter(|n| PAGE_SIZES.contains(n))
                .ok_or_else(|| ApiError::validation("perPage must be one of 10, 20, 50, 100"))?;
            st.set_per_page(size);
        }
        // page last, every setter above resets it
        if let Some(raw) = non_blank(&q.page) {
            let page = raw
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| ApiError::validation("page must be a positive number"))?;
            st.set_page(page);
        }
        Ok(st)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn dietician_id(&self) -> Option<i64> {
        self.dietician_id
    }

    pub fn status(&self) -> Option<StatusFilter> {
        self.status
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn set_user(&mut self, user_id: Option<i64>) {
        self.user_id = user_id;
        self.page = 1;
    }

    pub fn set_dietician(&mut self, dietician_id: Option<i64>) {
        self.dietician_id = dietician_id;
        self.page = 1;
    }

    /// Pins the dietician filter to the caller's own id. Not a user selection,
    /// so the requested page stays.
    pub fn restrict_to_dietician(&mut self, dietician_id: i64) {
        self.dietician_id = Some(dietician_id);
    }

    pub fn set_status(&mut self, status: Option<StatusFilter>) {
        self.status = status;
        self.page = 1;
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.date_range = range;
        self.page = 1;
    }

    /// Keeps the filters; the old page would point past a different slice.
    pub fn set_per_page(&mut self, per_page: u32) {
        self.per_page = per_page;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Drops every filter, keeps the page size.
    pub fn clear(&mut self) {
        *self = Self {
            per_page: self.per_page,
            ..Self::default()
        };
    }

    pub fn with_page(&self, page: u32) -> Self {
        let mut next = self.clone();
        next.set_page(page);
        next
    }

    /// Canonical query string, the same one [`StatsFilterState::from_query`] reads back.
    pub fn to_query_string(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("page", &self.page.to_string());
        ser.append_pair("perPage", &self.per_page.to_string());
        if let Some(id) = self.user_id {
            ser.append_pair("userId", &id.to_string());
        }
        if let Some(id) = self.dietician_id {
            ser.append_pair("dieticianId", &id.to_string());
        }
        if let Some(s) = self.status {
            ser.append_pair("status", s.as_str());
        }
        if self.date_range != DateRange::All {
            ser.append_pair("dateRange", self.date_range.as_str());
        }
        ser.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PageInfo {
    pub fn new(page: u32, per_page: u32, total_count: i64) -> Self {
        let per = i64::from(per_page.max(1));
        let total_pages = (total_count.max(0) + per - 1) / per;
        Self {
            current_page: page,
            per_page,
            total_count,
            total_pages,
            has_next_page: i64::from(page) < total_pages,
            has_previous_page: page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl Links {
    pub fn new(filters: &StatsFilterState, info: &PageInfo) -> Self {
        let page = filters.page();
        Self {
            next: info
                .has_next_page
                .then(|| filters.with_page(page + 1).to_query_string()),
            previous: info
                .has_previous_page
                .then(|| filters.with_page(page - 1).to_query_string()),
        }
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_id(raw: &str, name: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::validation(format!("{name} must be a number")))
}
