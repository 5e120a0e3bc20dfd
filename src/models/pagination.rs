use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub search: Option<String>,
}

impl PaginationQuery {
    pub fn validate(&mut self) {
        if self.page < 1 {
            self.page = 1;
        }
        if self.per_page < 1 || self.per_page > 100 {
            self.per_page = 10;
        }
        if matches!(self.search.as_deref().map(str::trim), Some("")) {
            self.search = None;
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
            search: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaginationMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(current_page: i64, per_page: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            1
        } else {
            (total_items + per_page - 1) / per_page
        };

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut query = PaginationQuery {
            page: 0,
            per_page: 500,
            search: Some("   ".into()),
        };
        query.validate();
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 10);
        assert_eq!(query.search, None);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PaginationMeta::new(1, 10, 0).total_pages, 1);
        assert_eq!(PaginationMeta::new(1, 10, 10).total_pages, 1);
        assert_eq!(PaginationMeta::new(2, 10, 11).total_pages, 2);
    }
}
