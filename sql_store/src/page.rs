use serde::Serialize;

use crate::value::RowMap;

/// One page of results plus the counts callers need to render pagination
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<RowMap>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

impl Page {
    pub fn new(data: Vec<RowMap>, total: i64, per_page: i64, current_page: i64) -> Self {
        Self {
            data,
            total,
            per_page,
            current_page,
            last_page: last_page_for(total, per_page),
        }
    }
}

/// ceil(total / per_page) without floating point
pub fn last_page_for(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_rounds_up() {
        assert_eq!(last_page_for(25, 10), 3);
        assert_eq!(last_page_for(30, 10), 3);
        assert_eq!(last_page_for(31, 10), 4);
        assert_eq!(last_page_for(0, 10), 0);
        assert_eq!(last_page_for(1, 10), 1);
    }
}
