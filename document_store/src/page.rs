use serde::Serialize;

use crate::value::DocumentMap;

/// One page of documents plus the counts callers need to render pagination
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<DocumentMap>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

impl Page {
    pub fn new(data: Vec<DocumentMap>, total: i64, per_page: i64, current_page: i64) -> Self {
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
