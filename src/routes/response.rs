/// Success envelopes shared by every JSON endpoint
///
/// Failures are rendered by `AppError`; these cover the `success: true` side.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(message: impl Into<String>, data: Vec<T>, meta: PageMeta) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            meta,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PageMeta {
    pub total_records: i64,
    pub items_on_page: usize,
    pub per_page: u32,
    pub current_page: u32,
    pub total_pages: i64,
    pub has_more_pages: bool,
}

impl PageMeta {
    pub fn new(total_records: i64, items_on_page: usize, per_page: u32, current_page: u32) -> Self {
        let per_page_i64 = i64::from(per_page.max(1));
        let total_pages = (total_records.max(0) + per_page_i64 - 1) / per_page_i64;

        Self {
            total_records,
            items_on_page,
            per_page,
            current_page,
            total_pages,
            has_more_pages: i64::from(current_page) < total_pages,
        }
    }
}
