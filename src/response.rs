//! Uniform response envelope.
//!
//! Every JSON response, successful or not, is wrapped as
//! `{code, success, message, data, timestamp}`. The HTTP status always
//! mirrors `code`. Paginated lists place a [`PageData`] in `data`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Timestamp layout used in every envelope.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum page size accepted from clients.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// HTTP status code, mirrored by the response status.
    pub code: u16,
    /// `true` for 2xx codes.
    pub success: bool,
    /// Human readable message.
    pub message: String,
    /// Payload, `null` when absent.
    pub data: Option<T>,
    /// Generation time, `YYYY-MM-DD HH:MM:SS` in UTC.
    pub timestamp: String,
}

fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

impl<T> ApiResponse<T> {
    /// A 200 envelope carrying `data`.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            success: true,
            message: message.into(),
            data: Some(data),
            timestamp: now_timestamp(),
        }
    }

    /// An error envelope with optional detail payload.
    pub fn error(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code: status.as_u16(),
            success: status.is_success(),
            message: message.into(),
            data,
            timestamp: now_timestamp(),
        }
    }
}

impl ApiResponse<()> {
    /// A 200 envelope with no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            success: true,
            message: message.into(),
            data: None,
            timestamp: now_timestamp(),
        }
    }
}

impl<T> ApiResponse<PageData<T>> {
    /// A 200 envelope carrying one page of a list.
    pub fn page(list: Vec<T>, total: u64, page: &PageQuery, message: impl Into<String>) -> Self {
        Self::success(PageData::new(list, total, page.page(), page.page_size()), message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// One page of a list result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData<T> {
    /// Items on this page.
    pub list: Vec<T>,
    /// Total items across all pages.
    pub total: u64,
    /// Page number, 1-based.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// `ceil(total / page_size)`.
    pub total_pages: u64,
}

impl<T> PageData<T> {
    /// Builds a page and derives `total_pages`.
    pub fn new(list: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        Self {
            list,
            total,
            page,
            page_size,
            total_pages: total_pages(total, page_size),
        }
    }
}

/// `ceil(total / page_size)`; zero when `page_size` is zero.
#[must_use]
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// Pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Page number (1-based, default 1).
    pub page: Option<u32>,
    /// Page size (default 20, max 100).
    pub page_size: Option<u32>,
}

impl PageQuery {
    /// Effective page number, never below 1.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size, clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset for LIMIT/OFFSET queries.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }
}
