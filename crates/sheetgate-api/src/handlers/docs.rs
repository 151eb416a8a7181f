//! Self-describing index served at `/`.

use axum::Json;
use serde_json::{json, Value};

use crate::constants::SERVICE_NAME;

pub async fn api_docs() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "endpoints": {
            "/convert": {
                "method": "POST",
                "description": "Convert csv, xls, xlsx, ods, or json to xlsx",
                "auth": "Authorization: Bearer <token>",
                "request": "multipart/form-data, field name: file",
                "response": "xlsx file as attachment",
                "errors": [
                    "File too large",
                    "Unsupported file type",
                    "Unauthorized",
                    "Conversion error",
                    "Conversion service unavailable"
                ]
            },
            "/health": {
                "method": "GET",
                "description": "Health check",
                "response": "{\"status\": \"ok\"}"
            },
            "/ready": {
                "method": "GET",
                "description": "Reports whether a conversion engine is reachable",
                "response": "{\"status\": \"ready\", \"engine\": \"<url>\"}"
            }
        }
    }))
}
