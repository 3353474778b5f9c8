// src/cloud_handler.rs
use std::path::Path;

use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, DeleteSheetRequest, GridProperties, Request,
    SheetProperties, ValueRange,
};
use google_sheets4::hyper::client::HttpConnector;
use google_sheets4::hyper_rustls::HttpsConnector;
use google_sheets4::{hyper, hyper_rustls, Sheets};
use serde_json::Value;
use tracing::{debug, instrument};
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

use crate::error::{Result, SyncError};
use crate::remote::{Book, SpreadsheetService, TabRef};

/// Google Sheets backend authenticated with a service account.
pub struct CloudHandler {
    hub: Sheets<HttpsConnector<HttpConnector>>,
}

impl CloudHandler {
    /// Reads the service account key and builds an authenticated client.
    /// Any failure here is a configuration error.
    #[instrument(level = "info", skip_all, fields(credentials = %credentials_path.display()))]
    pub async fn connect(credentials_path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(credentials_path).map_err(|e| {
            SyncError::Config(format!(
                "cannot read credentials file {}: {e}",
                credentials_path.display()
            ))
        })?;

        let service_account_key: ServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| SyncError::Config(format!("invalid service account key: {e}")))?;

        let auth = ServiceAccountAuthenticator::builder(service_account_key)
            .build()
            .await
            .map_err(|e| SyncError::Config(format!("cannot build authenticator: {e}")))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_only()
            .enable_http1()
            .build();
        let hub = Sheets::new(hyper::Client::builder().build(connector), auth);

        debug!("authenticated Google Sheets client");
        Ok(CloudHandler { hub })
    }

    async fn batch_update(&self, book: &Book, request: Request) -> Result<Vec<google_sheets4::api::Response>> {
        let body = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![request]),
            ..Default::default()
        };
        let (_, response) = self
            .hub
            .spreadsheets()
            .batch_update(body, &book.id)
            .doit()
            .await?;
        Ok(response.replies.unwrap_or_default())
    }
}

/// Extracts the spreadsheet ID from a URL such as
/// `https://docs.google.com/spreadsheets/d/<ID>/edit`. Anything that is not
/// such a URL is taken to be the ID itself.
pub fn extract_spreadsheet_id(identifier: &str) -> Result<&str> {
    let identifier = identifier.trim();
    if !identifier.contains('/') {
        return if identifier.is_empty() {
            Err(SyncError::Config("empty spreadsheet identifier".into()))
        } else {
            Ok(identifier)
        };
    }

    let parts: Vec<&str> = identifier.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() && !parts[i + 1].is_empty() {
            return Ok(parts[i + 1]);
        }
    }

    Err(SyncError::Config(format!("invalid spreadsheet URL: {identifier}")))
}

/// A1 range covering a whole tab, or starting at `row` when given.
fn a1_range(title: &str, row: Option<usize>) -> String {
    let quoted = format!("'{}'", title.replace('\'', "''"));
    match row {
        Some(row) => format!("{quoted}!A{row}"),
        None => quoted,
    }
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// The API answers 400 with this text when the sheet id no longer exists.
fn mentions_missing_sheet(message: &str) -> bool {
    message.contains("No sheet with id") || message.contains("Unable to parse range")
}

impl SpreadsheetService for CloudHandler {
    async fn open(&self, identifier: &str) -> Result<Book> {
        let id = extract_spreadsheet_id(identifier)
            .map_err(|e| SyncError::RemoteAccess(e.to_string()))?;
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(id)
            .param("fields", "spreadsheetId")
            .doit()
            .await?;
        Ok(Book {
            id: spreadsheet.spreadsheet_id.unwrap_or_else(|| id.to_string()),
        })
    }

    async fn get_tab(&self, book: &Book, name: &str) -> Result<Option<TabRef>> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(&book.id)
            .param("fields", "sheets.properties(sheetId,title)")
            .doit()
            .await?;

        let tab = spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .find(|props| props.title.as_deref() == Some(name))
            .and_then(|props| {
                Some(TabRef {
                    sheet_id: props.sheet_id?,
                    title: props.title?,
                })
            });
        Ok(tab)
    }

    async fn delete_tab(&self, book: &Book, tab: &TabRef) -> Result<()> {
        let request = Request {
            delete_sheet: Some(DeleteSheetRequest {
                sheet_id: Some(tab.sheet_id),
            }),
            ..Default::default()
        };
        match self.batch_update(book, request).await {
            Ok(_) => Ok(()),
            Err(SyncError::RemoteAccess(message)) if mentions_missing_sheet(&message) => {
                Err(SyncError::TabNotFound(tab.title.clone()))
            }
            Err(other) => Err(other),
        }
    }

    async fn create_tab(&self, book: &Book, name: &str, rows: usize, cols: usize) -> Result<TabRef> {
        let request = Request {
            add_sheet: Some(AddSheetRequest {
                properties: Some(SheetProperties {
                    title: Some(name.to_string()),
                    grid_properties: Some(GridProperties {
                        row_count: Some(to_i32(rows)?),
                        column_count: Some(to_i32(cols)?),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        let replies = self.batch_update(book, request).await?;
        let sheet_id = replies
            .into_iter()
            .find_map(|reply| reply.add_sheet?.properties?.sheet_id)
            .ok_or_else(|| SyncError::RemoteAccess(format!("no sheet id returned for new tab '{name}'")))?;

        Ok(TabRef {
            sheet_id,
            title: name.to_string(),
        })
    }

    async fn write_rows(&self, book: &Book, tab: &TabRef, rows: &[Vec<String>], start_row: usize) -> Result<()> {
        let range = a1_range(&tab.title, Some(start_row));
        let values = rows
            .iter()
            .map(|row| row.iter().cloned().map(Value::String).collect())
            .collect();
        let body = ValueRange {
            range: Some(range.clone()),
            major_dimension: Some("ROWS".to_string()),
            values: Some(values),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .values_update(body, &book.id, &range)
            .value_input_option("RAW")
            .doit()
            .await?;
        Ok(())
    }

    async fn read_all_values(&self, book: &Book, tab: &TabRef) -> Result<Vec<Vec<String>>> {
        let range = a1_range(&tab.title, None);
        let (_, response) = self
            .hub
            .spreadsheets()
            .values_get(&book.id, &range)
            .value_render_option("FORMATTED_VALUE")
            .doit()
            .await
            .map_err(|e| match SyncError::from(e) {
                SyncError::RemoteAccess(message) if mentions_missing_sheet(&message) => {
                    SyncError::TabNotFound(tab.title.clone())
                }
                other => other,
            })?;

        Ok(response
            .values
            .unwrap_or_default()
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| SyncError::RemoteAccess(format!("grid dimension {value} is too large")))
}
