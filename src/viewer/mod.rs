//! Read-only query surface for a table/detail view.
//!
//! The facade never mutates the log. It keeps one piece of state of its own,
//! the current selection, stored as a sequence id so the detail view picks up
//! a response that arrives after the row was selected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::error::{GqlScopeError, Result};
use crate::registry::{CallRecord, CallRegistry, SequenceId};
use crate::traffic::{HttpService, MessageHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Sequence,
    Host,
    Method,
    Url,
    OperationName,
    Status,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Sequence,
        Column::Host,
        Column::Method,
        Column::Url,
        Column::OperationName,
        Column::Status,
    ];

    /// Table header text.
    pub fn header(self) -> &'static str {
        match self {
            Column::Sequence => "#",
            Column::Host => "Host",
            Column::Method => "Method",
            Column::Url => "URL",
            Column::OperationName => "OpName",
            Column::Status => "Status",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Sequence => "sequence",
            Column::Host => "host",
            Column::Method => "method",
            Column::Url => "url",
            Column::OperationName => "operation_name",
            Column::Status => "status",
        }
    }

    pub fn from_index(index: usize) -> Option<Column> {
        Column::ALL.get(index).copied()
    }

    fn value(self, record: &CallRecord) -> DisplayValue {
        match self {
            Column::Sequence => DisplayValue::Number(record.sequence_id.get()),
            Column::Host => DisplayValue::Text(record.host.clone()),
            Column::Method => DisplayValue::Text(record.method.clone()),
            Column::Url => DisplayValue::Text(record.url.clone()),
            Column::OperationName => DisplayValue::Text(record.operation_name.clone()),
            Column::Status => match record.status_code {
                Some(code) => DisplayValue::Number(u64::from(code)),
                None => DisplayValue::Text(String::new()),
            },
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = GqlScopeError;

    /// Accepts the snake_case name or the header, in any case.
    fn from_str(s: &str) -> Result<Self> {
        Column::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s) || c.header().eq_ignore_ascii_case(s))
            .ok_or_else(|| GqlScopeError::UnknownColumn(s.to_string()))
    }
}

/// A cell value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Number(u64),
    Text(String),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Number(n) => write!(f, "{}", n),
            DisplayValue::Text(s) => f.write_str(s),
        }
    }
}

/// Table and detail view over a shared registry.
pub struct ViewerFacade {
    registry: Arc<CallRegistry>,
    selected: Mutex<Option<SequenceId>>,
}

impl ViewerFacade {
    pub fn new(registry: Arc<CallRegistry>) -> Self {
        Self {
            registry,
            selected: Mutex::new(None),
        }
    }

    pub fn row_count(&self) -> usize {
        self.registry.len()
    }

    pub fn column_count(&self) -> usize {
        Column::ALL.len()
    }

    pub fn column_name(&self, column: Column) -> &'static str {
        column.header()
    }

    /// Cell at `row` (0-based). A row past the end is an error.
    pub fn field_at(&self, row: usize, column: Column) -> Result<DisplayValue> {
        let record = self.registry.get_row(row)?;
        Ok(column.value(&record))
    }

    /// All cells of one row, in column order.
    pub fn row(&self, row: usize) -> Result<Vec<DisplayValue>> {
        let record = self.registry.get_row(row)?;
        Ok(Column::ALL.iter().map(|c| c.value(&record)).collect())
    }

    /// Every row, in display order.
    pub fn rows(&self) -> Vec<Vec<DisplayValue>> {
        self.registry
            .snapshot()
            .iter()
            .map(|record| Column::ALL.iter().map(|c| c.value(record)).collect())
            .collect()
    }

    /// Select `row` for the detail view.
    ///
    /// A row outside the log clears the selection instead of failing.
    pub fn select_row(&self, row: usize) -> Option<CallRecord> {
        let record = self.registry.get_row(row).ok();
        *self.selection() = record.as_ref().map(|r| r.sequence_id);
        record
    }

    pub fn clear_selection(&self) {
        *self.selection() = None;
    }

    /// Current state of the selected record, if it is still in the log.
    pub fn selected(&self) -> Option<CallRecord> {
        let sequence_id = (*self.selection())?;
        self.registry.get(sequence_id).ok()
    }

    pub fn selected_service(&self) -> Option<HttpService> {
        self.selected().map(|r| r.service)
    }

    pub fn selected_request(&self) -> Option<MessageHandle> {
        self.selected().map(|r| r.request)
    }

    pub fn selected_response(&self) -> Option<MessageHandle> {
        self.selected().and_then(|r| r.response)
    }

    fn selection(&self) -> std::sync::MutexGuard<'_, Option<SequenceId>> {
        self.selected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::call;

    const HOST: &str = "api.example.com";
    const URL: &str = "https://api.example.com/graphql";

    fn setup() -> (Arc<CallRegistry>, ViewerFacade) {
        let registry = Arc::new(CallRegistry::new());
        let viewer = ViewerFacade::new(Arc::clone(&registry));
        (registry, viewer)
    }

    #[test]
    fn test_fields() {
        let (registry, viewer) = setup();
        let seq = registry.insert(call(HOST, "POST", URL, "GetUser"));
        assert_eq!(viewer.row_count(), 1);
        assert_eq!(viewer.column_count(), 6);

        assert_eq!(
            viewer.field_at(0, Column::Sequence).unwrap(),
            DisplayValue::Number(seq.get())
        );
        assert_eq!(viewer.field_at(0, Column::Host).unwrap().to_string(), HOST);
        assert_eq!(viewer.field_at(0, Column::Method).unwrap().to_string(), "POST");
        assert_eq!(viewer.field_at(0, Column::Url).unwrap().to_string(), URL);
        assert_eq!(viewer.field_at(0, Column::OperationName).unwrap().to_string(), "GetUser");
        assert_eq!(viewer.field_at(0, Column::Status).unwrap().to_string(), "");

        registry.record_response(HOST, "POST", URL, Some((Arc::from(&b"HTTP/1.1 200 OK\r\n\r\n"[..]), 200)));
        assert_eq!(viewer.field_at(0, Column::Status).unwrap(), DisplayValue::Number(200));
    }

    #[test]
    fn test_field_out_of_range_is_error() {
        let (_registry, viewer) = setup();
        let err = viewer.field_at(0, Column::Host).unwrap_err();
        assert!(matches!(err, GqlScopeError::RowOutOfRange { row: 0, len: 0 }));
        assert!(viewer.row(3).is_err());
    }

    #[test]
    fn test_column_parsing() {
        assert_eq!("host".parse::<Column>().unwrap(), Column::Host);
        assert_eq!("OpName".parse::<Column>().unwrap(), Column::OperationName);
        assert_eq!("operation_name".parse::<Column>().unwrap(), Column::OperationName);
        assert_eq!("#".parse::<Column>().unwrap(), Column::Sequence);
        assert_eq!("URL".parse::<Column>().unwrap(), Column::Url);
        assert!(matches!(
            "latency".parse::<Column>(),
            Err(GqlScopeError::UnknownColumn(_))
        ));
        assert_eq!(Column::from_index(5), Some(Column::Status));
        assert_eq!(Column::from_index(6), None);
    }

    #[test]
    fn test_select_out_of_range_clears() {
        let (registry, viewer) = setup();
        registry.insert(call(HOST, "POST", URL, "A"));

        assert!(viewer.select_row(0).is_some());
        assert!(viewer.selected().is_some());

        assert!(viewer.select_row(9).is_none());
        assert!(viewer.selected().is_none());
        assert!(viewer.selected_request().is_none());
        assert!(viewer.selected_service().is_none());
    }

    #[test]
    fn test_selection_sees_late_response() {
        let (registry, viewer) = setup();
        registry.insert(call(HOST, "POST", URL, "A"));
        let record = viewer.select_row(0).unwrap();
        assert!(viewer.selected_response().is_none());
        assert_eq!(viewer.selected_request().as_deref(), Some(&*record.request));
        assert_eq!(viewer.selected_service(), Some(HttpService::https(HOST)));

        let resp: MessageHandle = Arc::from(&b"HTTP/1.1 200 OK\r\n\r\n{}"[..]);
        registry.record_response(HOST, "POST", URL, Some((resp.clone(), 200)));
        assert_eq!(viewer.selected_response().as_deref(), Some(&*resp));
    }

    #[test]
    fn test_reset_drops_selection() {
        let (registry, viewer) = setup();
        registry.insert(call(HOST, "POST", URL, "A"));
        viewer.select_row(0);
        registry.reset();
        assert!(viewer.selected().is_none());

        registry.insert(call(HOST, "POST", URL, "B"));
        assert!(viewer.selected().is_none());
    }

    #[test]
    fn test_rows() {
        let (registry, viewer) = setup();
        registry.insert(call(HOST, "POST", URL, "A"));
        registry.insert(call(HOST, "GET", URL, "B"));
        let rows = viewer.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2].to_string(), "GET");
        assert_eq!(rows[1][4].to_string(), "B");
        assert_eq!(viewer.row(1).unwrap(), rows[1]);
    }
}
