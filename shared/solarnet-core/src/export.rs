//! Streaming consumer seam for large result sets

/// Whether an export should keep receiving rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportAction {
    Continue,
    Stop,
}

/// Receives rows one at a time from a forward-only cursor.
pub trait DatumExportHandler<T>: Send {
    /// Called once before the first row; `total` is `None` when unknown.
    fn did_begin(&mut self, total: Option<u64>);

    fn handle(&mut self, row: T) -> ExportAction;
}

/// Handler collecting rows into memory, optionally up to a limit.
#[derive(Debug)]
pub struct CollectingHandler<T> {
    pub rows: Vec<T>,
    pub total: Option<u64>,
    limit: Option<usize>,
}

impl<T> Default for CollectingHandler<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total: None,
            limit: None,
        }
    }
}

impl<T> CollectingHandler<T> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            rows: Vec::new(),
            total: None,
            limit: Some(limit),
        }
    }
}

impl<T: Send> DatumExportHandler<T> for CollectingHandler<T> {
    fn did_begin(&mut self, total: Option<u64>) {
        self.total = total;
    }

    fn handle(&mut self, row: T) -> ExportAction {
        self.rows.push(row);
        match self.limit {
            Some(limit) if self.rows.len() >= limit => ExportAction::Stop,
            _ => ExportAction::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_handler_stops_at_limit() {
        let mut handler = CollectingHandler::with_limit(2);
        handler.did_begin(None);
        assert_eq!(handler.handle(1), ExportAction::Continue);
        assert_eq!(handler.handle(2), ExportAction::Stop);
        assert_eq!(handler.rows, vec![1, 2]);
    }
}
