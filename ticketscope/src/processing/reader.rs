use crate::error::{Result, TicketError};

/// Headers plus raw string records of an uploaded ticket export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// Position of a header, matched case-insensitively after trimming.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

/// Parse comma, semicolon, or tab separated ticket data.
pub fn read_table(bytes: &[u8]) -> Result<RawTable> {
    // Strip BOM if present
    let bytes = strip_bom(bytes);

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(TicketError::DataFormat("Empty ticket file".to_string()));
    }

    let delimiter = detect_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| TicketError::DataFormat(format!("Failed to read headers: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(TicketError::DataFormat("Ticket file has no headers".to_string()));
    }

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            // Row numbers are 1-based and count the header line.
            TicketError::DataFormat(format!("Failed to read row {}: {e}", index + 2))
        })?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        records.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(RawTable { headers, records })
}

/// Strip UTF-8 BOM if present
fn strip_bom(bytes: &[u8]) -> &[u8] {
    if bytes.len() >= 3 && bytes[0..3] == [0xEF, 0xBB, 0xBF] {
        &bytes[3..]
    } else {
        bytes
    }
}

/// Pick the delimiter that yields the most consistent multi-column layout.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let candidates = [b',', b';', b'\t'];
    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delimiter in &candidates {
        let score = evaluate_delimiter(bytes, delimiter);
        if score > best_score {
            best_score = score;
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}

fn evaluate_delimiter(bytes: &[u8], delimiter: u8) -> usize {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let mut column_counts: Vec<usize> = Vec::new();

    if let Ok(headers) = reader.headers() {
        column_counts.push(headers.len());
    }

    for result in reader.records().take(5) {
        if let Ok(record) = result {
            column_counts.push(record.len());
        }
    }

    let Some(&first_count) = column_counts.first() else {
        return 0;
    };

    let consistent = column_counts.iter().all(|&c| c == first_count);
    let has_multiple_columns = first_count > 1;

    if consistent && has_multiple_columns {
        first_count * 10
    } else if has_multiple_columns {
        first_count
    } else {
        0
    }
}
