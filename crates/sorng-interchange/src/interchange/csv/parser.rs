//! CSV detection and row parsing.

use log::{debug, info, warn};
use std::collections::HashSet;

use super::dialects::{DialectSpec, Field, DIALECTS};
use crate::interchange::path;
use crate::interchange::resources::{ExternalResource, ResourceIcon};
use crate::interchange::totp::ExternalTotp;
use crate::interchange::types::{InterchangeError, InterchangeResult, ItemError, ParsedFile};

/// Pick the dialect whose columns best match `headers`.
///
/// Ties go to the dialect registered first; no matching column at all is
/// an `UnsupportedFormat` error.
pub fn detect_dialect(headers: &[String]) -> InterchangeResult<&'static DialectSpec> {
    let mut best: Option<(&'static DialectSpec, usize)> = None;
    for spec in DIALECTS.iter() {
        let score = spec.score(headers);
        debug!("CSV dialect {} scored {}", spec.dialect, score);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((spec, score));
        }
    }
    match best {
        Some((spec, score)) if score > 0 => Ok(spec),
        _ => Err(InterchangeError::unsupported_format(format!(
            "Unrecognised CSV header: {}",
            headers.join(",")
        ))),
    }
}

/// Parse CSV text, detecting its dialect from the header row.
pub fn parse_csv(text: &str) -> InterchangeResult<ParsedFile> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InterchangeError::unsupported_format(format!("Unreadable CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let spec = detect_dialect(&headers)?;
    info!("Detected CSV dialect {}", spec.dialect);

    let mut parsed = ParsedFile {
        dialect: Some(spec.dialect),
        ..Default::default()
    };
    let mut failed_paths: HashSet<String> = HashSet::new();

    for (index, record) in reader.records().enumerate() {
        let row_number = index + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable CSV row {}: {}", row_number, e);
                parsed.resource_errors.push(ItemError::new(
                    format!("Row {} could not be read", row_number),
                    serde_json::json!({ "row": row_number }),
                    InterchangeError::serialization(e.to_string()),
                ));
                continue;
            }
        };

        let row = RowView {
            spec,
            headers: &headers,
            record: &record,
        };
        if row.is_blank() {
            continue;
        }

        let resource = match row.to_resource() {
            Ok(r) => r,
            Err(e) => {
                warn!("CSV row {} rejected: {}", row_number, e.message);
                parsed.resource_errors.push(ItemError::new(
                    format!("Row {} is not a valid resource", row_number),
                    row.to_source(),
                    e,
                ));
                continue;
            }
        };

        let folder_path = row.folder_path();
        let resource = if folder_path.is_empty() {
            resource
        } else {
            match parsed.folders.push_from_path(&folder_path) {
                Ok(()) => resource.with_folder_parent_path(&folder_path),
                Err(e) => {
                    if failed_paths.insert(folder_path.clone()) {
                        warn!("Folder {} rejected: {}", folder_path, e.message);
                        parsed.folder_errors.push(ItemError::new(
                            format!("Folder {} is not valid", folder_path),
                            serde_json::json!({ "folder_parent_path": folder_path }),
                            e,
                        ));
                    }
                    resource
                }
            }
        };
        parsed.resources.push(resource);
    }

    info!(
        "Parsed {} resources and {} folders ({} resource errors, {} folder errors)",
        parsed.resources.len(),
        parsed.folders.len(),
        parsed.resource_errors.len(),
        parsed.folder_errors.len()
    );
    Ok(parsed)
}

/// One CSV record read through a dialect's column mapping.
struct RowView<'a> {
    spec: &'static DialectSpec,
    headers: &'a [String],
    record: &'a csv::StringRecord,
}

impl<'a> RowView<'a> {
    fn get(&self, field: Field) -> Option<&'a str> {
        let (column, _) = self.spec.columns.iter().find(|(_, f)| *f == field)?;
        let index = self.headers.iter().position(|h| h == column)?;
        self.record.get(index).filter(|v| !v.trim().is_empty())
    }

    fn is_blank(&self) -> bool {
        self.record.iter().all(|v| v.trim().is_empty())
    }

    fn folder_path(&self) -> String {
        let raw = self.get(Field::FolderPath).unwrap_or_default();
        let mut segments = path::split_folder_path(raw);
        if let Some(root) = self.spec.root_group {
            if segments.first().map(String::as_str) == Some(root) {
                segments.remove(0);
            }
        }
        path::join_segments(&segments)
    }

    fn totp(&self) -> InterchangeResult<Option<ExternalTotp>> {
        if let Some(value) = self.get(Field::TotpUri) {
            return ExternalTotp::from_uri_or_secret(value).map(Some);
        }
        if let Some(value) = self.get(Field::TotpSecret) {
            return ExternalTotp::from_secret(value).map(Some);
        }
        Ok(None)
    }

    fn to_resource(&self) -> InterchangeResult<ExternalResource> {
        let uri = self.get(Field::Uri);
        let name = self.get(Field::Name).or(uri).unwrap_or_default();
        let icon = match self.get(Field::Icon) {
            Some(v) => ResourceIcon::keepass(v.trim().parse::<u32>().ok(), None),
            None => None,
        };
        ExternalResource::new(name)
            .with_username(self.get(Field::Username))
            .with_uri(uri)
            .with_description(self.get(Field::Description))
            .with_secret_clear(self.get(Field::Password).unwrap_or_default())
            .with_totp(self.totp()?)
            .with_icon(icon)
            .validated()
    }

    /// The row as header → value, without secret columns.
    fn to_source(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (i, header) in self.headers.iter().enumerate() {
            let secret_column = self.spec.columns.iter().any(|(name, f)| {
                name == header
                    && matches!(f, Field::Password | Field::TotpUri | Field::TotpSecret)
            });
            if secret_column {
                continue;
            }
            if let Some(value) = self.record.get(i) {
                map.insert(header.clone(), serde_json::Value::String(value.to_string()));
            }
        }
        serde_json::Value::Object(map)
    }
}
