//! CSV export.

use log::info;

use super::dialects::{spec_for, Field};
use crate::interchange::path;
use crate::interchange::resources::{ExternalResource, ExternalResourceCollection};
use crate::interchange::types::{CsvDialect, InterchangeError, InterchangeResult};

/// Serialise resources in `dialect`. Resources must carry clear secrets.
pub fn write_csv(
    dialect: CsvDialect,
    resources: &ExternalResourceCollection,
) -> InterchangeResult<String> {
    let spec = spec_for(dialect);
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(spec.header())?;

    for resource in resources.iter() {
        let row: Vec<String> = spec
            .columns
            .iter()
            .map(|(_, field)| cell(resource, *field, spec.root_group))
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| InterchangeError::serialization(format!("CSV flush failed: {}", e)))?;
    info!("Wrote {} resources as {} CSV", resources.len(), dialect);
    String::from_utf8(bytes)
        .map_err(|e| InterchangeError::serialization(format!("CSV output is not UTF-8: {}", e)))
}

fn cell(resource: &ExternalResource, field: Field, root_group: Option<&str>) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    match field {
        Field::Name => resource.name.clone(),
        Field::Username => opt(&resource.username),
        Field::Uri => opt(&resource.uri),
        Field::Password => resource.secret_clear().unwrap_or_default().to_string(),
        Field::Description => opt(&resource.description),
        Field::FolderPath => match root_group {
            Some(root) => path::prefix_path(root, &resource.folder_parent_path),
            None => resource.folder_parent_path.clone(),
        },
        Field::TotpUri => resource
            .totp
            .as_ref()
            .map(|t| t.to_otpauth_url(&resource.name, None))
            .unwrap_or_default(),
        Field::TotpSecret => resource
            .totp
            .as_ref()
            .map(|t| t.secret_key.clone())
            .unwrap_or_default(),
        Field::Icon => resource
            .icon
            .as_ref()
            .and_then(|i| i.value)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        Field::Fixed(value) => value.to_string(),
        Field::Ignored => String::new(),
    }
}
