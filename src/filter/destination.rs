use super::escape::escape_attribute;
use crate::config::DestinationTable;
use crate::error::{QueryError, Result};

/// Map repository identifiers to their wire codes and join them in the
/// provider's destination syntax. Input order is preserved.
pub fn build_destination_value<S: AsRef<str>>(
    repositories: &[S],
    table: &DestinationTable,
) -> Result<String> {
    let codes = repositories
        .iter()
        .map(|repository| {
            let repository = repository.as_ref();
            table
                .code(repository)
                .ok_or_else(|| QueryError::UnknownDestination(repository.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let joined = codes.join(table.separator.as_str());
    Ok(escape_attribute(&joined, "destination")?.into_owned())
}
