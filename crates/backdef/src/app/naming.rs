//! Archive file naming from a user format string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description;

use crate::app::expand::PatternExpander;
use crate::domain::errors::PatternError;
use crate::domain::model::Compression;

/// Placeholder replaced by the definition file's base name.
pub const NAME_TOKEN: &str = "{}";
const TAR_SUFFIX: &str = ".tar";

static ARCHIVE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.tar(?:\.(?:[zZ]|gz|bz2?))?$|\.t(?:gz|bz2?)$").expect("suffix regex compiles")
});

/// Resolved archive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveName {
    /// Name of the uncompressed archive written first.
    pub tar_name: String,
    /// Name after compression and renaming.
    pub file_name: String,
}

/// Build the archive name for a definition file.
///
/// Variables and strftime sequences in `format` are substituted, `{}` becomes
/// `base`, and separators are replaced by `_`. A recognised archive suffix in
/// the result is kept; otherwise `.tar` plus the compression suffix is added.
pub fn archive_name(
    format: &str,
    base: &str,
    compression: Compression,
    expander: &PatternExpander,
    now: OffsetDateTime,
) -> Result<ArchiveName, PatternError> {
    if format.is_empty() {
        return Err(PatternError::configuration("empty archive name"));
    }
    let substituted = expander.substitute_vars(format)?;
    let dated = strftime(&substituted, now)?;
    let name = dated.replace(NAME_TOKEN, base).replace('/', "_");

    let suffix = ARCHIVE_SUFFIX.find(&name).map(|found| found.as_str().to_owned());
    let stem = match &suffix {
        Some(suffix) => name[..name.len() - suffix.len()].to_owned(),
        None => name.clone(),
    };
    if stem.is_empty() {
        return Err(PatternError::configuration("empty archive name"));
    }

    let tar_name = format!("{stem}{TAR_SUFFIX}");
    let file_name = match suffix.as_deref() {
        Some(suffix) if suffix != TAR_SUFFIX => name,
        _ => format!("{tar_name}{}", compression.extension()),
    };
    Ok(ArchiveName {
        tar_name,
        file_name,
    })
}

fn strftime(format: &str, now: OffsetDateTime) -> Result<String, PatternError> {
    let mut description = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let spec = chars
                    .next()
                    .ok_or_else(|| PatternError::configuration("dangling '%' in archive name"))?;
                let item = match spec {
                    'Y' => "[year]",
                    'y' => "[year repr:last_two]",
                    'm' => "[month]",
                    'd' => "[day]",
                    'H' => "[hour]",
                    'M' => "[minute]",
                    'S' => "[second]",
                    'j' => "[ordinal]",
                    'b' => "[month repr:short]",
                    'B' => "[month repr:long]",
                    'a' => "[weekday repr:short]",
                    'A' => "[weekday repr:long]",
                    'F' => "[year]-[month]-[day]",
                    'T' => "[hour]:[minute]:[second]",
                    '%' => "%",
                    other => {
                        return Err(PatternError::configuration(format!(
                            "unsupported time directive '%{other}' in archive name"
                        )));
                    }
                };
                description.push_str(item);
            }
            '[' => description.push_str("[["),
            other => description.push(other),
        }
    }

    let items = format_description::parse_borrowed::<1>(&description)
        .map_err(|err| PatternError::configuration(format!("invalid archive name format: {err}")))?;
    now.format(&items)
        .map_err(|err| PatternError::configuration(format!("cannot format archive name: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use time::macros::datetime;

    use crate::app::expand::ExpandOptions;
    use crate::infra::env::StaticEnvironment;

    fn expander() -> PatternExpander {
        let env = StaticEnvironment::new().with_var("HOST", "box");
        PatternExpander::new(Arc::new(env), ExpandOptions::default())
    }

    fn name(format: &str, compression: Compression) -> ArchiveName {
        archive_name(
            format,
            "configs",
            compression,
            &expander(),
            datetime!(2024-03-09 14:05:00 UTC),
        )
        .expect("name resolves")
    }

    #[test]
    fn default_format_uses_base_name() {
        let plain = name(NAME_TOKEN, Compression::None);
        assert_eq!(plain.tar_name, "configs.tar");
        assert_eq!(plain.file_name, "configs.tar");

        let gz = name(NAME_TOKEN, Compression::Gzip);
        assert_eq!(gz.file_name, "configs.tar.gz");
    }

    #[test]
    fn substitutes_variables_dates_and_separators() {
        let named = name("$HOST/{}-%Y%m%d", Compression::Bzip2);
        assert_eq!(named.file_name, "box_configs-20240309.tar.bz2");
        assert_eq!(named.tar_name, "box_configs-20240309.tar");
    }

    #[test]
    fn explicit_suffix_is_kept() {
        let named = name("{}.tgz", Compression::Bzip2);
        assert_eq!(named.file_name, "configs.tgz");
        assert_eq!(named.tar_name, "configs.tar");

        let tar = name("{}.tar", Compression::Gzip);
        assert_eq!(tar.file_name, "configs.tar.gz");
    }

    #[test]
    fn rejects_empty_and_unknown_directives() {
        let env = expander();
        let now = datetime!(2024-03-09 14:05:00 UTC);
        assert!(archive_name("", "x", Compression::None, &env, now).is_err());
        assert!(archive_name("%Q", "x", Compression::None, &env, now).is_err());
    }
}
