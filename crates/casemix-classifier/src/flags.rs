//! Classifier option flags.

use casemix_core::CasemixError;

/// Produce one extra result per RUM (required by dispensation).
pub const MONO: u32 = 1 << 0;
/// Skip the short-stay RSS confirmation requirement.
pub const IGNORE_CONFIRMATION: u32 = 1 << 1;
/// Skip the procedure documentation warning.
pub const IGNORE_PROCEDURE_DOC: u32 = 1 << 2;
/// Accept procedures outside their table validity window.
pub const IGNORE_PROCEDURE_EXTENSION: u32 = 1 << 3;

/// CSV option names for `-o`, with help text.
pub const CLASSIFY_FLAG_OPTIONS: [(&str, u32, &str); 4] = [
    ("mono", MONO, "Perform mono-stay classification"),
    ("ignore_confirm", IGNORE_CONFIRMATION, "Ignore RSS confirmation flag"),
    ("ignore_proc_doc", IGNORE_PROCEDURE_DOC, "Ignore procedure documentation check"),
    ("ignore_proc_ext", IGNORE_PROCEDURE_EXTENSION, "Ignore procedure validity dates"),
];

/// Parse a comma-separated option list (e.g. `"mono,ignore_confirm"`).
pub fn parse_flags(csv: &str) -> Result<u32, CasemixError> {
    let mut flags = 0;
    for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (_, bit, _) = CLASSIFY_FLAG_OPTIONS
            .iter()
            .find(|(option, _, _)| *option == name)
            .ok_or_else(|| CasemixError::MalformedCode(format!("unknown classifier flag '{name}'")))?;
        flags |= bit;
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_lists() {
        assert_eq!(parse_flags("mono").unwrap(), MONO);
        assert_eq!(
            parse_flags("mono, ignore_confirm").unwrap(),
            MONO | IGNORE_CONFIRMATION
        );
        assert!(parse_flags("bogus").is_err());
    }
}
