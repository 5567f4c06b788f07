//! Multi-file stay loading.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use casemix_core::CasemixError;

use crate::rss::{load_text, TextFormat};
use crate::stay::{StaySet, StayTest};

/// Accumulates stays from any mix of supported formats, then yields the
/// final `StaySet` (and the GRP expected-result sidecar, for `--test`).
#[derive(Default)]
pub struct StaySetBuilder {
    set: StaySet,
    tests: HashMap<i32, StayTest>,
}

fn read_file(path: &Path) -> Result<Vec<u8>, CasemixError> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    if path.extension().is_some_and(|e| e == "gz") {
        GzDecoder::new(file).read_to_end(&mut data)?;
    } else {
        file.read_to_end(&mut data)?;
    }
    Ok(data)
}

fn text_of(data: Vec<u8>, path: &str) -> Result<String, CasemixError> {
    String::from_utf8(data).map_err(|_| CasemixError::InvalidStayFile {
        path: path.to_string(),
        reason: "not valid UTF-8".to_string(),
    })
}

impl StaySetBuilder {
    pub fn new() -> StaySetBuilder {
        StaySetBuilder::default()
    }

    pub fn load_pack(&mut self, data: &[u8]) -> Result<(), CasemixError> {
        let set = StaySet::load_pack(&mut &data[..])?;
        self.set.stays.extend(set.stays);
        Ok(())
    }

    pub fn load_rss(&mut self, text: &str, path: &str) -> Result<(), CasemixError> {
        load_text(text, path, TextFormat::Rss, &mut self.set.stays, None)
    }

    pub fn load_grp(&mut self, text: &str, path: &str, with_tests: bool) -> Result<(), CasemixError> {
        let tests = with_tests.then_some(&mut self.tests);
        load_text(text, path, TextFormat::Grp, &mut self.set.stays, tests)
    }

    pub fn load_rsa(&mut self, text: &str, path: &str) -> Result<(), CasemixError> {
        load_text(text, path, TextFormat::Rsa, &mut self.set.stays, None)
    }

    /// Dispatch one file by extension (`.dspak`, `.rss`, `.grp`, `.rsa`,
    /// each optionally `.gz`).
    pub fn load_file(&mut self, path: &Path, with_tests: bool) -> Result<(), CasemixError> {
        let path_str = path.display().to_string();
        info!(path = %path_str, "loading stays");

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let stem = name.strip_suffix(".gz").unwrap_or(name);
        let data = read_file(path)?;

        match stem.rsplit('.').next() {
            Some("dspak") => self.load_pack(&data),
            Some("rss") => {
                let text = text_of(data, &path_str)?;
                self.load_rss(&text, &path_str)
            }
            Some("grp") => {
                let text = text_of(data, &path_str)?;
                self.load_grp(&text, &path_str, with_tests)
            }
            Some("rsa") => {
                let text = text_of(data, &path_str)?;
                self.load_rsa(&text, &path_str)
            }
            _ => Err(CasemixError::UnknownFormat {
                path: path_str,
                extension: stem.rsplit('.').next().unwrap_or("").to_string(),
            }),
        }
    }

    pub fn load_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        with_tests: bool,
    ) -> Result<(), CasemixError> {
        for path in paths {
            self.load_file(path.as_ref(), with_tests)?;
        }
        Ok(())
    }

    /// Stays in input order plus the expected-result sidecar.
    pub fn finish(self) -> (StaySet, HashMap<i32, StayTest>) {
        (self.set, self.tests)
    }
}
