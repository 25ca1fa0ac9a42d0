//! `arboreto check`: decode and validate one record file.

use super::error::HelpfulError;
use anyhow::Result;
use arboreto::pipeline::decode_file;
use arboreto_record::{validate, VALID_MESSAGE};
use std::path::Path;

pub fn run(file: &Path) -> Result<()> {
    if !file.is_file() {
        return Err(HelpfulError::file_not_found(file).into());
    }

    let value = decode_file(file).map_err(|err| HelpfulError::record_rejected(file, err))?;
    validate(&value).map_err(|reason| HelpfulError::record_rejected(file, reason))?;

    println!("{}", VALID_MESSAGE);
    Ok(())
}
