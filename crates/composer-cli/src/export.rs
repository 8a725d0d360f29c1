use composer::{ComposerError, IndexOptions};

use crate::IndexArgs;

pub fn export_index(index: &IndexArgs) -> Result<(), ComposerError> {
    let index = index.load(IndexOptions::default())?;
    let document = index.to_document()?;

    println!("{}", document.to_json_pretty()?);
    Ok(())
}
