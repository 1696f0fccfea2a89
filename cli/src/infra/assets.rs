//! Embedded assets: the template files compiled into the CLI binary.
//!
//! At compile time, `include_dir!` embeds everything under `cli/assets/`:
//!   - `skills/*/SKILL.md`    : agent skill descriptions
//!   - `templates/USER.md`    : owner profile stub
//!   - `templates/memory/*`   : initial agent memory, including `state.json`

use anyhow::{Context, Result};
use include_dir::{Dir, include_dir};

use crate::application::ports::TemplateSource;

static EMBEDDED_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// Return the raw bytes of a single embedded asset.
///
/// # Errors
///
/// Returns an error if no asset with the given `name` exists.
pub fn get_asset(name: &str) -> Result<&'static [u8]> {
    EMBEDDED_ASSETS
        .get_file(name)
        .map(|f| f.contents())
        .ok_or_else(|| anyhow::anyhow!("embedded asset not found: {name}"))
}

/// `TemplateSource` backed by the assets embedded in the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl TemplateSource for EmbeddedTemplates {
    fn template(&self, path: &str) -> Result<String> {
        let bytes = get_asset(path)?;
        String::from_utf8(bytes.to_vec()).with_context(|| format!("asset {path} is not UTF-8"))
    }
}
