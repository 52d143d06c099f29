//! ISO checksum implant.

use anyhow::Result;
use std::path::Path;

use crate::process::Cmd;

/// Tool that embeds an MD5 checksum into an ISO's application area.
pub const IMPLANTISOMD5: &str = "implantisomd5";

/// Implant the checksum into `iso`. A non-zero exit is an error.
pub fn implant_isomd5(iso: &Path) -> Result<()> {
    tracing::info!("implanting checksum into {}", iso.display());
    Cmd::new(IMPLANTISOMD5)
        .arg_path(iso)
        .error_msg(format!("{} {} failed", IMPLANTISOMD5, iso.display()))
        .run()?;
    Ok(())
}
