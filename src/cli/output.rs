use anyhow::Result;
use std::io::Write;

/// Write raw payload bytes to stdout followed by a newline (records are UTF-8 JSON).
pub fn print_raw(bytes: &[u8]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(bytes)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
