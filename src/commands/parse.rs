//! Parse a single check specification
//! Usage: mrpe parse "<description> [(<age>:yes|no)] <exe> [args...]"

use anyhow::Result;
use std::path::Path;

use crate::entry::CheckEntry;

pub fn execute(config_path: Option<&Path>, spec: &str, user: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let markers = config.mrpe.markers();
    let spec = markers.replace(spec);

    let entry = CheckEntry::parse(user.unwrap_or_default(), &spec, &markers)?;
    println!("{}", super::entries::describe(&entry));
    println!("  executable: {} ({})", entry.exe_path, entry.exe_name);
    if !entry.args.is_empty() {
        println!("  arguments:  {}", entry.args.join(" "));
    }
    Ok(())
}
