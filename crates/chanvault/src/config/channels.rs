use std::path::Path;

use crate::error::ConfigError;

/// Reads the channel list: one identifier per line, blank lines ignored.
///
/// A missing or empty file falls back to the default channel, if any.
pub fn load_channel_list<P: AsRef<Path>>(
    path: P,
    default_channel: Option<&str>,
) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let fallback = || {
        default_channel
            .filter(|c| !c.trim().is_empty())
            .map(|c| vec![c.trim().to_string()])
            .unwrap_or_default()
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(fallback()),
        Err(e) => {
            return Err(ConfigError::ReadChannelList {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let channels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if channels.is_empty() {
        Ok(fallback())
    } else {
        Ok(channels)
    }
}
