//! Persisted receiver settings.
//!
//! A plain `key=value` file so the graphical front-end and this CLI can share
//! it. Unknown keys are ignored and malformed lines are skipped, so an older
//! or newer writer never makes the file unreadable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default settings file name, written in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "recvr.settings";

/// Default TCP service port.
pub const DEFAULT_SERVICE_PORT: u16 = 1111;

/// The receiver configuration that survives restarts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Directory received files are written under.
    pub savedir: PathBuf,
    /// TCP service port.
    pub port: u16,
    /// Whether existing files may be overwritten.
    pub overwrite: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            savedir: default_download_dir().unwrap_or_else(|| PathBuf::from(".")),
            port: DEFAULT_SERVICE_PORT,
            overwrite: false,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. Returns `Ok(None)` when the file does not
    /// exist; keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> io::Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error),
        };

        let mut settings = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "savedir" => settings.savedir = PathBuf::from(value),
                "port" => {
                    if let Ok(port) = value.parse() {
                        settings.port = port;
                    }
                }
                "overwrite" => settings.overwrite = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        Ok(Some(settings))
    }

    /// Writes the settings to `path`, replacing any previous contents.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = format!(
            "savedir={}\nport={}\noverwrite={}\n",
            self.savedir.display(),
            self.port,
            self.overwrite
        );
        fs::write(path, text)
    }
}

/// The platform's conventional download directory, when it can be derived
/// from the environment.
#[must_use]
pub fn default_download_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Downloads"))
    }
    #[cfg(not(unix))]
    {
        std::env::var_os("USERPROFILE").map(|profile| PathBuf::from(profile).join("Downloads"))
    }
}
