//! Published proxy datasets and the local cache they are downloaded into.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Environment variable overriding the default cache folder.
pub const DATA_HOME_ENV: &str = "PALEOCLIMATE_DATA";
/// Older name of [`DATA_HOME_ENV`], still honoured.
pub const LEGACY_DATA_HOME_ENV: &str = "PALEOCLIMATE_SCIPY_DATA";

const DEFAULT_DIR: &str = "paleoclimate_data";
const LEGACY_DIR: &str = "paleoclimate_scipy";

const BASE_URL: &str = "https://www1.ncdc.noaa.gov/pub/data/paleo/reconstructions/pcn";

/// The 1209-site proxy network of Mann et al. (2008), PNAS 105, 13252–13257,
/// as archived by the NOAA Paleoclimatology Reconstructions Network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mann2008 {
    /// Gaps infilled by the authors (the default).
    Infilled,
    /// The raw records with gaps.
    Original,
}

impl Mann2008 {
    pub fn file_name(self) -> &'static str {
        match self {
            Mann2008::Infilled => "mann2008infilled.nc",
            Mann2008::Original => "mann2008original.nc",
        }
    }

    pub fn url(self) -> String {
        format!("{BASE_URL}/proxy/mann2008/{}", self.file_name())
    }

    /// Parse a configured dataset name such as `mann2008-infilled`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mann2008" | "mann2008-infilled" | "mann2008a" => Some(Mann2008::Infilled),
            "mann2008-original" | "mann2008-raw" => Some(Mann2008::Original),
            _ => None,
        }
    }
}

/// Resolve the folder that caches downloaded datasets, creating it if needed.
///
/// Order: `explicit`, then `$PALEOCLIMATE_DATA`, then
/// `$PALEOCLIMATE_SCIPY_DATA`, then `~/paleoclimate_data` (or an existing
/// `~/paleoclimate_scipy` when that is absent). A leading `~` is expanded to
/// the home directory.
pub fn data_home(explicit: Option<&Path>) -> Result<PathBuf> {
    let raw = match explicit {
        Some(p) => p.to_path_buf(),
        None => configured_home(|key| std::env::var_os(key), &user_home()),
    };
    let home = expand_tilde(&raw);
    fs::create_dir_all(&home)
        .with_context(|| format!("creating data home {}", home.display()))?;
    Ok(home)
}

fn configured_home(env: impl Fn(&str) -> Option<OsString>, user_home: &Path) -> PathBuf {
    if let Some(dir) = env(DATA_HOME_ENV).or_else(|| env(LEGACY_DATA_HOME_ENV)) {
        return PathBuf::from(dir);
    }
    let default = user_home.join(DEFAULT_DIR);
    let legacy = user_home.join(LEGACY_DIR);
    if !default.exists() && legacy.is_dir() {
        log::info!("Using existing data home {}", legacy.display());
        return legacy;
    }
    default
}

fn user_home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => user_home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Return the local path of `dataset`, downloading it into `home` first when
/// it is missing and `download_if_missing` is set.
pub fn fetch(dataset: Mann2008, home: &Path, download_if_missing: bool) -> Result<PathBuf> {
    let path = home.join(dataset.file_name());
    if path.exists() {
        log::debug!("Using cached {}", path.display());
        return Ok(path);
    }
    if !download_if_missing {
        bail!(
            "{} not found in {} and downloading is disabled",
            dataset.file_name(),
            home.display()
        );
    }

    let url = dataset.url();
    log::info!("Downloading data from {url} to {}", home.display());
    download(&url, &path)?;
    Ok(path)
}

/// Stream `url` into `dest`. The body lands in a `.part` sibling first so an
/// interrupted transfer never leaves a truncated file at `dest`.
fn download(url: &str, dest: &Path) -> Result<()> {
    let partial = dest.with_extension("part");
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("requesting {url}"))?;

    let mut body = response.into_body().into_reader();
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("creating {}", partial.display()))?;
    let bytes = io::copy(&mut body, &mut file).with_context(|| format!("downloading {url}"));
    let bytes = match bytes {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };
    drop(file);

    fs::rename(&partial, dest)
        .with_context(|| format!("moving download into {}", dest.display()))?;
    log::info!("Downloaded {bytes} bytes to {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_names_resolve() {
        assert_eq!(Mann2008::from_name("mann2008"), Some(Mann2008::Infilled));
        assert_eq!(
            Mann2008::from_name("Mann2008-Original"),
            Some(Mann2008::Original)
        );
        assert_eq!(Mann2008::from_name("pages2k"), None);
        assert!(Mann2008::Original
            .url()
            .ends_with("/proxy/mann2008/mann2008original.nc"));
    }

    #[test]
    fn explicit_data_home_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("nested").join("cache");
        let resolved = data_home(Some(&home)).unwrap();
        assert_eq!(resolved, home);
        assert!(home.is_dir());
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde(Path::new("~/paleo"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("paleo"));
        assert_eq!(expand_tilde(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn legacy_variable_is_a_fallback() {
        let home = Path::new("/home/someone");
        let legacy_only = |key: &str| (key == LEGACY_DATA_HOME_ENV).then(|| OsString::from("/srv/old"));
        assert_eq!(configured_home(legacy_only, home), PathBuf::from("/srv/old"));

        let both = |key: &str| match key {
            DATA_HOME_ENV => Some(OsString::from("/srv/new")),
            _ => Some(OsString::from("/srv/old")),
        };
        assert_eq!(configured_home(both, home), PathBuf::from("/srv/new"));
    }

    #[test]
    fn existing_legacy_folder_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let unset = |_: &str| None;
        assert_eq!(configured_home(unset, dir.path()), dir.path().join(DEFAULT_DIR));

        fs::create_dir(dir.path().join(LEGACY_DIR)).unwrap();
        assert_eq!(configured_home(unset, dir.path()), dir.path().join(LEGACY_DIR));

        fs::create_dir(dir.path().join(DEFAULT_DIR)).unwrap();
        assert_eq!(configured_home(unset, dir.path()), dir.path().join(DEFAULT_DIR));
    }

    #[test]
    fn cached_file_is_returned_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join(Mann2008::Infilled.file_name());
        fs::write(&cached, b"CDF").unwrap();
        let path = fetch(Mann2008::Infilled, dir.path(), false).unwrap();
        assert_eq!(path, cached);
    }

    #[test]
    fn missing_file_without_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch(Mann2008::Original, dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("downloading is disabled"));
    }
}
