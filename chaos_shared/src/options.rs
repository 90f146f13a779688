//! `key=value` options file.
//!
//! The mod's plain-text config format: one `key=value` pair per line. Lines
//! that do not split into exactly two parts are skipped. Booleans are stored
//! as `0` / `1`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};

/// Parsed options file.
#[derive(Debug, Clone, Default)]
pub struct OptionsFile {
    file_name: PathBuf,
    options: BTreeMap<String, String>,
}

impl OptionsFile {
    /// Reads `path`. A missing or empty file yields no options.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut file = Self {
            file_name: path.to_path_buf(),
            options: BTreeMap::new(),
        };
        if !path.exists() {
            return Ok(file);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read options file {}", path.display()))?;
        file.parse_into(&data);
        Ok(file)
    }

    /// Parses options from a string. `name` is only used in error messages.
    pub fn from_str_named(name: impl Into<PathBuf>, data: &str) -> Self {
        let mut file = Self {
            file_name: name.into(),
            options: BTreeMap::new(),
        };
        file.parse_into(data);
        file
    }

    fn parse_into(&mut self, data: &str) {
        for line in data.split('\n') {
            let line = line.trim_end_matches('\r');
            let mut parts = line.split('=');
            if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
                self.options.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    pub fn read_value(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Integer value, or `default` if missing or unparsable.
    pub fn read_int(&self, key: &str, default: i64) -> i64 {
        self.read_value(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Boolean value (`0` is false, any other integer true), or `default`.
    pub fn read_bool(&self, key: &str, default: bool) -> bool {
        self.read_value(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(default, |v| v != 0)
    }

    pub fn require_string(&self, key: &str) -> anyhow::Result<&str> {
        self.read_value(key).ok_or_else(|| {
            anyhow!(
                "could not find the key '{}' in the options file '{}'",
                key,
                self.file_name.display()
            )
        })
    }

    pub fn require_int(&self, key: &str) -> anyhow::Result<i64> {
        let value = self.require_string(key)?;
        value.trim().parse::<i64>().with_context(|| {
            format!(
                "could not parse the value '{}', key: '{}', file: {}",
                value,
                key,
                self.file_name.display()
            )
        })
    }

    pub fn require_bool(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.require_int(key)? != 0)
    }

    /// Sets `key`. A blank value removes it.
    pub fn write_value(&mut self, key: &str, value: &str) {
        if value.trim().is_empty() {
            self.options.remove(key);
        } else {
            self.options.insert(key.to_string(), value.to_string());
        }
    }

    pub fn write_int(&mut self, key: &str, value: i64) {
        self.write_value(key, &value.to_string());
    }

    pub fn write_bool(&mut self, key: &str, value: bool) {
        self.write_int(key, i64::from(value));
    }

    /// Serializes back to the `key=value` format.
    pub fn to_file_string(&self) -> String {
        self.options
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        std::fs::write(&self.file_name, self.to_file_string())
            .with_context(|| format!("write options file {}", self.file_name.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_skips_garbage() {
        let file = OptionsFile::from_str_named(
            "config.ini",
            "NewEffectSpawnTime=45\r\nno separator\na=b=c\nEnableTimer=0\n",
        );
        assert_eq!(file.read_int("NewEffectSpawnTime", 0), 45);
        assert!(!file.read_bool("EnableTimer", true));
        assert!(!file.has_key("a"));
        assert_eq!(file.keys().count(), 2);
    }

    #[test]
    fn defaults_apply_on_bad_values() {
        let file = OptionsFile::from_str_named("config.ini", "Seed=abc\nFlag=yes\n");
        assert_eq!(file.read_int("Seed", 7), 7);
        assert!(file.read_bool("Flag", true));
        assert_eq!(file.read_int("Missing", -1), -1);
    }

    #[test]
    fn require_reports_key_and_file() {
        let file = OptionsFile::from_str_named("config.ini", "Seed=abc\n");

        let missing = file.require_int("EffectTimedDur").unwrap_err().to_string();
        assert!(missing.contains("'EffectTimedDur'"));
        assert!(missing.contains("config.ini"));

        let bad = file.require_int("Seed").unwrap_err().to_string();
        assert!(bad.contains("could not parse the value 'abc'"));
    }

    #[test]
    fn writes_back_in_key_order() {
        let mut file = OptionsFile::default();
        file.write_int("b", 2);
        file.write_bool("a", true);
        file.write_value("c", "x");
        file.write_value("c", "  ");
        assert_eq!(file.to_file_string(), "a=1\nb=2\n");
    }

    #[test]
    fn missing_file_is_empty() {
        let path = std::env::temp_dir().join("chaos_options_does_not_exist.ini");
        let file = OptionsFile::load(&path).unwrap();
        assert_eq!(file.keys().count(), 0);
    }

    #[test]
    fn save_and_reload() {
        let path = std::env::temp_dir().join(format!("chaos_options_{}.ini", std::process::id()));
        let mut file = OptionsFile::from_str_named(&path, "");
        file.write_int("EffectTimedDur", 60);
        file.save().unwrap();

        let reloaded = OptionsFile::load(&path).unwrap();
        assert_eq!(reloaded.require_int("EffectTimedDur").unwrap(), 60);
        let _ = std::fs::remove_file(&path);
    }
}
