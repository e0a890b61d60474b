//! `local.properties`: developer-local `key=value` settings read by hvigor

use std::path::Path;

use fohos_core::prelude::*;

/// Line-preserving `key=value` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalProperties {
    lines: Vec<String>,
}

impl LocalProperties {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    /// Read `path`; a missing file is an empty property set
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match split_entry(line) {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        })
    }

    /// Replace the first `key=` line or append one; comments stay where they are
    pub fn set(&mut self, key: &str, value: &str) {
        let entry = format!("{}={}", key, value);
        match self
            .lines
            .iter()
            .position(|line| matches!(split_entry(line), Some((k, _)) if k == key))
        {
            Some(index) => self.lines[index] = entry,
            None => self.lines.push(entry),
        }
    }
}

impl std::fmt::Display for LocalProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_preserves_comments_and_other_keys() {
        let mut props = LocalProperties::parse(
            "# This file is automatically generated\nsdk.dir=/old/sdk\nflutter.sdk=/opt/flutter\n",
        );
        assert_eq!(props.get("sdk.dir"), Some("/old/sdk"));

        props.set("sdk.dir", "/new/sdk");
        props.set("nodejs.dir", "/opt/node");

        assert_eq!(
            props.to_string(),
            "# This file is automatically generated\nsdk.dir=/new/sdk\nflutter.sdk=/opt/flutter\nnodejs.dir=/opt/node\n"
        );
    }

    #[test]
    fn test_commented_key_is_not_a_value() {
        let props = LocalProperties::parse("#sdk.dir=/commented\n");
        assert_eq!(props.get("sdk.dir"), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let props = LocalProperties::load(Path::new("/nonexistent/local.properties")).unwrap();
        assert_eq!(props, LocalProperties::default());
    }
}
