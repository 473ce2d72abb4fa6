use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::Error;

/// Abstracts reading and writing the template/user-config files described in
/// the on-disk layout, so the template store can be exercised against an
/// in-memory fixture in tests while the host wires up a real filesystem in
/// production.
pub trait TemplateFilePort: Send + Sync {
    /// Reads `provider_template_chat_<provider_id>.json`.
    fn read_chat_template(&self, provider_id: &str) -> Result<String, Error>;

    /// Reads `provider_template_embedding_<provider_id>.json`.
    fn read_embedding_template(&self, provider_id: &str) -> Result<String, Error>;

    /// Reads `chat_config_<provider_id>.json`, if it exists.
    fn read_chat_user_config(&self, provider_id: &str) -> Result<Option<String>, Error>;

    /// Reads `embedding_config_<provider_id>.json`, if it exists.
    fn read_embedding_user_config(&self, provider_id: &str) -> Result<Option<String>, Error>;

    /// Writes `chat_config_<provider_id>.json`.
    fn write_chat_user_config(&self, provider_id: &str, content: &str) -> Result<(), Error>;

    /// Writes `embedding_config_<provider_id>.json`.
    fn write_embedding_user_config(&self, provider_id: &str, content: &str) -> Result<(), Error>;
}

/// Default [`TemplateFilePort`] backed directly by `std::fs`, rooted at a
/// configured directory.
pub struct StdFsTemplateFilePort {
    config_root: PathBuf,
}

impl StdFsTemplateFilePort {
    /// Creates a port rooted at `config_root`.
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    fn path(&self, file_name: String) -> PathBuf {
        self.config_root.join(file_name)
    }

    fn read(&self, path: &Path) -> Result<String, Error> {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading config file at '{}'", path.display()))
            .map_err(|err| Error::Io(format!("{err:#}")))
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>, Error> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Io(format!(
                "{:#}",
                anyhow::Error::new(source).context(format!("reading config file at '{}'", path.display()))
            ))),
        }
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), Error> {
        std::fs::write(path, content)
            .with_context(|| format!("writing config file at '{}'", path.display()))
            .map_err(|err| Error::Io(format!("{err:#}")))
    }
}

impl TemplateFilePort for StdFsTemplateFilePort {
    fn read_chat_template(&self, provider_id: &str) -> Result<String, Error> {
        let path = self.path(format!("provider_template_chat_{provider_id}.json"));
        self.read(&path)
    }

    fn read_embedding_template(&self, provider_id: &str) -> Result<String, Error> {
        let path = self.path(format!("provider_template_embedding_{provider_id}.json"));
        self.read(&path)
    }

    fn read_chat_user_config(&self, provider_id: &str) -> Result<Option<String>, Error> {
        let path = self.path(format!("chat_config_{provider_id}.json"));
        self.read_optional(&path)
    }

    fn read_embedding_user_config(&self, provider_id: &str) -> Result<Option<String>, Error> {
        let path = self.path(format!("embedding_config_{provider_id}.json"));
        self.read_optional(&path)
    }

    fn write_chat_user_config(&self, provider_id: &str, content: &str) -> Result<(), Error> {
        let path = self.path(format!("chat_config_{provider_id}.json"));
        self.write(&path, content)
    }

    fn write_embedding_user_config(&self, provider_id: &str, content: &str) -> Result<(), Error> {
        let path = self.path(format!("embedding_config_{provider_id}.json"));
        self.write(&path, content)
    }
}
