use std::{fs, path::PathBuf};

/// Directory convention under a run's base path.
#[derive(Debug, Clone)]
pub struct Layout {
    pub base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base.join("config")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn answers_dir(&self) -> PathBuf {
        self.base.join("answers")
    }

    /// Where `file`-typed cells are resolved from.
    pub fn file_dir(&self) -> PathBuf {
        self.answers_dir().join("files")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.base.join("templates")
    }

    pub fn env_file(&self) -> PathBuf {
        self.config_dir().join("env.yaml")
    }

    pub fn endpoints_file(&self) -> PathBuf {
        self.config_dir().join("endpoints.yaml")
    }

    pub fn products_file(&self) -> PathBuf {
        self.config_dir().join("products.yaml")
    }

    pub fn log_file(&self, name: &str) -> PathBuf {
        self.log_dir().join(name)
    }

    /// Creates the log directory; every run appends to a file inside it.
    pub fn ensure_log_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.log_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_hang_off_base() {
        let layout = Layout::new("/work");
        assert_eq!(layout.file_dir(), PathBuf::from("/work/answers/files"));
        assert_eq!(layout.env_file(), PathBuf::from("/work/config/env.yaml"));
        assert_eq!(layout.log_file("x.log"), PathBuf::from("/work/logs/x.log"));
    }
}
