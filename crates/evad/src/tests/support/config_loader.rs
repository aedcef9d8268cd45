//! Configuration loaders covering success and failure paths.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use eva_config::{Config, SocketEndpoint};
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader that places the Unix socket under a private temporary directory.
pub(crate) struct TestConfigLoader {
    socket_dir: TempDir,
}

impl TestConfigLoader {
    pub(crate) fn new() -> Self {
        let socket_dir = TempDir::new().expect("failed to create temporary socket directory");
        Self { socket_dir }
    }

    pub(crate) fn socket_path(&self) -> PathBuf {
        self.socket_dir.path().join("run").join("evad.sock")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let path = self
            .socket_path()
            .to_str()
            .expect("temporary socket path was not valid UTF-8")
            .to_owned();
        Ok(Config {
            daemon_socket: SocketEndpoint::unix(path),
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unparseable socket on the command line.
pub(crate) struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("evad"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ])
    }
}
