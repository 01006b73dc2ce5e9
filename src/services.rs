//! Detection of services worth protecting, and where they log.
//!
//! Detection only produces suggestions. A jail for a detected service is
//! generated only when the operator also confirms it.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fs_abstraction::FileSystem;

/// Apache ships with different names and log layouts per distro family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApacheLayout {
    /// Debian/Ubuntu `apache2`
    Debian,
    /// RHEL/Fedora `httpd`
    Rhel,
}

impl ApacheLayout {
    pub fn error_log(self) -> PathBuf {
        match self {
            ApacheLayout::Debian => PathBuf::from("/var/log/apache2/error.log"),
            ApacheLayout::Rhel => PathBuf::from("/var/log/httpd/error_log"),
        }
    }

    pub fn access_log(self) -> PathBuf {
        match self {
            ApacheLayout::Debian => PathBuf::from("/var/log/apache2/access.log"),
            ApacheLayout::Rhel => PathBuf::from("/var/log/httpd/access_log"),
        }
    }
}

/// What is installed on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedServices {
    /// Where sshd authentication failures land
    pub ssh_log: PathBuf,
    pub apache: Option<ApacheLayout>,
    pub nginx: bool,
    pub vsftpd: bool,
}

impl DetectedServices {
    pub fn detect<F: FileSystem + ?Sized>(fs: &F) -> Self {
        let ssh_log = if fs.exists(Path::new("/var/log/auth.log"))
            || fs.exists(Path::new("/etc/debian_version"))
        {
            PathBuf::from("/var/log/auth.log")
        } else {
            PathBuf::from("/var/log/secure")
        };

        let apache = if fs.exists(Path::new("/usr/sbin/apache2")) {
            Some(ApacheLayout::Debian)
        } else if fs.exists(Path::new("/usr/sbin/httpd")) {
            Some(ApacheLayout::Rhel)
        } else {
            None
        };

        let detected = Self {
            ssh_log,
            apache,
            nginx: fs.exists(Path::new("/usr/sbin/nginx")),
            vsftpd: fs.exists(Path::new("/usr/sbin/vsftpd")),
        };
        debug!("Detected services: {:?}", detected);
        detected
    }

    /// A host with only SSH (Debian layout).
    pub fn ssh_only() -> Self {
        Self {
            ssh_log: PathBuf::from("/var/log/auth.log"),
            apache: None,
            nginx: false,
            vsftpd: false,
        }
    }

    pub fn has_http_server(&self) -> bool {
        self.apache.is_some() || self.nginx
    }

    pub fn nginx_error_log(&self) -> PathBuf {
        PathBuf::from("/var/log/nginx/error.log")
    }

    pub fn vsftpd_log(&self) -> PathBuf {
        PathBuf::from("/var/log/vsftpd.log")
    }
}
