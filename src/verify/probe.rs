//! Synthetic authentication failures, one line per record, in the log
//! format each stock filter matches.

use chrono::{DateTime, Local};
use std::net::IpAddr;

use crate::policy::jail::{APACHE_AUTH, APACHE_BADBOTS, NGINX_HTTP_AUTH, SSHD, VSFTPD};

const PROBE_USER: &str = "jailsmith-probe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFormat {
    /// syslog line from sshd (auth.log / secure)
    SshdAuth,
    /// Apache 2.4 error log, basic auth failure
    ApacheError,
    /// Apache combined access log with a known bad user agent
    ApacheAccess,
    NginxError,
    Vsftpd,
}

impl ProbeFormat {
    /// Format for a jail, if it can be probed.
    ///
    /// The blocklist jail is not probeable: its log is the operator's
    /// address list and a probe line would ban the address forever.
    pub fn for_jail(jail: &str) -> Option<Self> {
        match jail {
            SSHD => Some(ProbeFormat::SshdAuth),
            APACHE_AUTH => Some(ProbeFormat::ApacheError),
            APACHE_BADBOTS => Some(ProbeFormat::ApacheAccess),
            NGINX_HTTP_AUTH => Some(ProbeFormat::NginxError),
            VSFTPD => Some(ProbeFormat::Vsftpd),
            _ => None,
        }
    }

    /// One failure record for `address`, newline-terminated. `seq`
    /// varies the source port and request id between records.
    pub fn render(self, address: IpAddr, at: DateTime<Local>, seq: u32) -> String {
        let pid = std::process::id();
        let port = 40000 + (seq % 20000);
        match self {
            ProbeFormat::SshdAuth => format!(
                "{} localhost sshd[{}]: Failed password for invalid user {} from {} port {} ssh2\n",
                at.format("%b %e %H:%M:%S"),
                pid,
                PROBE_USER,
                address,
                port
            ),
            ProbeFormat::ApacheError => format!(
                "[{}] [auth_basic:error] [pid {}] [client {}:{}] AH01618: user {} not found: /\n",
                at.format("%a %b %d %H:%M:%S%.6f %Y"),
                pid,
                address,
                port,
                PROBE_USER
            ),
            ProbeFormat::ApacheAccess => format!(
                "{} - - [{}] \"GET / HTTP/1.1\" 403 199 \"-\" \"EmailCollector\"\n",
                address,
                at.format("%d/%b/%Y:%H:%M:%S %z")
            ),
            ProbeFormat::NginxError => format!(
                "{} [error] {}#0: *{} user \"{}\" was not found in \"/etc/nginx/.htpasswd\", \
                 client: {}, server: localhost, request: \"GET / HTTP/1.1\", host: \"localhost\"\n",
                at.format("%Y/%m/%d %H:%M:%S"),
                pid,
                seq + 1,
                PROBE_USER,
                address
            ),
            ProbeFormat::Vsftpd => format!(
                "{} [pid {}] [{}] FAIL LOGIN: Client \"{}\"\n",
                at.format("%a %b %e %H:%M:%S %Y"),
                pid,
                PROBE_USER,
                address
            ),
        }
    }
}
