//! Minimal RFC 3164 writer over the local datagram socket.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::sync::Arc;
use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;

const SYSLOG_PATH: &str = "/dev/log";
/// Messages carry the authpriv facility: decisions about privileged access.
const FACILITY_AUTHPRIV: u8 = 10;

#[derive(Clone)]
pub struct Syslog {
    socket: Arc<UnixDatagram>,
    ident: &'static str,
    pid: u32,
}

impl Syslog {
    pub fn connect(ident: &'static str) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(SYSLOG_PATH)?;
        Ok(Self {
            socket: Arc::new(socket),
            ident,
            pid: std::process::id(),
        })
    }

    #[cfg(test)]
    fn over(socket: UnixDatagram, ident: &'static str, pid: u32) -> Self {
        Self {
            socket: Arc::new(socket),
            ident,
            pid,
        }
    }

    fn entry(&self, severity: u8) -> SyslogEntry {
        SyslogEntry {
            socket: Arc::clone(&self.socket),
            priority: FACILITY_AUTHPRIV * 8 + severity,
            ident: self.ident,
            pid: self.pid,
        }
    }
}

impl<'a> MakeWriter<'a> for Syslog {
    type Writer = SyslogEntry;

    fn make_writer(&'a self) -> Self::Writer {
        self.entry(6) // info
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        let level = *meta.level();
        let severity = if level == tracing::Level::ERROR {
            3
        } else if level == tracing::Level::WARN {
            4
        } else if level == tracing::Level::INFO {
            6
        } else {
            7
        };
        self.entry(severity)
    }
}

pub struct SyslogEntry {
    socket: Arc<UnixDatagram>,
    priority: u8,
    ident: &'static str,
    pid: u32,
}

impl io::Write for SyslogEntry {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = String::from_utf8_lossy(buf);
        let frame = format!(
            "<{}>{}[{}]: {}",
            self.priority,
            self.ident,
            self.pid,
            message.trim_end()
        );
        // Best effort: a full or vanished syslog socket must not break the
        // host invocation.
        let _ = self.socket.send(frame.as_bytes());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
