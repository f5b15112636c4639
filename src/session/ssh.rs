use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::debug;
use ssh2::{CheckResult, KnownHostFileKind};

use super::transport::{Connection, ExecChannel, Transport};
use super::{AuthMethod, ConnectionParams, HostKeyPolicy, SessionSettings};

/// libssh2-backed transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshTransport;

impl Transport for SshTransport {
    fn dial(&self, params: &ConnectionParams, settings: &SessionSettings) -> Result<Box<dyn Connection>> {
        let addr = params
            .address
            .to_socket_addrs()
            .with_context(|| format!("invalid address '{}'", params.address))?
            .next()
            .with_context(|| format!("'{}' did not resolve to any address", params.address))?;

        let tcp = TcpStream::connect_timeout(&addr, settings.connect_timeout)
            .with_context(|| format!("TCP connect to {} failed", addr))?;

        let mut session = ssh2::Session::new().context("failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        // Bound the handshake and auth; commands themselves may run as long as they need.
        session.set_timeout(settings.connect_timeout.as_millis().min(u32::MAX as u128) as u32);
        session.handshake().context("SSH handshake failed")?;

        verify_host_key(&session, &params.address, &settings.host_key_policy)?;
        authenticate(&session, params)?;
        session.set_timeout(0);

        Ok(Box::new(SshConnection { session }))
    }
}

fn verify_host_key(session: &ssh2::Session, address: &str, policy: &HostKeyPolicy) -> Result<()> {
    let path = match policy {
        HostKeyPolicy::AcceptAny => {
            debug!("accepting host key of {} without verification", address);
            return Ok(());
        }
        HostKeyPolicy::KnownHosts(path) => path,
    };

    let (key, _) = session.host_key().context("server presented no host key")?;
    let mut known_hosts = session.known_hosts()?;
    known_hosts
        .read_file(Path::new(path), KnownHostFileKind::OpenSSH)
        .with_context(|| format!("failed to read known_hosts file {}", path.display()))?;

    let (host, port) = split_host_port(address);
    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => bail!("host key for {} does not match {}", address, path.display()),
        CheckResult::NotFound => bail!("no entry for {} in {}", address, path.display()),
        CheckResult::Failure => bail!("failed to check host key for {}", address),
    }
}

/// Tries every configured method in order until the server accepts one.
fn authenticate(session: &ssh2::Session, params: &ConnectionParams) -> Result<()> {
    for method in &params.auth {
        let attempt = match method {
            AuthMethod::Password(password) => session.userauth_password(&params.user, password),
            AuthMethod::PrivateKey { pem, .. } => pubkey_from_memory(session, &params.user, pem),
        };
        if let Err(e) = attempt {
            debug!("{:?} rejected for {}: {}", method, params.user, e);
        }
        if session.authenticated() {
            return Ok(());
        }
    }
    bail!(
        "authentication failed for user '{}' ({} method(s) tried)",
        params.user,
        params.auth.len()
    )
}

#[cfg(unix)]
fn pubkey_from_memory(session: &ssh2::Session, user: &str, pem: &str) -> Result<(), ssh2::Error> {
    session.userauth_pubkey_memory(user, None, pem, None)
}

#[cfg(not(unix))]
fn pubkey_from_memory(_session: &ssh2::Session, _user: &str, _pem: &str) -> Result<(), ssh2::Error> {
    Err(ssh2::Error::new(
        ssh2::ErrorCode::Session(-1),
        "in-memory private keys are not supported on this platform",
    ))
}

fn split_host_port(address: &str) -> (&str, u16) {
    match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(22)),
        None => (address, 22),
    }
}

struct SshConnection {
    session: ssh2::Session,
}

impl Connection for SshConnection {
    fn open_channel(&mut self) -> Result<Box<dyn ExecChannel>> {
        let channel = self.session.channel_session().context("failed to open SSH channel")?;
        Ok(Box::new(SshChannel {
            session: self.session.clone(),
            channel,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.session
            .disconnect(None, "chain finished", None)
            .context("failed to disconnect")
    }
}

struct SshChannel {
    session: ssh2::Session,
    channel: ssh2::Channel,
}

impl ExecChannel for SshChannel {
    fn run(&mut self, command_line: &str, stdout: &mut dyn Write) -> Result<i32> {
        self.channel.exec(command_line)?;
        // Remote stdin is not forwarded: commands that read it see EOF at once.
        self.channel.send_eof()?;

        let mut stderr = self.channel.stderr();
        self.session.set_blocking(false);
        let pumped = pump(&mut self.channel, &mut stderr, stdout, &mut io::stderr(), |channel| {
            channel.eof()
        });
        self.session.set_blocking(true);
        pumped?;

        self.channel.wait_close()?;
        Ok(self.channel.exit_status()?)
    }

    fn close(&mut self) -> Result<()> {
        self.channel.close()?;
        Ok(())
    }
}

/// Drains both streams of a non-blocking channel in turn until `finished`
/// reports EOF. stdout and stderr share one receive window, so neither may
/// be read to completion before the other.
fn pump<O: Read, E: Read>(
    out_src: &mut O,
    err_src: &mut E,
    out: &mut dyn Write,
    err: &mut dyn Write,
    mut finished: impl FnMut(&O) -> bool,
) -> Result<()> {
    loop {
        let mut progressed = forward_available(out_src, out).context("failed to read remote stdout")?;
        progressed |= forward_available(err_src, err).context("failed to read remote stderr")?;
        if finished(out_src) {
            break;
        }
        if !progressed {
            thread::sleep(PUMP_IDLE);
        }
    }
    // Whatever is still queued after EOF.
    while forward_available(out_src, out).context("failed to read remote stdout")? {}
    while forward_available(err_src, err).context("failed to read remote stderr")? {}
    Ok(())
}

const PUMP_IDLE: Duration = Duration::from_millis(20);

/// Copies one chunk if the source has data ready. `WouldBlock` and an empty
/// read both count as no progress.
fn forward_available<R: Read + ?Sized>(src: &mut R, dst: &mut dyn Write) -> io::Result<bool> {
    let mut buf = [0u8; 8192];
    match src.read(&mut buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            dst.write_all(&buf[..n])?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("127.0.0.1:2222"), ("127.0.0.1", 2222));
        assert_eq!(split_host_port("example.com"), ("example.com", 22));
        assert_eq!(split_host_port("example.com:nope"), ("example.com", 22));
    }

    #[test]
    fn test_dial_invalid_address_fails_without_network() {
        let params = ConnectionParams {
            address: "not an address".to_string(),
            ..Default::default()
        };
        assert!(SshTransport.dial(&params, &SessionSettings::default()).is_err());
    }

    /// Hands out `chunks` one read at a time, with a `WouldBlock` before each.
    struct Trickle {
        chunks: Vec<&'static [u8]>,
        ready: bool,
        drained: Rc<Cell<bool>>,
    }

    impl Trickle {
        fn new(chunks: Vec<&'static [u8]>) -> Self {
            Self {
                chunks,
                ready: false,
                drained: Rc::new(Cell::new(false)),
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                self.drained.set(true);
                return Ok(0);
            }
            if !self.ready {
                self.ready = true;
                return Err(io::ErrorKind::WouldBlock.into());
            }
            self.ready = false;
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    /// stdout that stays blocked until the stderr side has been drained,
    /// like a server waiting on a full receive window.
    struct WindowBound {
        stderr_drained: Rc<Cell<bool>>,
        sent: bool,
    }

    impl Read for WindowBound {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.stderr_drained.get() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            if self.sent {
                return Ok(0);
            }
            self.sent = true;
            buf[..5].copy_from_slice(b"done\n");
            Ok(5)
        }
    }

    #[test]
    fn test_pump_drains_stderr_while_stdout_is_blocked() {
        let mut err_src = Trickle::new(vec![b"noise 1\n", b"noise 2\n"]);
        let mut out_src = WindowBound {
            stderr_drained: err_src.drained.clone(),
            sent: false,
        };
        let mut out = Vec::new();
        let mut err = Vec::new();

        pump(&mut out_src, &mut err_src, &mut out, &mut err, |src| src.sent).unwrap();

        assert_eq!(out, b"done\n");
        assert_eq!(err, b"noise 1\nnoise 2\n");
    }

    #[test]
    fn test_pump_copies_both_streams_to_their_sinks() {
        let mut out_src: &[u8] = b"out\n";
        let mut err_src: &[u8] = b"late\n";
        let mut out = Vec::new();
        let mut err = Vec::new();

        pump(&mut out_src, &mut err_src, &mut out, &mut err, |src| src.is_empty()).unwrap();

        assert_eq!(out, b"out\n");
        assert_eq!(err, b"late\n");
    }

    #[test]
    fn test_forward_available_surfaces_real_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::ErrorKind::ConnectionReset.into())
            }
        }
        let mut sink = Vec::new();
        assert!(forward_available(&mut Broken, &mut sink).is_err());
        assert!(!forward_available(&mut Trickle::new(vec![b"x"]), &mut sink).unwrap());
    }
}
