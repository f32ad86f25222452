// Line-oriented decode backend.
//
// Handheld USB/HID barcode readers present as a character device (or a
// serial tty) and emit one decoded payload per line. The open handle is
// shared with the device lease, so releasing the lease closes it even
// while the decode loop is parked waiting for the next scan.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

use super::{CameraFacing, DecodeBackend, DecodeFault, DeviceLease, PayloadStream};
use crate::error::CameraError;

const READ_CHUNK: usize = 512;

/// Reads payloads from a device node or file, one per line.
#[derive(Debug, Clone)]
pub struct LineBackend {
    path: Option<PathBuf>,
}

impl LineBackend {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

fn camera_error(err: &io::Error) -> CameraError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        io::ErrorKind::NotFound => CameraError::DeviceNotFound,
        io::ErrorKind::ResourceBusy => CameraError::DeviceBusy,
        _ => CameraError::Unsupported {
            reason: err.to_string(),
        },
    }
}

// ── Source ───────────────────────────────────────────────────────────

#[derive(Debug)]
enum Source {
    /// Character device or FIFO, read without blocking a pool thread.
    #[cfg(unix)]
    Device(tokio::net::unix::pipe::Receiver),
    /// Regular file, e.g. a recorded scan log.
    File(File),
}

impl Source {
    fn poll_read(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self {
            #[cfg(unix)]
            Self::Device(rx) => Pin::new(rx).poll_read(cx, buf),
            Self::File(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

#[cfg(unix)]
fn open_device(path: &Path) -> io::Result<Source> {
    tokio::net::unix::pipe::OpenOptions::new()
        .unchecked(true)
        .open_receiver(path)
        .map(Source::Device)
}

#[cfg(not(unix))]
fn open_device(path: &Path) -> io::Result<Source> {
    std::fs::File::open(path).map(|file| Source::File(File::from_std(file)))
}

/// `None` once the lease has been released.
type SharedSource = Arc<Mutex<Option<Source>>>;

// ── Stream ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct LineStream {
    source: SharedSource,
    buf: Vec<u8>,
}

impl LineStream {
    fn take_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn poll_line(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<String>, DecodeFault>> {
        loop {
            if let Some(line) = self.take_line() {
                return Poll::Ready(Ok(Some(line)));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let mut read_buf = ReadBuf::new(&mut chunk);
            let polled = {
                let mut guard = self.source.lock().unwrap_or_else(PoisonError::into_inner);
                let Some(source) = guard.as_mut() else {
                    return Poll::Ready(Ok(None));
                };
                source.poll_read(cx, &mut read_buf)
            };

            match polled {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    return Poll::Ready(Err(DecodeFault::new(format!("reader I/O error: {e}"))));
                }
                Poll::Ready(Ok(())) => {
                    let filled = read_buf.filled();
                    if filled.is_empty() {
                        if self.buf.is_empty() {
                            return Poll::Ready(Ok(None));
                        }
                        // Last line without a terminator.
                        let rest = std::mem::take(&mut self.buf);
                        return Poll::Ready(Ok(Some(String::from_utf8_lossy(&rest).into_owned())));
                    }
                    self.buf.extend_from_slice(filled);
                }
            }
        }
    }
}

impl PayloadStream for LineStream {
    async fn next_payload(&mut self) -> Result<Option<String>, DecodeFault> {
        std::future::poll_fn(|cx| self.poll_line(cx)).await
    }
}

impl DecodeBackend for LineBackend {
    type Stream = LineStream;

    async fn open(&self, facing: CameraFacing) -> Result<(LineStream, DeviceLease), CameraError> {
        let Some(path) = self.path.as_ref() else {
            return Err(CameraError::DeviceNotFound);
        };

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| camera_error(&e))?;
        if meta.is_dir() {
            return Err(CameraError::Unsupported {
                reason: format!("{} is a directory", path.display()),
            });
        }
        let source = if meta.is_file() {
            File::open(path).await.map(Source::File)
        } else {
            open_device(path)
        }
        .map_err(|e| camera_error(&e))?;

        debug!(device = %path.display(), %facing, "line reader opened");
        let source: SharedSource = Arc::new(Mutex::new(Some(source)));
        let held = Arc::clone(&source);
        let lease = DeviceLease::new(path.display().to_string(), move || {
            let closed = held.lock().unwrap_or_else(PoisonError::into_inner).take();
            drop(closed);
        });
        Ok((
            LineStream {
                source,
                buf: Vec::new(),
            },
            lease,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn reads_one_payload_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "abc-123").unwrap();
        writeln!(file, "def-456").unwrap();

        let backend = LineBackend::new(Some(file.path().to_path_buf()));
        let (mut stream, _lease) = backend.open(CameraFacing::Environment).await.unwrap();

        assert_eq!(stream.next_payload().await.unwrap().as_deref(), Some("abc-123"));
        assert_eq!(stream.next_payload().await.unwrap().as_deref(), Some("def-456"));
        assert_eq!(stream.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unterminated_last_line_is_delivered() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "abc-123\r\nlast").unwrap();

        let backend = LineBackend::new(Some(file.path().to_path_buf()));
        let (mut stream, _lease) = backend.open(CameraFacing::Environment).await.unwrap();

        assert_eq!(stream.next_payload().await.unwrap().as_deref(), Some("abc-123"));
        assert_eq!(stream.next_payload().await.unwrap().as_deref(), Some("last"));
        assert_eq!(stream.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn released_lease_ends_the_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "abc-123").unwrap();

        let backend = LineBackend::new(Some(file.path().to_path_buf()));
        let (mut stream, mut lease) = backend.open(CameraFacing::Environment).await.unwrap();
        lease.release();

        assert_eq!(stream.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_device_is_device_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LineBackend::new(Some(dir.path().join("hidraw9")));
        let err = backend.open(CameraFacing::Environment).await.unwrap_err();
        assert_eq!(err, CameraError::DeviceNotFound);
    }

    #[tokio::test]
    async fn unconfigured_device_is_device_not_found() {
        let backend = LineBackend::new(None);
        let err = backend.open(CameraFacing::User).await.unwrap_err();
        assert_eq!(err, CameraError::DeviceNotFound);
    }

    #[test]
    fn io_kinds_map_to_camera_errors() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let busy = io::Error::from(io::ErrorKind::ResourceBusy);
        assert_eq!(camera_error(&denied), CameraError::PermissionDenied);
        assert_eq!(camera_error(&busy), CameraError::DeviceBusy);
    }

    #[cfg(target_os = "linux")]
    mod fifo {
        use std::fs::OpenOptions;
        use std::io::Write;
        use std::path::Path;
        use std::time::Duration;

        use super::super::super::{CaptureSession, CaptureSignal};
        use super::*;

        fn make_fifo(dir: &Path) -> PathBuf {
            let fifo = dir.canonicalize().unwrap().join("scanner");
            let status = std::process::Command::new("mkfifo")
                .arg(&fifo)
                .status()
                .unwrap();
            assert!(status.success());
            fifo
        }

        fn open_fds_to(path: &Path) -> usize {
            std::fs::read_dir("/proc/self/fd")
                .unwrap()
                .filter_map(Result::ok)
                .filter(|entry| std::fs::read_link(entry.path()).is_ok_and(|target| target == path))
                .count()
        }

        #[tokio::test]
        async fn stop_closes_reader_idle_between_scans() {
            let dir = tempfile::tempdir().unwrap();
            let fifo = make_fifo(dir.path());
            // Read-write keeps a writer attached without blocking on open.
            let _writer = OpenOptions::new().read(true).write(true).open(&fifo).unwrap();
            assert_eq!(open_fds_to(&fifo), 1);

            let (mut session, _rx) =
                CaptureSession::new(LineBackend::new(Some(fifo.clone())), CameraFacing::Environment);
            session.start().await.unwrap();
            tokio::task::yield_now().await;
            assert_eq!(open_fds_to(&fifo), 2);

            session.stop();
            assert!(!session.is_active());
            assert_eq!(open_fds_to(&fifo), 1);

            // The device can be opened again straight away.
            session.start().await.unwrap();
            assert_eq!(open_fds_to(&fifo), 2);
            session.stop();
            assert_eq!(open_fds_to(&fifo), 1);
        }

        #[tokio::test]
        async fn payload_written_to_device_is_decoded() {
            let dir = tempfile::tempdir().unwrap();
            let fifo = make_fifo(dir.path());
            let mut writer = OpenOptions::new().read(true).write(true).open(&fifo).unwrap();

            let (mut session, mut rx) =
                CaptureSession::new(LineBackend::new(Some(fifo.clone())), CameraFacing::Environment);
            session.start().await.unwrap();
            writer.write_all(b"abc-123\n").unwrap();

            let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let CaptureSignal::Decoded { event, .. } = signal else {
                panic!("expected a decode, got {signal:?}");
            };
            assert_eq!(event.token.as_str(), "ABC123");
            session.stop();
        }
    }
}
