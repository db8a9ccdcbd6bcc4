//! Camera frame stream.
//!
//! A dedicated reader thread parses image packets off the sensor socket and
//! feeds a bounded channel; the render loop consumes the other end. When the
//! loop falls behind, the oldest frame is dropped so the display always shows
//! recent data.

use std::io::Read;
use std::net::{Shutdown, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::error::{ClientError, StreamError};
use crate::transport::connect_stream;
use crate::wire::{CameraFrame, ImageHeader};

/// Frames buffered between the reader thread and the render loop.
const QUEUE_DEPTH: usize = 4;

/// Largest accepted BGRA payload, bytes. Guards against a corrupt header.
const MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Receiving end of a sensor's binary image stream.
pub struct CameraStream {
    rx: Receiver<CameraFrame>,
    socket: TcpStream,
    reader: Option<JoinHandle<()>>,
}

impl CameraStream {
    /// Connects to the stream port the bridge returned from `listen`.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let socket = connect_stream(host, port, timeout)?;
        let reader_socket = socket.try_clone()?;

        let (tx, rx) = channel::bounded(QUEUE_DEPTH);
        let drain = rx.clone();
        let reader = thread::Builder::new()
            .name("egoview-camera-stream".to_string())
            .spawn(move || read_loop(reader_socket, tx, drain))?;

        Ok(Self {
            rx,
            socket,
            reader: Some(reader),
        })
    }

    /// Blocks up to `timeout` for the next frame.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<CameraFrame, StreamError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => StreamError::Timeout(timeout.as_millis() as u64),
            RecvTimeoutError::Disconnected => StreamError::Closed,
        })
    }

    /// Returns a frame if one is already buffered.
    pub fn try_recv(&self) -> Option<CameraFrame> {
        self.rx.try_recv().ok()
    }

    /// Shuts the socket down and joins the reader thread.
    pub fn close(&mut self) {
        let _ = self.socket.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(mut socket: TcpStream, tx: Sender<CameraFrame>, drain: Receiver<CameraFrame>) {
    let mut header_buf = [0u8; ImageHeader::SIZE];

    loop {
        if socket.read_exact(&mut header_buf).is_err() {
            debug!("Camera stream closed");
            return;
        }

        let Some(header) = ImageHeader::from_bytes(&header_buf) else {
            warn!("Malformed image header, dropping stream");
            return;
        };

        let payload_len = header.payload_len();
        if payload_len == 0 || payload_len > MAX_PAYLOAD {
            warn!(
                "Image header claims {}x{} payload, dropping stream",
                header.width, header.height
            );
            return;
        }

        let mut bgra = vec![0u8; payload_len];
        if socket.read_exact(&mut bgra).is_err() {
            debug!("Camera stream closed mid-frame");
            return;
        }

        let frame = CameraFrame { header, bgra };
        match tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                // Render loop is behind: drop the oldest buffered frame.
                let _ = drain.try_recv();
                if tx.try_send(frame).is_err() {
                    return;
                }
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn test_frame(frame_id: u64, width: u32, height: u32) -> CameraFrame {
        CameraFrame {
            header: ImageHeader {
                frame_id,
                timestamp: frame_id as f64 * 0.05,
                width,
                height,
                fov_deg: 90.0,
            },
            bgra: vec![frame_id as u8; (width * height * 4) as usize],
        }
    }

    #[test]
    fn frames_arrive_through_the_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(&test_frame(1, 4, 2).to_bytes()).unwrap();
            conn.write_all(&test_frame(2, 4, 2).to_bytes()).unwrap();
        });

        let stream =
            CameraStream::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();

        let first = stream.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.header.frame_id, 1);
        assert_eq!(first.bgra.len(), 32);

        let second = stream.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second.header.frame_id, 2);

        server.join().unwrap();
    }

    #[test]
    fn closed_stream_reports_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            drop(conn);
        });

        let stream =
            CameraStream::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        server.join().unwrap();

        let err = stream.recv_timeout(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StreamError::Closed));
    }

    #[test]
    fn slow_consumer_keeps_the_newest_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let total = (QUEUE_DEPTH + 3) as u64;
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            for i in 0..total {
                conn.write_all(&test_frame(i, 2, 2).to_bytes()).unwrap();
            }
        });

        let stream =
            CameraStream::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        server.join().unwrap();

        // Give the reader a moment to drain the socket into the queue.
        let mut newest = 0;
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            match stream.recv_timeout(Duration::from_millis(200)) {
                Ok(frame) => newest = newest.max(frame.header.frame_id),
                Err(StreamError::Timeout(_)) => break,
                Err(StreamError::Closed) => break,
            }
        }

        // The very last frame survives even though earlier ones were dropped.
        assert_eq!(newest, total - 1);
    }
}
