//! Byte streams to the RS485 bus.
//!
//! Usually the bus is reached through a serial-to-Ethernet bridge acting as a
//! TCP server. With the `serialport` feature a local RS485 adapter can be used
//! instead.

use crate::protocol::{Addressing, Telegram, DOMAIN, LENGTH};
use crate::error::FrameError;
use crate::Error;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

pub trait Transport: Read + Write + Send {
    /// Number of bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// A second handle to the same stream, used as the dedicated writer.
    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens a fresh [`Transport`], used for the initial connect and every reconnect.
pub trait Connector: Send + Sync {
    fn open(&self) -> Result<Box<dyn Transport>, Error>;
    fn endpoint(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub host: String,
    pub port: u16,
    /// Bounds the wait of [`Transport::bytes_to_read`].
    pub probe_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            probe_timeout: Duration::from_millis(10),
        }
    }
}

impl Connector for TcpConnector {
    fn open(&self) -> Result<Box<dyn Transport>, Error> {
        let connect_err = |source| Error::Connect {
            endpoint: self.endpoint(),
            source,
        };
        let stream = TcpStream::connect((self.host.as_str(), self.port)).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        // Only affects reads, writes on the cloned handle stay blocking.
        stream
            .set_read_timeout(Some(self.probe_timeout))
            .map_err(connect_err)?;
        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Transport for TcpStream {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let mut peeked = [0u8; 64];
        match self.peek(&mut peeked) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Ok(n) => Ok(n),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(feature = "serialport")]
impl Transport for Box<dyn serialport::SerialPort> {
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(serialport::SerialPort::bytes_to_read(self.as_ref())? as usize)
    }

    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.try_clone()?))
    }
}

/// Direct connection to the bus through a local RS485 adapter.
#[cfg(feature = "serialport")]
#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub port: String,
    pub timeout: Duration,
}

#[cfg(feature = "serialport")]
impl SerialConnector {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            timeout: Duration::from_millis(100),
        }
    }
}

#[cfg(feature = "serialport")]
impl Connector for SerialConnector {
    fn open(&self) -> Result<Box<dyn Transport>, Error> {
        let serial = serialport::new(&self.port, 9600)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(|err| Error::Connect {
                endpoint: self.endpoint(),
                source: err.into(),
            })?;
        Ok(Box::new(serial))
    }

    fn endpoint(&self) -> String {
        self.port.clone()
    }
}

/// Reads one telegram if a complete one is buffered.
///
/// Never waits for missing bytes: with fewer than [`LENGTH`] bytes available
/// nothing is consumed. A wrong leading byte is consumed alone, so the next
/// attempt resynchronizes on the following byte.
pub fn read_telegram(
    transport: &mut dyn Transport,
    addressing: &Addressing,
) -> Result<Telegram, Error> {
    let available = transport.bytes_to_read()?;
    if available < LENGTH {
        return Err(Error::InsufficientData {
            available,
            required: LENGTH,
        });
    }
    let mut rx_buffer = [0u8; LENGTH];
    transport.read_exact(&mut rx_buffer[..1])?;
    if rx_buffer[0] != DOMAIN {
        return Err(FrameError::Domain(rx_buffer[0]).into());
    }
    transport.read_exact(&mut rx_buffer[1..])?;
    log::trace!("receive_bytes: {rx_buffer:02X?}");
    addressing.decode(&rx_buffer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::{address, Variable};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// In-memory bus, reads drain `rx`, writes append to `tx`.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryTransport {
        pub rx: Arc<Mutex<VecDeque<u8>>>,
        pub tx: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for MemoryTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut rx = self.rx.lock().unwrap();
            let n = buf.len().min(rx.len());
            for b in buf.iter_mut().take(n) {
                *b = rx.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for MemoryTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MemoryTransport {
        fn bytes_to_read(&mut self) -> io::Result<usize> {
            Ok(self.rx.lock().unwrap().len())
        }

        fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
            Ok(Box::new(self.clone()))
        }
    }

    fn transport_with(bytes: &[u8]) -> MemoryTransport {
        let transport = MemoryTransport::default();
        transport.rx.lock().unwrap().extend(bytes);
        transport
    }

    #[test]
    fn partial_telegram_is_not_consumed() {
        let mut transport = transport_with(&[0x01, 0x11, 0x21]);
        let addressing = Addressing::default();
        assert!(matches!(
            read_telegram(&mut transport, &addressing),
            Err(Error::InsufficientData { available: 3, .. })
        ));
        assert_eq!(transport.rx.lock().unwrap().len(), 3);
    }

    #[test]
    fn resynchronizes_after_garbage() {
        let telegram = Telegram::new(address::MASTER, address::PANEL1, Variable::FanSpeed.code(), 0x07);
        let mut bytes = vec![0xAA, 0x55];
        bytes.extend_from_slice(&telegram.encode());
        let mut transport = transport_with(&bytes);
        let addressing = Addressing::default();

        assert!(matches!(
            read_telegram(&mut transport, &addressing),
            Err(Error::MalformedFrame(FrameError::Domain(0xAA)))
        ));
        assert!(matches!(
            read_telegram(&mut transport, &addressing),
            Err(Error::MalformedFrame(FrameError::Domain(0x55)))
        ));
        assert_eq!(read_telegram(&mut transport, &addressing).unwrap(), telegram);
        assert!(matches!(
            read_telegram(&mut transport, &addressing),
            Err(Error::InsufficientData { available: 0, .. })
        ));
    }

    #[test]
    fn telegram_for_others_is_consumed() {
        let telegram = Telegram::new(address::PANEL1, address::MASTER, Variable::Poll.code(), 0xA3);
        let mut transport = transport_with(&telegram.encode());
        let addressing = Addressing::default();
        assert!(matches!(
            read_telegram(&mut transport, &addressing),
            Err(Error::WrongRecipient(t)) if t == telegram
        ));
        assert!(transport.rx.lock().unwrap().is_empty());
    }

    #[test]
    fn tcp_bytes_to_read() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connector = TcpConnector::new("127.0.0.1", port);
        let mut transport = connector.open().unwrap();
        let (mut bridge, _) = listener.accept().unwrap();

        assert_eq!(transport.bytes_to_read().unwrap(), 0);
        bridge.write_all(&[0x01, 0x11, 0x21]).unwrap();
        let mut available = 0;
        for _ in 0..100 {
            available = transport.bytes_to_read().unwrap();
            if available == 3 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(available, 3);

        drop(bridge);
        let mut closed = false;
        for _ in 0..100 {
            let mut buf = [0u8; 3];
            if transport.bytes_to_read().unwrap_or(0) == 3 {
                transport.read_exact(&mut buf).unwrap();
            }
            if transport.bytes_to_read().is_err() {
                closed = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(closed);
    }

    #[test]
    fn tcp_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let connector = TcpConnector::new("127.0.0.1", port);
        assert!(matches!(connector.open(), Err(Error::Connect { .. })));
    }
}
